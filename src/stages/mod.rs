//! Pipeline stages
//!
//! Each stage performs its network calls through `EndpointProbe` and reports
//! a `StageResult`.

pub mod resource_access;
pub mod service_health;
pub mod token_exchange;

pub use resource_access::ResourceAccessStage;
pub use service_health::{ComponentStatus, ServiceHealthStage, component_status, core_architecture_up};
pub use token_exchange::{AccessToken, TokenExchangeStage};
