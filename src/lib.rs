pub mod core;
pub mod orchestration;
pub mod probe;
pub mod security;
pub mod stages;

pub use crate::core::*;
pub use orchestration::{ChatCompletionProcessor, PipelineRunner, ReportPresenter, RequestProcessor};
pub use probe::{EndpointProbe, EndpointSpec, HttpTransport};
pub use security::{CredentialFormatChecker, SecureTokenManager};
pub use stages::{ResourceAccessStage, ServiceHealthStage, TokenExchangeStage};
