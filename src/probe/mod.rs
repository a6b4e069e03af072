//! Bounded-time HTTP probing
//!
//! `EndpointSpec` describes a target, `HttpTransport` performs the request,
//! and `EndpointProbe` classifies the outcome into a `StageResult`.

pub mod endpoint;
pub mod endpoint_probe;
pub mod transport;

pub use endpoint::{EndpointSpec, HttpMethod, RequestBody};
pub use endpoint_probe::{EndpointProbe, response_data};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};
