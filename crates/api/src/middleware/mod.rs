//! HTTP middleware components.

pub mod logging;
pub mod metrics;
pub mod signature;
pub mod trace_id;

pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
pub use signature::{verify_signature, SIGNATURE_HEADER};
pub use trace_id::{get_request_id, trace_id, RequestId, REQUEST_ID_HEADER};
