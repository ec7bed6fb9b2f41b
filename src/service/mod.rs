//! Service layer containing pipeline orchestration.

mod pipeline_service;
mod request_service;
mod router;

pub use pipeline_service::{FilterPipeline, PipelineSnapshot};
pub use request_service::{echo_handler, RequestService, ERROR_EXIT_CODE};
pub use router::StaticRouter;
