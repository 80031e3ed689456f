pub mod embedding;
pub mod errors;
pub mod executor;
pub mod extractor;
pub mod ledger;
pub mod matcher;
pub mod pipeline;
pub mod response;
pub mod store;
pub mod window;

pub use embedding::{Embedding, EMBEDDING_LEN};
pub use errors::{AppError, AppResult};
pub use pipeline::{AdmissionPipeline, Caller, PipelineConfig};
