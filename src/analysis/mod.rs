pub mod estimator;
pub mod pipeline;

pub use estimator::Estimator;
pub use pipeline::{ExtractionOutcome, ExtractionPipeline};
