pub mod config;
pub mod error;
pub mod models;
pub mod factors;
pub mod fallback;
pub mod azure;
pub mod source;
pub mod analysis;
pub mod export;
pub mod storage;

pub use config::{Config, ExtractConfig};
pub use error::{Error, Result};
pub use factors::FactorTable;
pub use fallback::FallbackChain;
pub use azure::{CredentialChain, ManagementClient, Session};
pub use source::{AzureSource, DataSource, DemoSource};
pub use analysis::{Estimator, ExtractionPipeline};
pub use storage::BlobUploader;
