pub mod local;
pub mod blob;

pub use blob::{BlobUploader, UploadSummary};
pub use local::{list_exports, write_local, ExportFile};
