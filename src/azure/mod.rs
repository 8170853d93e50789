pub mod auth;
pub mod client;
pub mod cost;

pub use auth::{CredentialChain, Session, MANAGEMENT_SCOPE, STORAGE_SCOPE};
pub use client::ManagementClient;
pub use cost::parse_cost_rows;
