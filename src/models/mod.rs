pub mod cost;
pub mod estimate;
pub mod bundle;

pub use cost::*;
pub use estimate::*;
pub use bundle::*;
