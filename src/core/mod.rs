pub mod error;

pub use error::{ReconError, ToolError};
