pub mod config;
pub mod error;
pub mod types;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use types::{Angle, Cycle, Point2, Side};
