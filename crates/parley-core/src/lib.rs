pub mod config;
pub mod error;
pub mod sequence;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use sequence::SequenceGenerator;
pub use types::{ConnId, Identity, SessionToken};
