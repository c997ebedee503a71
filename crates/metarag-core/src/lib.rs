pub mod attribute;
pub mod boundary;
pub mod config;
pub mod custom_class;
pub mod data_processor;
pub mod error;
pub mod extent;
pub mod flatten;
pub mod ids;
pub mod metadata;
pub mod sidecar;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
