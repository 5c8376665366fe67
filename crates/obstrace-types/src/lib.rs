//! Shared error, result, configuration, and primitive types for the
//! observability pipeline workspace.

pub mod common;
pub mod config;
pub mod error;

pub use common::Pagination;
pub use config::Config;
pub use error::{ObsError, Result};
