//! Domain entities, privacy/enum validators, and repository traits for the
//! observability pipeline. No I/O dependencies live in this crate.

pub mod domain;
pub mod repository;
pub mod validation;

pub use domain::*;
pub use repository::*;
