pub mod archive;
pub mod dbf;
pub mod schema;
pub mod upload;
pub mod validator;

#[cfg(test)]
pub(crate) mod fixtures;

pub use upload::ValidationService;
pub use validator::{validate, validate_label, ArchiveReport, ValidationResult};
