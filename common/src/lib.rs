pub mod file_format;
pub mod log_setup;
pub mod shared_fn;

pub use file_format::{FileExtensionError, SerdeFormat, SerdeFormatError};
pub use shared_fn::SharedFn;
