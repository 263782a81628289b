//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{calculate_checksum, detect_file_type, expand_tilde, read_text_lossy};
pub use retry::{RetryPolicy, RetryResult, Retryable, with_retry};
