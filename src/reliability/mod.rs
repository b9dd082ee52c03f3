//! Retry policy shared by destination initialization and batch sending.

pub mod retry;

pub use retry::{Attempt, RetryConfig, RetryController, RetryReason, RetryStrategy};
