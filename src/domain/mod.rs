//! Domain layer for rask-log-writer.
//!
//! Contains the canonical types shared across all modules:
//! - `Message`: The unit of data flowing from producers to a destination
//! - `WriterError`: Top-level error type

pub mod error;
pub mod message;

pub use error::WriterError;
pub use message::Message;
