#![warn(rust_2018_idioms)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for jitter math
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. WriterError in writer module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod reliability;
pub mod sender;
pub mod writer;

// Re-export main types for easy access
pub use app::{ConfigError, WriterConfig};
pub use buffer::{Batch, BatchLimits, DiscardPolicy, MessageQueue, OversizeAction};
pub use domain::{Message, WriterError};
pub use reliability::{Attempt, RetryConfig, RetryController, RetryReason, RetryStrategy};
pub use sender::{
    Destination, DestinationError, DestinationFuture, DestinationResult, DestinationStatus,
    NameRule, StatisticsSnapshot, WriterStatistics,
};
pub use writer::{LogWriter, LogWriterHandle, WriterState};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
