//! The writer engine and the handle producers use to talk to it.

pub mod engine;
pub mod handle;
pub mod state;

pub use engine::LogWriter;
pub use handle::LogWriterHandle;
pub use state::WriterState;
