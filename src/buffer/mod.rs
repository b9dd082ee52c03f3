//! Buffering layer between producers and the writer engine.
//!
//! - `MessageQueue`: bounded multi-producer queue with discard policies
//! - `BatchLimits` / `Batch`: destination caps and the batches built under them
//! - `DiscardPolicy` / `OversizeAction`: load-shedding rules

pub mod batch;
pub mod policy;
pub mod queue;

pub use batch::{Batch, BatchLimits};
pub use policy::{DiscardPolicy, OversizeAction};
pub use queue::MessageQueue;
