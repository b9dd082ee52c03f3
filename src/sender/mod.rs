//! Delivery side of the writer: the destination facade, name validation and
//! the statistics the engine reports through.

pub mod destination;
pub mod naming;
pub mod stats;

pub use destination::{
    Destination, DestinationError, DestinationFuture, DestinationResult, DestinationStatus,
};
pub use naming::NameRule;
pub use stats::{LastBatch, LastError, StatisticsSnapshot, WriterStatistics};
