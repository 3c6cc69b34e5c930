//! Gateway implementation

mod builder;
mod orchestrator;
mod singleflight;

pub use builder::{Muninn, MuninnBuilder};
pub use orchestrator::{Gateway, ResultStream};

/// Default number of progressive snapshots buffered per streaming request.
pub const DEFAULT_STREAM_BUFFER: usize = 64;
