//! Per-imposter stub lists: lookup, response rotation and write-through.

mod entry;
mod repository;
mod sequencer;

pub use entry::{NextResponse, StubEntry, StubIndex};
pub use repository::{StubMatch, StubRepository};
pub use sequencer::{HasRepeatBehavior, ResponseSequencer};
