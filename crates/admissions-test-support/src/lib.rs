//! Shared test doubles for the admission decision engine.

mod clock;
mod sink;
mod store;

pub use clock::FixedClock;
pub use sink::{FailingEventSink, RecordingEventSink, SlowEventSink};
pub use store::{
    FailingApplicationStore, FlakyApplicationStore, InMemoryApplicationStore,
    LostAckApplicationStore, RacingApplicationStore, SlowApplicationStore,
    SlowCommitApplicationStore,
};
