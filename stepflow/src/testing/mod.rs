//! Testing utilities for flows.
//!
//! Mock components that count their calls, fail on demand, or block, plus
//! a destination writer that records instead of writing.

mod mocks;

pub use mocks::{CountingComponent, FlakyComponent, RecordingDestinations, SlowComponent};
