//! Content-addressed checkpoint log for resumable runs.
//!
//! Each completed (or terminally skipped) invocation appends one
//! [`CheckpointRecord`] keyed by a hash of the component id, the invoking
//! step's position, and the canonical form of its resolved inputs. On
//! resume the whole log is loaded into a [`CheckpointSession`] index and
//! matching invocations are replayed instead of executed.

mod hashing;
mod record;
mod session;
mod store;

pub use hashing::{canonical_json, content_hash};
pub use record::{CheckpointRecord, RecordStatus};
pub use session::CheckpointSession;
pub use store::{CheckpointLog, InMemoryCheckpointLog, JsonlCheckpointLog};
