//! State-transition events, hashing, and diffing.
//!
//! Every state transition inside an execution produces one [`StateEvent`].
//! Events are streamed in emission order and hash-chained: each event's
//! `previousHash` is the SHA-256 digest of the event emitted before it, so a
//! consumer can verify the stream was neither reordered nor truncated in the
//! middle.

pub mod diff;
pub mod emitter;
pub mod event;
pub mod hashing;

pub use diff::{diff_states, PatchKind, PatchOp};
pub use emitter::{EmitError, EventEmitter, EventStream};
pub use event::{EventBody, EventKind, StateEvent};
pub use hashing::{event_hash, state_hash};
