//! Media handle lifecycle management.
//!
//! Every externally visible byte buffer created for a job (input preview,
//! output download) is tracked here as a revocable handle. The store
//! guarantees each handle is released exactly once, whether that happens on
//! job removal, on replacement by a re-run, or in the teardown sweep.

mod store;
mod types;

pub use store::HandleStore;
pub use types::{HandleId, HandleKind, MediaHandle};
