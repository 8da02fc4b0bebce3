//! hub store for pipehub
//!
//! this module is the local, content-addressed home of pulled pipe
//! definitions. Upper layers (the sync orchestrator, the CLI) use this API
//! and never touch the pipe directories directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HubStore                             │
//! │   (High-level API: content, tags, index, HEAD, state, gc)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │   pointer   │       │    index    │       │    head     │
//!  │   (tags)    │       │  (records)  │       │ (checkout)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │    blob     │
//!                        │  (content)  │
//!                        └─────────────┘
//!  ```
//!
//! `dirty` and `gc` read across all of the above; `lock` guards a pipe
//! directory against a second process.
//!
//! # Usage
//!
//! ```no_run
//! use pipehub::hub::{HubStore, PipeId, StoreConfig, TagName};
//!
//! let store = HubStore::open(StoreConfig::new("/tmp/hub")).unwrap();
//! let pipe = PipeId::new("alice", "deploy").unwrap();
//! let tag = TagName::latest();
//!
//! let _lock = store.lock(&pipe).unwrap();
//! let sums = store.save_content(&pipe, &tag, b"steps: []", false).unwrap();
//! println!("stored sha256:{}", sums.sha256.short());
//! ```

mod atomic;
mod blob;
mod digest;
mod dirty;
mod error;
mod gc;
mod head;
mod index;
mod lock;
mod pointer;
mod store;
mod types;

// Re-export public API
pub use blob::BlobMetadata;
pub use digest::{compute_checksums, sha256, Checksums};
pub use dirty::TagState;
pub use error::{HubError, HubResult};
pub use gc::GcSummary;
pub use head::HeadRef;
pub use index::{Index, TagRecord};
pub use lock::PipeLock;
pub use pointer::TagPointer;
pub use store::{HubStore, StoreConfig};
pub use types::{
    InvalidDigestError, InvalidNameError, PipeId, PipeLayout, PipeRef, Sha256Digest, TagName,
};
