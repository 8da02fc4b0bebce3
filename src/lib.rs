//! pipehub - a local hub for pipeline definitions
//!
//! This crate keeps pipeline definitions pulled from a remote registry in a
//! content-addressed store on plain files. Content is stored once per
//! digest, tags are named pointers to it, HEAD records what is checked out,
//! local edits show up as dirty tags, and unreferenced content is collected.
//!
//! # Example
//!
//! ```no_run
//! use pipehub::hub::{HubStore, PipeRef, StoreConfig, TagName};
//! use pipehub::registry::MemoryRegistry;
//! use pipehub::sync;
//!
//! let store = HubStore::open(StoreConfig::new("/tmp/pipehub")).unwrap();
//! let registry = MemoryRegistry::new();
//! let reference: PipeRef = "alice/deploy".parse().unwrap();
//! registry.publish(&reference.pipe, &TagName::latest(), b"steps: []");
//!
//! let pulled = sync::pull(&store, &registry, &reference, false).unwrap();
//! let dirty = store.is_dirty(&pulled.pipe, &pulled.tag).unwrap();
//! println!("{}:{} dirty={}", pulled.pipe, pulled.tag, dirty);
//! ```

pub mod cli;
pub mod config;
pub mod hub;
pub mod registry;
pub mod sync;
