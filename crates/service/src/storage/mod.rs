//! Storage abstractions for per-user client state
//!
//! `JsonMapStore` persists a small map as JSON; `ClientStorage` is the
//! key-value contract the bootstrapper and prompt library depend on.

pub mod json_map_store;
pub mod client;

pub use client::{ClientStorage, StorageKey};
pub use json_map_store::JsonMapStore;
