//! Persistence Adapters - File-based Record Storage
//!
//! Implements the `RecordStore` port using atomic JSON snapshot files.
//! Snapshots are rewritten via tmp file + rename so a crash never leaves a torn file.

pub mod record_store;

pub use record_store::JsonRecordStore;
