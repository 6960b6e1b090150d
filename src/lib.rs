//! Workspace umbrella crate.
//!
//! Re-exports the service façade so hosts can depend on `anisync-workspace`
//! alone and pick the bridge through features (`desktop-shims` binds real
//! UDP sockets).

pub use core_service::*;
