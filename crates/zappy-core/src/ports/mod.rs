//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`IObjectStore`] - Remote bucket operations (existence check, upload)
//! - [`IUploadObserver`] - Sink for outcomes, failures and status lines

pub mod object_store;
pub mod observer;

pub use object_store::{IObjectStore, PutResult};
pub use observer::{IUploadObserver, NullObserver};
