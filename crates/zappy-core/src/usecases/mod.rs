//! Use cases (interactors) for Zappy
//!
//! Use cases are thin coordinators that delegate I/O to ports.
//!
//! - [`UploadFileUseCase`] - Turns one [`FileEvent`](crate::domain::FileEvent) into one outcome
//! - [`ReconcileUseCase`] - Startup scan uploading files missing from the bucket
//! - [`KeyLocks`] - Per-key serialization of the check-then-upload sequence

pub mod key_locks;
pub mod reconcile;
pub mod upload_file;

pub use key_locks::KeyLocks;
pub use reconcile::ReconcileUseCase;
pub use upload_file::UploadFileUseCase;
