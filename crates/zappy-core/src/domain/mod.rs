//! Domain layer
//!
//! Pure value types shared by every crate in the workspace. Nothing in here
//! performs I/O; existence checks and uploads go through
//! [`crate::ports::IObjectStore`].

pub mod errors;
pub mod event;
pub mod lifecycle;
pub mod newtypes;
pub mod outcome;

pub use errors::{
    BackendError, ConfigError, DomainError, PreconditionError, StartupError, UploadError,
};
pub use event::FileEvent;
pub use lifecycle::{Lifecycle, OrchestratorState};
pub use newtypes::{ObjectKey, RemoteObjectRef};
pub use outcome::{ReconcileReport, UploadOutcome};
