//! Zappy Core - Domain logic for the watch-and-upload pipeline
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `FileEvent`, `ObjectKey`, `RemoteObjectRef`, `UploadOutcome`
//! - **Use cases** - `UploadFileUseCase` (per-event handler), `ReconcileUseCase` (startup scan)
//! - **Port definitions** - `IObjectStore` for the storage backend, `IUploadObserver` for reporting
//! - **Configuration** - TOML settings file, flag overrides and startup validation
//!
//! # Architecture
//!
//! The domain module has no I/O. Ports define the trait interfaces that
//! adapter crates (`zappy-gcs`, the CLI's console observer) implement.
//! Use cases drive the domain through those ports.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
