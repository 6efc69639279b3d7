//! Integration tests for zappy-watch
//!
//! Runs the real directory watcher against a temporary directory and an
//! in-memory bucket, end to end through the upload scheduler.

mod common;

mod test_watch_upload;
