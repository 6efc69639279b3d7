//! Integration tests for zappy-gcs
//!
//! Uses wiremock to simulate the Cloud Storage JSON API and the OAuth2
//! token endpoint, and verifies end-to-end behavior of existence checks,
//! conditional uploads and token handling.

mod common;

mod test_auth;
mod test_objects;
