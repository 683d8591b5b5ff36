//! Helpers shared by unit tests, integration tests and trace tooling.
pub mod support;
