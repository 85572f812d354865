#![deny(unsafe_code)]

//! Shared test utilities for the TwinWire workspace.
//!
//! Provides reusable fixtures and config builders so that individual crate
//! tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! twinwire-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod pair;
