//! Handoff relay server library
//!
//! This library exposes the server's internal modules for integration testing.

pub mod args;
pub mod constants;
pub mod gateway;
pub mod logging;
pub mod offers;
