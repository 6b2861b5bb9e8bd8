//! Skirmish relay server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod app;
pub mod config;
pub mod error;
pub mod mutator;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;
pub mod ws;
