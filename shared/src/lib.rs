//! Types shared between the skirmish relay and its clients.

pub mod config;
pub mod protocol;
pub mod vec3;
