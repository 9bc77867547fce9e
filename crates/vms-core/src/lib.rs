//! vms-core - Core types for vehicle bus telemetry
//!
//! This crate holds the pieces every other layer agrees on:
//!
//! - the [`Message`] model produced by line extraction (J1939, J1708 or invalid)
//! - the [`ParameterStore`] seam that decoders write engineering values into
//!
//! It has no knowledge of transports or scaling tables.

pub mod models;
pub mod store;

pub use models::*;
pub use store::{InMemoryParameterStore, ParameterStore};
