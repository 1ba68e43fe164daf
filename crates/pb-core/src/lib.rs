//! Core of the pulseboard dashboard pipeline.
//!
//! Everything in this crate is synchronous and free of I/O apart from
//! reading the config file: canonical record types, the normalization step
//! that maps raw service payloads onto them, pure statistics and
//! filter/sort derivations, and the owned dashboard state that applies
//! sequenced fetch results.

pub mod config;
pub mod normalize;
pub mod roster;
pub mod state;
pub mod stats;
pub mod types;
pub mod view;
