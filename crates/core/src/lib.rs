//! Domain core for the rigforge asset pipeline.
//!
//! Pure types and functions only: the metadata schema and its invariants,
//! the rigging lifecycle state machine, and aggregate statistics. Storage,
//! events, and transport live in the `rigforge-db`, `rigforge-events`, and
//! `rigforge-api` crates; callers pass records in and get records back.

pub mod error;
pub mod metadata;
pub mod rigging;
pub mod stats;
pub mod types;
