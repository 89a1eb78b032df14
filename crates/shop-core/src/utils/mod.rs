//! Helpers shared by the core modules.

pub mod formatting;

pub use formatting::truncate_id;
