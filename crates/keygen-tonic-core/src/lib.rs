#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access `keygen` via
// `keygen_tonic_core::keygen`
pub use keygen;
