#![doc = include_str!("../README.md")]

mod error;
mod key;
mod rand;
mod replenish;
#[cfg(feature = "serde")]
mod serde;
mod store;

pub use crate::error::*;
pub use crate::key::*;
pub use crate::rand::*;
pub use crate::replenish::*;
pub use crate::store::*;
