mod interface;
mod memory;
mod pool;
#[cfg(feature = "redis")]
mod redis;

pub use interface::*;
pub use memory::*;
pub use pool::*;
#[cfg(feature = "redis")]
pub use self::redis::*;
