mod error;
mod observer;
mod replenisher;

pub use error::*;
pub use observer::*;
pub use replenisher::*;
