mod short_key;
mod validation;

pub use short_key::*;
pub use validation::*;
