use crate::{Error, Result};
use ::rand::{TryRngCore, rngs::OsRng};

/// A source of random bytes for key generation.
///
/// This abstraction allows you to plug in the OS random source or a fixed
/// source in tests.
///
/// # Example
/// ```
/// use keygen::{Key, RandSource};
///
/// struct Zeroes;
/// impl RandSource for Zeroes {
///     fn try_fill(&self, dest: &mut [u8]) -> keygen::Result<()> {
///         dest.fill(0);
///         Ok(())
///     }
/// }
///
/// assert_eq!(Key::generate_with(&Zeroes).unwrap().as_str(), "AAAAAA");
/// ```
pub trait RandSource: Send + Sync {
    /// Fills `dest` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RandomSource`] if no randomness is available.
    fn try_fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// A `RandSource` backed by the operating system CSPRNG (`getrandom`).
///
/// Every call reads directly from the OS, so keys never depend on a
/// user-space generator's state. The type is zero-sized and freely shared
/// across threads.
#[derive(Default, Clone, Copy, Debug)]
pub struct OsRandom;

impl RandSource for OsRandom {
    fn try_fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| Error::RandomSource {
            reason: e.to_string(),
        })
    }
}
