use crate::KEY_SIZE;
use core::fmt;

/// Lookup table for the URL-safe alphabet `[A-Za-z0-9_-]`.
const URL_SAFE: [bool; 256] = {
    let mut lut = [false; 256];
    let mut c = 0_u8;
    while c < 128 {
        lut[c as usize] = c.is_ascii_alphanumeric() || c == b'-' || c == b'_';
        c += 1;
    }
    lut
};

#[inline]
pub(crate) const fn is_url_safe(byte: u8) -> bool {
    URL_SAFE[byte as usize]
}

/// What is wrong with a key candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// The input is not exactly [`KEY_SIZE`] bytes long.
    Size { len: usize },
    /// The input contains a byte outside `[A-Za-z0-9_-]`. Only the first
    /// offending byte is reported.
    Charset { byte: u8, index: usize },
}

impl ViolationKind {
    /// Stable short name of the check that failed (`"size"` or `"charset"`).
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Size { .. } => "size",
            Self::Charset { .. } => "charset",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Size { len } if len < KEY_SIZE => {
                write!(f, "small key size: got {len} bytes, want {KEY_SIZE}")
            }
            Self::Size { len } => write!(f, "big key size: got {len} bytes, want {KEY_SIZE}"),
            Self::Charset { byte, index } => {
                write!(f, "not URL safe: byte {byte:#04x} at index {index}")
            }
        }
    }
}

/// A single failed check against a named field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

/// Every problem found while validating a key candidate.
///
/// Validation never short-circuits: a too-long input with a `/` in it yields
/// both a size and a charset violation. A `ValidationError` always holds at
/// least one violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub(crate) fn check(field: &'static str, raw: &[u8]) -> Option<Self> {
        let mut violations = Vec::with_capacity(2);

        if raw.len() != KEY_SIZE {
            violations.push(Violation {
                field,
                kind: ViolationKind::Size { len: raw.len() },
            });
        }

        if let Some((index, &byte)) = raw.iter().enumerate().find(|(_, b)| !is_url_safe(**b)) {
            violations.push(Violation {
                field,
                kind: ViolationKind::Charset { byte, index },
            });
        }

        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns `true` if a violation with the given [`ViolationKind::name`]
    /// was recorded.
    pub fn has(&self, name: &str) -> bool {
        self.violations.iter().any(|v| v.kind.name() == name)
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid key")?;
        for (i, violation) in self.violations.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ValidationError {}
