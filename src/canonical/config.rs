//! Options for a canonicalization run.

use crate::{Error, Result};

/// Name given to every register placeholder minted by the tagger.
///
/// Canonical forms are only comparable while this literal stays the same.
pub const REGISTER_PLACEHOLDER: &str = "archindreg";

/// Name given to every address placeholder minted by the tagger.
///
/// Canonical forms are only comparable while this literal stays the same.
pub const ADDRESS_PLACEHOLDER: &str = "piva_global";

/// Suffix of canonical register names (`0indreg`, `1indreg`, ...).
pub const REGISTER_NAME_SUFFIX: &str = "indreg";

/// Suffix of canonical address names (`0archindva`, `1archindva`, ...).
pub const ADDRESS_NAME_SUFFIX: &str = "archindva";

/// Options for a canonicalization run.
///
/// # Examples
///
/// ```rust
/// use symcanon::CanonicalizeOptions;
///
/// let options = CanonicalizeOptions::default().with_anonymize_addresses(true);
/// assert!(options.anonymize_addresses);
/// assert_eq!(options.placeholder_width, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalizeOptions {
    /// Replace constants that point into mapped memory with numbered address names
    /// (default: `false`).
    pub anonymize_addresses: bool,

    /// Width in bytes given to every placeholder and canonical variable, regardless of the
    /// original register width (default: 4). Must be 1, 2, 4 or 8.
    pub placeholder_width: u8,
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self {
            anonymize_addresses: false,
            placeholder_width: 4,
        }
    }
}

impl CanonicalizeOptions {
    /// Enables or disables address anonymization.
    #[must_use]
    pub fn with_anonymize_addresses(mut self, enabled: bool) -> Self {
        self.anonymize_addresses = enabled;
        self
    }

    /// Sets the canonical placeholder width.
    #[must_use]
    pub fn with_placeholder_width(mut self, width: u8) -> Self {
        self.placeholder_width = width;
        self
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if the placeholder width is not 1, 2, 4 or 8.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.placeholder_width, 1 | 2 | 4 | 8) {
            return Err(Error::Error(format!(
                "invalid placeholder width {} (expected 1, 2, 4 or 8)",
                self.placeholder_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CanonicalizeOptions::default();
        assert!(!options.anonymize_addresses);
        assert_eq!(options.placeholder_width, 4);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_width_validation() {
        assert!(CanonicalizeOptions::default()
            .with_placeholder_width(8)
            .validate()
            .is_ok());
        assert!(CanonicalizeOptions::default()
            .with_placeholder_width(3)
            .validate()
            .is_err());
        assert!(CanonicalizeOptions::default()
            .with_placeholder_width(0)
            .validate()
            .is_err());
    }
}
