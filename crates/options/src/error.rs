//! Error types for the options engine.

use snafu::Snafu;

/// Result type alias for options-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, serializing, or comparing options.
///
/// Errors are `Clone` because a [`Configurable`](crate::Configurable)
/// records its last prepare failure and surfaces it on subsequent
/// operations; I/O causes are therefore carried as rendered messages
/// rather than as `std::io::Error` values.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The input violated the option grammar, a value failed type
    /// coercion, or a key was not recognized where unknown keys are
    /// rejected.
    #[snafu(display("Invalid argument: {message}"))]
    InvalidArgument {
        /// Description of the offending input.
        message: String,
    },

    /// An option name, option group, or polymorphic identifier could not
    /// be resolved.
    #[snafu(display("Not found: {message}"))]
    NotFound {
        /// What could not be resolved.
        message: String,
    },

    /// The requested operation is not supported for this option, such as
    /// writing a deprecated option or deserializing a by-name field.
    #[snafu(display("Not supported: {message}"))]
    NotSupported {
        /// Why the operation is unsupported.
        message: String,
    },

    /// An I/O failure propagated from a prepare-time external operation,
    /// such as loading a dynamic library.
    #[snafu(display("I/O error: {message}"))]
    Io {
        /// Rendered cause of the failure.
        message: String,
    },
}

impl Error {
    /// Builds an [`Error::InvalidArgument`] from anything displayable.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument { message: message.into() }
    }

    /// Builds an [`Error::NotFound`] from anything displayable.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound { message: message.into() }
    }

    /// Builds an [`Error::NotSupported`] from anything displayable.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Error::NotSupported { message: message.into() }
    }

    /// Builds an [`Error::Io`] from anything displayable.
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io { message: message.into() }
    }

    /// Returns true if this is an [`Error::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }

    /// Returns true if this is an [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this is an [`Error::NotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(Error::invalid_argument("x").is_invalid_argument());
        assert!(Error::not_found("x").is_not_found());
        assert!(Error::not_supported("x").is_not_supported());
        assert!(!Error::io("x").is_not_found());
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::invalid_argument("Empty key found");
        assert_eq!(err.to_string(), "Invalid argument: Empty key found");
    }
}
