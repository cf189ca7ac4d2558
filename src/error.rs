// error.rs — Error types surfaced to callers.
//
// Argument errors carry a fixed message per failure site so callers can
// match on the text the same way they would on a thrown exception.

use thiserror::Error;

/// Failures while normalizing call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// The constructor's first argument matched no accepted shape.
    #[error("Invalid arguments for CLAHE constructor")]
    InvalidConstructorArgs,
    /// A tile-grid size passed to the constructor could not be resolved.
    #[error("Unable to parse tileGridSize")]
    TileGridSize,
    /// The value given to `setTilesGridSize` could not be resolved.
    #[error("Unable to parse tilesGridSize")]
    TilesGridSize,
    /// The value given to `setClipLimit` was not a number.
    #[error("Unable to parse clipLimit")]
    ClipLimit,
}

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClaheError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// A value could not be interpreted as an image buffer.
    #[error("{0}")]
    ImageConversion(String),
}

pub type Result<T> = std::result::Result<T, ClaheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(
            ArgumentError::InvalidConstructorArgs.to_string(),
            "Invalid arguments for CLAHE constructor"
        );
        assert_eq!(ArgumentError::TileGridSize.to_string(), "Unable to parse tileGridSize");
        assert_eq!(ArgumentError::TilesGridSize.to_string(), "Unable to parse tilesGridSize");
    }

    #[test]
    fn test_argument_error_is_transparent() {
        let err: ClaheError = ArgumentError::TileGridSize.into();
        assert_eq!(err.to_string(), "Unable to parse tileGridSize");
    }
}
