use thiserror::Error;

/// Library error type for style-studio operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The content image is missing or cannot be decoded.
    #[error("cannot read content image: {0}")]
    BadContentImage(String),

    /// No usable style images remain after scanning and stylization.
    #[error("no usable style images")]
    EmptyStyleSet,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
