pub type StillreelResult<T> = Result<T, StillreelError>;

#[derive(thiserror::Error, Debug)]
pub enum StillreelError {
    /// A primary asset (audio or image) is missing, empty, or undecodable.
    /// Always fatal: the run aborts before any output file is created.
    #[error("asset unreadable: {0}")]
    AssetUnreadable(String),

    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A single overlay failed to condition. Recovered by excluding the
    /// overlay; never aborts the run on its own.
    #[error("overlay error: {0}")]
    Overlay(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StillreelError {
    pub fn asset_unreadable(msg: impl Into<String>) -> Self {
        Self::AssetUnreadable(msg.into())
    }

    pub fn invalid_dimensions(msg: impl Into<String>) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    pub fn overlay(msg: impl Into<String>) -> Self {
        Self::Overlay(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            StillreelError::asset_unreadable("x")
                .to_string()
                .contains("asset unreadable:")
        );
        assert!(
            StillreelError::invalid_dimensions("x")
                .to_string()
                .contains("invalid dimensions:")
        );
        assert!(StillreelError::overlay("x").to_string().contains("overlay error:"));
        assert!(StillreelError::encode("x").to_string().contains("encode error:"));
        assert!(StillreelError::io("x").to_string().contains("i/o error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = StillreelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
