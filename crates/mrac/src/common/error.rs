//! Error types for the MRA build pipeline

use thiserror::Error;

/// Fatal build error. Recoverable conditions are reported as warnings and
/// never surface here.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("layout error in region {region}: {message}")]
    Layout { region: String, message: String },

    #[error("firmware error: {message}")]
    Firmware { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn layout(region: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Layout {
            region: region.into(),
            message: message.into(),
        }
    }

    pub fn firmware(message: impl Into<String>) -> Self {
        Self::Firmware {
            message: message.into(),
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
