// SPDX-License-Identifier: MPL-2.0
use std::fmt;

use crate::domain::error::ShapeError;

#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Config(String),
    /// Input bytes are not a decodable image.
    Decode(String),
    /// Input decoded but is structurally unusable (e.g. zero dimension).
    InvalidInput(String),
    Model(String),
    /// The worker thread is gone or refused a message.
    Worker(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Decode(e) => write!(f, "Decode Error: {}", e),
            Error::InvalidInput(e) => write!(f, "Invalid Input: {}", e),
            Error::Model(e) => write!(f, "Model Error: {}", e),
            Error::Worker(e) => write!(f, "Worker Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<image_rs::ImageError> for Error {
    fn from(err: image_rs::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<crate::application::port::AIError> for Error {
    fn from(err: crate::application::port::AIError) -> Self {
        Error::Model(err.to_string())
    }
}

impl From<crate::media::model_store::ModelStoreError> for Error {
    fn from(err: crate::media::model_store::ModelStoreError) -> Self {
        Error::Model(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_variant_has_its_prefix() {
        let cases = [
            (Error::Io("disk".into()), "I/O Error: disk"),
            (Error::Decode("png".into()), "Decode Error: png"),
            (Error::Worker("gone".into()), "Worker Error: gone"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let parse_error = toml::from_str::<toml::Table>("= nope").unwrap_err();
        assert!(matches!(Error::from(parse_error), Error::Config(_)));
    }

    #[test]
    fn zero_sized_buffer_is_invalid_input() {
        let err: Error = ShapeError::ZeroDimension {
            width: 0,
            height: 4,
        }
        .into();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn undecodable_bytes_are_a_decode_error() {
        let image_error = image_rs::load_from_memory(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(Error::from(image_error), Error::Decode(_)));
    }

    #[test]
    fn tier_errors_map_to_model_errors() {
        let err = Error::from(crate::application::port::AIError::ModelNotReady);
        assert_eq!(err.to_string(), "Model Error: AI model is not ready");
    }
}
