use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload of {len} bytes exceeds segment capacity of {max} bytes")]
    ObjectTooLarge { len: usize, max: u64 },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Corrupt segment {path}: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Stored bytes are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, HoardError>;
