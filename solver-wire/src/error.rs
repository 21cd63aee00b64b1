use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of buffer: needed {needed} bytes, had {available}")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("string bytes are not valid ascii")]
    InvalidAsciiString,

    #[error("unrecognized strategy option tag {0:#04x}")]
    InvalidOptionTag(u8),

    #[error("length field {0} overflows the target integer type")]
    LengthOverflow(u64),

    #[error("invalid action token in {0:?}")]
    InvalidAction(String),
}

pub type WireResult<T> = Result<T, WireError>;
