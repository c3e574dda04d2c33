//! Error types
//!
//! A crate-wide [`Error`] wraps one enum per failure domain. Per-frame
//! problems (a transport hiccup, a malformed message) are reported to the
//! caller and never halt the frame loop; configuration problems are fatal
//! at startup.

use std::fmt;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Wire encoding/decoding failure
    Codec(CodecError),
    /// Broker or routing failure
    Transport(TransportError),
    /// Invalid configuration
    Config(ConfigError),
    /// The subscription was disposed or its broker side went away
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "Codec error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Closed => write!(f, "Subscription closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Closed => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended in the middle of a value
    UnexpectedEof,
    /// Varint longer than 10 bytes
    VarintOverflow,
    /// Wire type outside the protocol's range
    InvalidWireType(u8),
    /// Group wire types are recognised but not supported
    UnsupportedWireType(u8),
    /// String field was not valid UTF-8
    InvalidUtf8,
    /// Enum field carried a value with no matching variant
    InvalidEnum { field: &'static str, value: u64 },
    /// Length prefix exceeds the remaining buffer
    LengthOverflow,
    /// Field number zero or out of range
    InvalidFieldNumber(u64),
    /// Nested messages deeper than the decoder allows
    NestingTooDeep,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEof => write!(f, "unexpected end of buffer"),
            CodecError::VarintOverflow => write!(f, "varint too long"),
            CodecError::InvalidWireType(t) => write!(f, "invalid wire type: {}", t),
            CodecError::UnsupportedWireType(t) => write!(f, "unsupported wire type: {}", t),
            CodecError::InvalidUtf8 => write!(f, "invalid UTF-8 in string field"),
            CodecError::InvalidEnum { field, value } => {
                write!(f, "invalid value {} for enum field {}", value, field)
            }
            CodecError::LengthOverflow => write!(f, "length prefix exceeds buffer"),
            CodecError::InvalidFieldNumber(n) => write!(f, "invalid field number: {}", n),
            CodecError::NestingTooDeep => write!(f, "message nesting too deep"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Broker / routing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Publish or bind against an exchange nobody declared
    ExchangeNotDeclared(String),
    /// Routing key is empty or contains wildcard characters
    InvalidRoutingKey(String),
    /// Binding key is empty or malformed
    InvalidBindingKey(String),
    /// Error reported by the broker client
    Broker(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ExchangeNotDeclared(name) => {
                write!(f, "exchange not declared: {}", name)
            }
            TransportError::InvalidRoutingKey(key) => write!(f, "invalid routing key: {:?}", key),
            TransportError::InvalidBindingKey(key) => write!(f, "invalid binding key: {:?}", key),
            TransportError::Broker(msg) => write!(f, "broker error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Configuration errors, fatal at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Exchange name is required
    MissingExchange,
    /// Broker host is required
    MissingHost,
    /// Port is not a number in range
    InvalidPort(String),
    /// Sender id would break `{senderId}.{topic}` routing
    InvalidSenderId(String),
    /// A message TTL of zero would expire every frame
    InvalidTtl,
    /// Sitting heuristic parameter out of range
    InvalidSittingParameter(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingExchange => write!(f, "exchange is not specified"),
            ConfigError::MissingHost => write!(f, "broker host is not specified"),
            ConfigError::InvalidPort(port) => write!(f, "invalid broker port: {:?}", port),
            ConfigError::InvalidSenderId(id) => {
                write!(f, "sender id must be a single routing word: {:?}", id)
            }
            ConfigError::InvalidTtl => write!(f, "message TTL must be greater than zero"),
            ConfigError::InvalidSittingParameter(name) => {
                write!(f, "invalid sitting heuristic parameter: {}", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
