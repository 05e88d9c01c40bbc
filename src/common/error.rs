use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    // bad topology: mode, channels, model, adaptor, device type, name collision
    ConfigError = 1001,
    // connect timed out or the link never reached the connected state
    ConnectionError = 1002,
    // exception function code in a modbus response
    ProtocolError = 1003,
    // bare device name matches nothing
    NotFoundError = 1004,
    // bare device name matches devices in several modules
    AmbiguityError = 1005,
    // io failure below the modbus layer
    TransportError = 1006,
}

/// Error for every fallible operation of the crate
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("config error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous name: {0}")]
    Ambiguity(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl DriftError {
    pub fn kind(&self) -> ErrorCode {
        match self {
            DriftError::Config(_) => ErrorCode::ConfigError,
            DriftError::Connection(_) => ErrorCode::ConnectionError,
            DriftError::Protocol(_) => ErrorCode::ProtocolError,
            DriftError::NotFound(_) => ErrorCode::NotFoundError,
            DriftError::Ambiguity(_) => ErrorCode::AmbiguityError,
            DriftError::Transport(_) => ErrorCode::TransportError,
        }
    }
}

impl From<std::io::Error> for DriftError {
    fn from(e: std::io::Error) -> Self {
        DriftError::Transport(e.to_string())
    }
}

impl From<serde_yaml::Error> for DriftError {
    fn from(e: serde_yaml::Error) -> Self {
        DriftError::Config(format!("cannot parse topology: {}", e))
    }
}
