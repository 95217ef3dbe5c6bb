use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Whole-message failure; the message is dropped and the session continues
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty message")]
    Empty,

    #[error("unbalanced parentheses at byte {position}")]
    Unbalanced { position: usize },

    #[error("content after closing parenthesis at byte {position}")]
    TrailingContent { position: usize },

    #[error("message is not a parenthesised list")]
    NotAList,

    #[error("message has no keyword")]
    MissingKeyword,

    #[error("invalid cycle time: {0:?}")]
    InvalidTime(String),

    #[error("malformed {keyword} message: {reason}")]
    Malformed { keyword: String, reason: String },
}

/// Failure confined to one field of one object-info record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("field {field} is not a number: {token:?}")]
    InvalidNumber { field: &'static str, token: String },

    #[error("object-info without an id")]
    MissingId,

    #[error("malformed object id: {0:?}")]
    MalformedId(String),
}

/// Observation refused at the registry boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryRejection {
    #[error("ambiguous object id {0}")]
    Ambiguous(String),

    #[error("object {0} is not tracked")]
    NotTracked(String),

    #[error("unknown landmark {0}")]
    UnknownLandmark(String),
}

/// Command that cannot be rendered to protocol text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("{command} has a non-finite {field}")]
    NonFinite {
        command: &'static str,
        field: &'static str,
    },

    #[error("invalid team name: {0:?}")]
    InvalidTeamName(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport closed")]
    Closed,

    #[error("no reply to handshake")]
    HandshakeTimeout,

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    #[error("Registry rejection: {0}")]
    Rejected(#[from] RegistryRejection),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduler is {found}, expected {expected}")]
    SchedulerState {
        expected: SchedulerState,
        found: SchedulerState,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
