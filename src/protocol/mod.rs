//! Wire protocol: nested-parenthesis messages in, command text out

pub mod body;
pub mod command;
pub mod message;
pub mod object_id;
pub mod scan;

pub use body::BodyState;
pub use command::{Command, CommandCategory};
pub use message::{
    parse_message, InitInfo, MessageHeader, MessageKind, ParsedObservation, Perception,
    ServerMessage,
};
pub use object_id::{ObjectId, UnidentifiedKind};
