//! Server → agent messages
//!
//! `parse_message` validates the envelope, classifies the message by its
//! leading keyword and, for perception snapshots, decomposes every
//! object-info record into a `ParsedObservation`.

use serde::Serialize;

use crate::core::error::{FieldError, ParseError};
use crate::core::types::{Cycle, Side};
use crate::protocol::body::{parse_body_state, BodyState};
use crate::protocol::object_id::{parse_object_id, ObjectId};
use crate::protocol::scan::{group_inner, outer_body, take_atom, top_level_spans};

/// Message class derived from the leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum MessageKind {
    #[display(fmt = "init")]
    Init,
    #[display(fmt = "sense_body")]
    SenseBody,
    #[display(fmt = "see")]
    See,
    #[display(fmt = "error")]
    ServerError,
    #[display(fmt = "unrecognized")]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub kind: MessageKind,
    pub time: Option<Cycle>,
}

/// Reply to `(init ...)` or `(reconnect ...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitInfo {
    pub side: Side,
    pub number: u8,
    pub play_mode: String,
}

/// One object-info record; absent fields were not reported
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedObservation {
    pub id: ObjectId,
    pub time: Cycle,
    pub distance: Option<f64>,
    pub direction: Option<f64>,
    pub distance_change: Option<f64>,
    pub direction_change: Option<f64>,
    pub body_facing: Option<f64>,
    pub head_facing: Option<f64>,
    pub pointing: Option<f64>,
    pub tackling: bool,
    pub kicking: bool,
}

impl ParsedObservation {
    pub fn new(id: ObjectId, time: Cycle) -> Self {
        Self {
            id,
            time,
            distance: None,
            direction: None,
            distance_change: None,
            direction_change: None,
            body_facing: None,
            head_facing: None,
            pointing: None,
            tackling: false,
            kicking: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Perception {
    pub time: Cycle,
    pub observations: Vec<ParsedObservation>,
    /// Fields or records that were skipped while decoding
    pub field_errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Init(InitInfo),
    SenseBody {
        body: BodyState,
        field_errors: Vec<FieldError>,
    },
    See(Perception),
    ServerError(String),
    Unrecognized { keyword: String },
}

impl ServerMessage {
    pub fn header(&self) -> MessageHeader {
        let (kind, time) = match self {
            ServerMessage::Init(_) => (MessageKind::Init, None),
            ServerMessage::SenseBody { body, .. } => (MessageKind::SenseBody, Some(body.time)),
            ServerMessage::See(p) => (MessageKind::See, Some(p.time)),
            ServerMessage::ServerError(_) => (MessageKind::ServerError, None),
            ServerMessage::Unrecognized { .. } => (MessageKind::Unrecognized, None),
        };
        MessageHeader { kind, time }
    }
}

/// Trim transport residue: whitespace and the NUL terminator the server appends
pub fn clean_datagram(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Parse one raw message
pub fn parse_message(raw: &str) -> Result<ServerMessage, ParseError> {
    let body = outer_body(clean_datagram(raw))?;
    let (keyword, rest) = take_atom(body).ok_or(ParseError::MissingKeyword)?;

    match keyword {
        "see" => {
            let (time, rest) = parse_time(rest)?;
            Ok(ServerMessage::See(parse_perception(time, rest)))
        }
        "sense_body" => {
            let (time, rest) = parse_time(rest)?;
            let (body, field_errors) = parse_body_state(time, rest);
            Ok(ServerMessage::SenseBody { body, field_errors })
        }
        "init" | "reconnect" => parse_init(keyword, rest).map(ServerMessage::Init),
        "error" | "warning" => Ok(ServerMessage::ServerError(rest.trim().to_string())),
        other => Ok(ServerMessage::Unrecognized {
            keyword: other.to_string(),
        }),
    }
}

fn parse_time(rest: &str) -> Result<(Cycle, &str), ParseError> {
    let (token, rest) = take_atom(rest).ok_or_else(|| ParseError::InvalidTime(String::new()))?;
    let time = token
        .parse::<Cycle>()
        .map_err(|_| ParseError::InvalidTime(token.to_string()))?;
    Ok((time, rest))
}

fn parse_init(keyword: &str, rest: &str) -> Result<InitInfo, ParseError> {
    let malformed = |reason: &str| ParseError::Malformed {
        keyword: keyword.to_string(),
        reason: reason.to_string(),
    };

    let mut atoms = rest.split_whitespace();
    let side = atoms
        .next()
        .and_then(Side::from_token)
        .ok_or_else(|| malformed("missing side"))?;
    let number = atoms
        .next()
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| malformed("missing uniform number"))?;
    let play_mode = atoms.next().unwrap_or_default().to_string();

    Ok(InitInfo {
        side,
        number,
        play_mode,
    })
}

/// Field slots in wire order when two or more numbers are present
const FIELD_ORDER: [&str; 7] = [
    "distance",
    "direction",
    "distance_change",
    "direction_change",
    "body_facing",
    "head_facing",
    "pointing",
];

/// Decompose every depth-1 group of a perception body
pub fn parse_perception(time: Cycle, body: &str) -> Perception {
    let mut observations = Vec::new();
    let mut field_errors = Vec::new();

    for span in top_level_spans(body) {
        match parse_object_info(time, span.slice(body), &mut field_errors) {
            Ok(obs) => observations.push(obs),
            Err(e) => field_errors.push(e),
        }
    }

    Perception {
        time,
        observations,
        field_errors,
    }
}

/// Decompose one `((id ...) n n ...)` record
///
/// Numeric fields that fail conversion are recorded in `field_errors` and
/// left absent; only a missing or malformed id discards the record.
pub fn parse_object_info(
    time: Cycle,
    record: &str,
    field_errors: &mut Vec<FieldError>,
) -> Result<ParsedObservation, FieldError> {
    let inner = group_inner(record);
    let id_span = top_level_spans(inner)
        .into_iter()
        .next()
        .ok_or(FieldError::MissingId)?;
    if !inner[..id_span.start].trim().is_empty() {
        return Err(FieldError::MalformedId(record.to_string()));
    }
    let id = parse_object_id(id_span.slice(inner))?;
    let mut obs = ParsedObservation::new(id, time);

    let mut tokens: Vec<&str> = inner[id_span.end..].split_whitespace().collect();
    while let Some(&flag) = tokens.last() {
        match flag {
            "t" => obs.tackling = true,
            "k" => obs.kicking = true,
            _ => break,
        }
        tokens.pop();
    }

    // a lone number is a bearing: distance is withheld for far objects
    let slots: &[&'static str] = if tokens.len() == 1 {
        &FIELD_ORDER[1..2]
    } else {
        &FIELD_ORDER[..]
    };

    for (&field, token) in slots.iter().zip(tokens.iter()) {
        let value = match token.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                field_errors.push(FieldError::InvalidNumber {
                    field,
                    token: token.to_string(),
                });
                continue;
            }
        };
        let slot = match field {
            "distance" => &mut obs.distance,
            "direction" => &mut obs.direction,
            "distance_change" => &mut obs.distance_change,
            "direction_change" => &mut obs.direction_change,
            "body_facing" => &mut obs.body_facing,
            "head_facing" => &mut obs.head_facing,
            _ => &mut obs.pointing,
        };
        *slot = Some(value);
    }

    Ok(obs)
}
