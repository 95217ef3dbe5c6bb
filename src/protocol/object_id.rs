//! Object-id grammar: the first group inside every object-info record

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::core::error::FieldError;
use crate::core::types::Side;

/// Close-range objects reported only by their capitalised class letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum UnidentifiedKind {
    #[display(fmt = "F")]
    Flag,
    #[display(fmt = "G")]
    Goal,
    #[display(fmt = "P")]
    Player,
}

/// Identifier of an observed object as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Ball,
    Goal(Side),
    /// Flag name without the leading `f`, tokens joined by one space (`"p l t"`)
    Flag(String),
    Line(String),
    /// Players may be reported with any prefix of team / number / goalie
    Player {
        team: Option<String>,
        number: Option<u8>,
        goalie: bool,
    },
    Unidentified(UnidentifiedKind),
    Unknown(String),
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectId::Ball => write!(f, "b"),
            ObjectId::Goal(side) => write!(f, "g {}", side),
            ObjectId::Flag(name) => write!(f, "f {}", name),
            ObjectId::Line(name) => write!(f, "l {}", name),
            ObjectId::Player {
                team,
                number,
                goalie,
            } => {
                write!(f, "p")?;
                if let Some(team) = team {
                    write!(f, " \"{}\"", team)?;
                }
                if let Some(number) = number {
                    write!(f, " {}", number)?;
                }
                if *goalie {
                    write!(f, " goalie")?;
                }
                Ok(())
            }
            ObjectId::Unidentified(kind) => write!(f, "{}", kind),
            ObjectId::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c: char| c != '"'), char('"')).parse(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != '"').parse(input)
}

fn id_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(
        (char('('), multispace0),
        separated_list0(multispace1, alt((quoted, bare))),
        (multispace0, char(')')),
    )
    .parse(input)
}

/// Parse the id group of an object-info record, parentheses included
pub fn parse_object_id(group: &str) -> Result<ObjectId, FieldError> {
    let malformed = || FieldError::MalformedId(group.to_string());

    let (rest, tokens) = id_tokens(group.trim()).map_err(|_| malformed())?;
    if !rest.trim().is_empty() {
        return Err(malformed());
    }

    let id = match tokens.as_slice() {
        [] => return Err(malformed()),
        ["b" | "ball" | "B"] => ObjectId::Ball,
        ["g" | "goal", side] => match Side::from_token(side) {
            Some(side) => ObjectId::Goal(side),
            None => ObjectId::Unknown(tokens.join(" ")),
        },
        ["G"] => ObjectId::Unidentified(UnidentifiedKind::Goal),
        ["f" | "flag", name @ ..] if !name.is_empty() => ObjectId::Flag(name.join(" ")),
        ["F"] => ObjectId::Unidentified(UnidentifiedKind::Flag),
        ["l" | "line", side] => ObjectId::Line((*side).to_string()),
        ["p" | "player", rest @ ..] => parse_player(rest).ok_or_else(malformed)?,
        ["P"] => ObjectId::Unidentified(UnidentifiedKind::Player),
        _ => ObjectId::Unknown(tokens.join(" ")),
    };

    Ok(id)
}

fn parse_player(tokens: &[&str]) -> Option<ObjectId> {
    if tokens.len() > 3 {
        return None;
    }
    let team = tokens.first().map(|t| t.to_string());
    let number = match tokens.get(1) {
        Some(n) => Some(n.parse::<u8>().ok()?),
        None => None,
    };
    let goalie = match tokens.get(2) {
        Some(&"goalie") => true,
        Some(_) => return None,
        None => false,
    };
    Some(ObjectId::Player {
        team,
        number,
        goalie,
    })
}
