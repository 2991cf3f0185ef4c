pub mod del;
pub mod executable;
pub mod get;
pub mod info;
pub mod keys;
pub mod mget;
pub mod mset;
pub mod ping;
pub mod publish;
pub mod select;
pub mod set;
pub mod subscribe;
pub mod unsubscribe;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

use del::Del;
use get::Get;
use info::Info;
use keys::Keys;
use mget::Mget;
use mset::Mset;
use ping::Ping;
use publish::Publish;
use select::Select;
use set::Set;
use subscribe::Subscribe;
use unsubscribe::Unsubscribe;

/// The closed set of supported commands. A request that parses but names
/// anything else is rejected with `UnknownCommand` and the connection stays
/// open.
#[derive(Debug, PartialEq)]
pub enum Command {
    Del(Del),
    Get(Get),
    Info(Info),
    Keys(Keys),
    Mget(Mget),
    Mset(Mset),
    Ping(Ping),
    Publish(Publish),
    Select(Select),
    Set(Set),
    Subscribe(Subscribe),
    Unsubscribe(Unsubscribe),
}

impl Command {
    /// Lowercase command name, as used in error replies.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Del(_) => "del",
            Command::Get(_) => "get",
            Command::Info(_) => "info",
            Command::Keys(_) => "keys",
            Command::Mget(_) => "mget",
            Command::Mset(_) => "mset",
            Command::Ping(_) => "ping",
            Command::Publish(_) => "publish",
            Command::Select(_) => "select",
            Command::Set(_) => "set",
            Command::Subscribe(_) => "subscribe",
            Command::Unsubscribe(_) => "unsubscribe",
        }
    }

    /// Whether a session in subscribe mode may run this command.
    pub fn allowed_in_subscribe_mode(&self) -> bool {
        matches!(
            self,
            Command::Subscribe(_)
                | Command::Unsubscribe(_)
                | Command::Publish(_)
                | Command::Ping(_)
        )
    }
}

impl Executable for Command {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        match self {
            Command::Del(cmd) => cmd.exec(session),
            Command::Get(cmd) => cmd.exec(session),
            Command::Info(cmd) => cmd.exec(session),
            Command::Keys(cmd) => cmd.exec(session),
            Command::Mget(cmd) => cmd.exec(session),
            Command::Mset(cmd) => cmd.exec(session),
            Command::Ping(cmd) => cmd.exec(session),
            Command::Publish(cmd) => cmd.exec(session),
            Command::Select(cmd) => cmd.exec(session),
            Command::Set(cmd) => cmd.exec(session),
            Command::Subscribe(cmd) => cmd.exec(session),
            Command::Unsubscribe(cmd) => cmd.exec(session),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays of bulk strings.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        match &command_name[..] {
            "del" => Del::try_from(parser).map(Command::Del),
            "get" => Get::try_from(parser).map(Command::Get),
            "info" => Info::try_from(parser).map(Command::Info),
            "keys" => Keys::try_from(parser).map(Command::Keys),
            "mget" => Mget::try_from(parser).map(Command::Mget),
            "mset" => Mset::try_from(parser).map(Command::Mset),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "publish" => Publish::try_from(parser).map(Command::Publish),
            "select" => Select::try_from(parser).map(Command::Select),
            "set" => Set::try_from(parser).map(Command::Set),
            "subscribe" => Subscribe::try_from(parser).map(Command::Subscribe),
            "unsubscribe" => Unsubscribe::try_from(parser).map(Command::Unsubscribe),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name,
            }
            .into()),
        }
    }
}

struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match command_name {
            Frame::Simple(s) => Ok(s.to_lowercase()),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_lowercase())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representations may be strings.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self.parts.next().ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn has_more(&self) -> bool {
        self.parts.len() > 0
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub(crate) enum CommandParserError {
    #[error("ERR protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    /// MSET takes key/value pairs; an odd argument count means the request
    /// shape itself is broken and nothing may be applied.
    #[error("ERR wrong number of arguments for 'mset' command")]
    MalformedArguments,
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR invalid expire time in '{command}' command")]
    InvalidExpiry { command: String },
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("ERR protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
