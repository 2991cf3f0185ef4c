use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Get the value of `key` in the session's bound database. If the key does
/// not exist (or has expired) the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let value = session.store.lock().get(session.db, &self.key)?;

        match value {
            Some(value) => Ok(Frame::Bulk(value)),
            None => Ok(Frame::Null),
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = match parser.next_string() {
            Ok(key) => key,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::WrongNumberOfArguments {
                    command: "get".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        if parser.has_more() {
            return Err(CommandParserError::WrongNumberOfArguments {
                command: "get".to_string(),
            }
            .into());
        }

        Ok(Self { key })
    }
}
