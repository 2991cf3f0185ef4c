use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Return all keys in the session's bound database matching a glob-style
/// pattern (`*` any run of characters, `?` any single character). Expired
/// keys never appear.
///
/// Ref: <https://redis.io/docs/latest/commands/keys/>
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: String,
}

impl Executable for Keys {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let keys = session.store.lock().keys(session.db, &self.pattern)?;

        let res = keys
            .into_iter()
            .map(|key| Frame::Bulk(Bytes::from(key)))
            .collect();

        Ok(Frame::Array(res))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = match parser.next_string() {
            Ok(pattern) => pattern,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::WrongNumberOfArguments {
                    command: "keys".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        if parser.has_more() {
            return Err(CommandParserError::WrongNumberOfArguments {
                command: "keys".to_string(),
            }
            .into());
        }

        Ok(Self { pattern })
    }
}
