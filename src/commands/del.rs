use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Remove the specified keys from the session's bound database, returning
/// how many were actually removed. Missing and already-expired keys do not
/// count.
///
/// Ref: <https://redis.io/docs/latest/commands/del/>
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<String>,
}

impl Executable for Del {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut store = session.store.lock();

        let mut count = 0;
        for key in &self.keys {
            if store.remove(session.db, key)? {
                count += 1;
            }
        }

        Ok(Frame::Integer(count))
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut keys = vec![];

        loop {
            match parser.next_string() {
                Ok(key) => keys.push(key),
                Err(CommandParserError::EndOfStream) if !keys.is_empty() => break,
                Err(CommandParserError::EndOfStream) => {
                    return Err(CommandParserError::WrongNumberOfArguments {
                        command: "del".to_string(),
                    }
                    .into())
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { keys })
    }
}
