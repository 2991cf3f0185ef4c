use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Set the given keys to their respective values, replacing existing values.
/// The batch is applied while holding the store lock, so it is atomic with
/// respect to other store operations; an odd argument count is rejected at
/// parse time and mutates nothing.
///
/// Ref: <https://redis.io/docs/latest/commands/mset/>
#[derive(Debug, PartialEq)]
pub struct Mset {
    pub pairs: Vec<(String, Bytes)>,
}

impl Executable for Mset {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut store = session.store.lock();

        for (key, value) in self.pairs {
            store.set(session.db, key, value, None)?;
        }

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Mset {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut pairs = vec![];

        loop {
            match parser.next_string() {
                Ok(key) => {
                    let value = match parser.next_bytes() {
                        Ok(value) => value,
                        // A key without a value: the request shape is broken.
                        Err(CommandParserError::EndOfStream) => {
                            return Err(CommandParserError::MalformedArguments.into())
                        }
                        Err(err) => return Err(err.into()),
                    };
                    pairs.push((key, value));
                }
                Err(CommandParserError::EndOfStream) if !pairs.is_empty() => break,
                Err(CommandParserError::EndOfStream) => {
                    return Err(CommandParserError::WrongNumberOfArguments {
                        command: "mset".to_string(),
                    }
                    .into())
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { pairs })
    }
}
