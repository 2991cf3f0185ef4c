use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Return the values of all specified keys, in request order. For every key
/// that is missing or expired, the special value `nil` takes its place.
///
/// Ref: <https://redis.io/docs/latest/commands/mget/>
#[derive(Debug, PartialEq)]
pub struct Mget {
    pub keys: Vec<String>,
}

impl Executable for Mget {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut store = session.store.lock();

        let mut res = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let frame = match store.get(session.db, key)? {
                Some(value) => Frame::Bulk(value),
                None => Frame::Null,
            };
            res.push(frame);
        }

        Ok(Frame::Array(res))
    }
}

impl TryFrom<&mut CommandParser> for Mget {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut keys = vec![];

        loop {
            match parser.next_string() {
                Ok(key) => keys.push(key),
                Err(CommandParserError::EndOfStream) if !keys.is_empty() => break,
                Err(CommandParserError::EndOfStream) => {
                    return Err(CommandParserError::WrongNumberOfArguments {
                        command: "mget".to_string(),
                    }
                    .into())
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { keys })
    }
}
