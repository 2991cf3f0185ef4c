use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::store::StoreError;
use crate::Error;

/// Bind the connection to the logical database with the given zero-based
/// index. New connections always use database 0. A failed `SELECT` leaves
/// the binding unchanged.
///
/// Ref: <https://redis.io/docs/latest/commands/select>
#[derive(Debug, PartialEq)]
pub struct Select {
    pub index: usize,
}

impl Executable for Select {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        if !session.store.is_valid_index(self.index) {
            return Err(StoreError::InvalidDatabaseIndex.into());
        }

        session.db = self.index;
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Select {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let index = match parser.next_string() {
            Ok(index) => index,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::WrongNumberOfArguments {
                    command: "select".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        let index: usize = index.parse().map_err(|_| CommandParserError::NotInteger)?;

        if parser.has_more() {
            return Err(CommandParserError::WrongNumberOfArguments {
                command: "select".to_string(),
            }
            .into());
        }

        Ok(Self { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::pubsub::Broker;
    use crate::store::Store;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn session() -> Session {
        let (push, _rx) = mpsc::unbounded_channel();
        Session::new(Store::new(16), Broker::new(), push)
    }

    #[tokio::test]
    async fn switches_the_bound_database() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("SELECT")),
            Frame::Bulk(Bytes::from("3")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(cmd, Command::Select(Select { index: 3 }));

        let mut session = session();
        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Simple("OK".to_string()));
        assert_eq!(session.db, 3);
    }

    #[tokio::test]
    async fn out_of_range_index_leaves_binding_unchanged() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("SELECT")),
            Frame::Bulk(Bytes::from("99")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        let mut session = session();
        session.db = 2;

        let err = cmd.exec(&mut session).err().unwrap();

        assert_eq!(err.to_string(), "ERR DB index is out of range");
        assert_eq!(session.db, 2);
    }

    #[test]
    fn non_numeric_index() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("SELECT")),
            Frame::Bulk(Bytes::from("three")),
        ]);

        let err = Command::try_from(frame).err().unwrap();

        assert_eq!(
            err.to_string(),
            "ERR value is not an integer or out of range"
        );
    }
}
