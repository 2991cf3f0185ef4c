use bytes::Bytes;
use std::fmt::Write;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Free-form server metadata as a bulk string: server version plus a live
/// keyspace summary, one line per non-empty database.
///
/// Ref: <https://redis.io/docs/latest/commands/info/>
#[derive(Debug, PartialEq)]
pub struct Info;

impl Executable for Info {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut info = String::new();

        let _ = writeln!(info, "# Server");
        let _ = writeln!(info, "redlite_version:{}", env!("CARGO_PKG_VERSION"));
        let _ = writeln!(info, "databases:{}", session.store.num_databases());

        let _ = writeln!(info, "# Keyspace");
        let store = session.store.lock();
        for db in 0..session.store.num_databases() {
            let keys = store.len(db)?;
            if keys > 0 {
                let _ = writeln!(info, "db{}:keys={}", db, keys);
            }
        }

        Ok(Frame::Bulk(Bytes::from(info)))
    }
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        if parser.has_more() {
            return Err(CommandParserError::WrongNumberOfArguments {
                command: "info".to_string(),
            }
            .into());
        }

        Ok(Self)
    }
}
