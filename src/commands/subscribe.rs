use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Subscribe the connection to the given channels, entering subscribe mode.
/// One confirmation array is produced per channel; the first is the direct
/// reply and the rest are pushed through the connection's out-of-band
/// channel.
///
/// Ref: <https://redis.io/docs/latest/commands/subscribe/>
#[derive(Debug, PartialEq)]
pub struct Subscribe {
    pub channels: Vec<String>,
}

impl Executable for Subscribe {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut replies = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let count = session
                .broker
                .subscribe(session.id, channel, session.push.clone());
            session.subscriptions = count;

            replies.push(Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"subscribe")),
                Frame::Bulk(Bytes::from(channel.clone())),
                Frame::Integer(count as i64),
            ]));
        }

        let mut replies = replies.into_iter();
        let first = replies.next().expect("parser guarantees one channel");
        for reply in replies {
            let _ = session.push.send(reply);
        }

        Ok(first)
    }
}

impl TryFrom<&mut CommandParser> for Subscribe {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut channels = vec![];

        loop {
            match parser.next_string() {
                Ok(channel) => channels.push(channel),
                Err(CommandParserError::EndOfStream) if !channels.is_empty() => break,
                Err(CommandParserError::EndOfStream) => {
                    return Err(CommandParserError::WrongNumberOfArguments {
                        command: "subscribe".to_string(),
                    }
                    .into())
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { channels })
    }
}
