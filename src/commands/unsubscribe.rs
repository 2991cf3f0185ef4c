use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Unsubscribe the connection from the given channels, or from every
/// channel when none are named. Once the subscription count reaches zero
/// the connection leaves subscribe mode.
///
/// Ref: <https://redis.io/docs/latest/commands/unsubscribe/>
#[derive(Debug, PartialEq)]
pub struct Unsubscribe {
    pub channels: Vec<String>,
}

impl Executable for Unsubscribe {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let channels = if self.channels.is_empty() {
            session.broker.channels_of(session.id)
        } else {
            self.channels
        };

        if channels.is_empty() {
            session.subscriptions = 0;
            return Ok(Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"unsubscribe")),
                Frame::Null,
                Frame::Integer(0),
            ]));
        }

        let mut replies = Vec::with_capacity(channels.len());
        for channel in channels {
            let count = session.broker.unsubscribe(session.id, &channel);
            session.subscriptions = count;

            replies.push(Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"unsubscribe")),
                Frame::Bulk(Bytes::from(channel)),
                Frame::Integer(count as i64),
            ]));
        }

        let mut replies = replies.into_iter();
        let first = replies.next().expect("channel list is non-empty");
        for reply in replies {
            let _ = session.push.send(reply);
        }

        Ok(first)
    }
}

impl TryFrom<&mut CommandParser> for Unsubscribe {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut channels = vec![];

        loop {
            match parser.next_string() {
                Ok(channel) => channels.push(channel),
                Err(CommandParserError::EndOfStream) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { channels })
    }
}
