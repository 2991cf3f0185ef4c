use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::Error;

/// Deliver a message to every current subscriber of a channel and return
/// how many subscribers received it. Channels are shared across all
/// logical databases.
///
/// Ref: <https://redis.io/docs/latest/commands/publish/>
#[derive(Debug, PartialEq)]
pub struct Publish {
    pub channel: String,
    pub message: Bytes,
}

impl Executable for Publish {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let receivers = session.broker.publish(&self.channel, self.message);
        Ok(Frame::Integer(receivers as i64))
    }
}

impl TryFrom<&mut CommandParser> for Publish {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let wrong_arguments = || CommandParserError::WrongNumberOfArguments {
            command: "publish".to_string(),
        };

        let channel = match parser.next_string() {
            Ok(channel) => channel,
            Err(CommandParserError::EndOfStream) => return Err(wrong_arguments().into()),
            Err(e) => return Err(e.into()),
        };
        let message = match parser.next_bytes() {
            Ok(message) => message,
            Err(CommandParserError::EndOfStream) => return Err(wrong_arguments().into()),
            Err(e) => return Err(e.into()),
        };

        if parser.has_more() {
            return Err(wrong_arguments().into());
        }

        Ok(Self { channel, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::pubsub::Broker;
    use crate::store::Store;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn delivers_to_subscribers() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("PUBLISH")),
            Frame::Bulk(Bytes::from("news")),
            Frame::Bulk(Bytes::from("hello")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        let broker = Broker::new();
        let (subscriber, mut rx) = mpsc::unbounded_channel();
        broker.subscribe(Uuid::new_v4(), "news", subscriber);

        let (push, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(Store::new(16), broker, push);

        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Integer(1));
        assert_eq!(
            rx.try_recv().unwrap(),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("message")),
                Frame::Bulk(Bytes::from("news")),
                Frame::Bulk(Bytes::from("hello")),
            ])
        );
    }

    #[tokio::test]
    async fn no_subscribers_returns_zero() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("PUBLISH")),
            Frame::Bulk(Bytes::from("empty")),
            Frame::Bulk(Bytes::from("hello")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        let (push, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(Store::new(16), Broker::new(), push);

        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Integer(0));
    }

    #[test]
    fn missing_message() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("PUBLISH")),
            Frame::Bulk(Bytes::from("news")),
        ]);

        let err = Command::try_from(frame).err().unwrap();

        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'publish' command"
        );
    }

    #[test]
    fn trailing_arguments() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("PUBLISH")),
            Frame::Bulk(Bytes::from("news")),
            Frame::Bulk(Bytes::from("hello")),
            Frame::Bulk(Bytes::from("extra")),
        ]);

        let err = Command::try_from(frame).err().unwrap();

        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'publish' command"
        );
    }
}
