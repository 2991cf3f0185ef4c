use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::session::Session;
use crate::store::now_millis;
use crate::Error;

/// Condition restricting when the write applies. A blocked write replies
/// with a null bulk string and mutates nothing.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Condition {
    /// `NX`: only set the key if it does not already exist.
    IfMissing,
    /// `XX`: only set the key if it already exists.
    IfExists,
}

/// Set `key` to `value` in the session's bound database, optionally with a
/// relative expiry (`EX` seconds or `PX` milliseconds) and an existence
/// condition (`NX` / `XX`). An overwrite without an expiry option clears any
/// prior expiry.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub expire_millis: Option<u64>,
    pub condition: Option<Condition>,
}

impl Executable for Set {
    fn exec(self, session: &mut Session) -> Result<Frame, Error> {
        let mut store = session.store.lock();

        if let Some(condition) = self.condition {
            // An expired key counts as absent.
            let exists = store.get(session.db, &self.key)?.is_some();
            let blocked = match condition {
                Condition::IfMissing => exists,
                Condition::IfExists => !exists,
            };
            if blocked {
                return Ok(Frame::Null);
            }
        }

        // The parser bounds the expiry, so saturating math cannot kick in.
        let expires_at = self.expire_millis.map(|ms| now_millis().saturating_add(ms));
        store.set(session.db, self.key, self.value, expires_at)?;

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = match parser.next_string() {
            Ok(key) => key,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::WrongNumberOfArguments {
                    command: "set".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        let value = match parser.next_bytes() {
            Ok(value) => value,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::WrongNumberOfArguments {
                    command: "set".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let mut expire_millis = None;
        let mut condition = None;

        loop {
            let option = match parser.next_string() {
                Ok(option) => option,
                Err(CommandParserError::EndOfStream) => break,
                Err(e) => return Err(e.into()),
            };

            if option.eq_ignore_ascii_case("nx") {
                if condition == Some(Condition::IfExists) {
                    return Err(CommandParserError::Syntax.into());
                }
                condition = Some(Condition::IfMissing);
            } else if option.eq_ignore_ascii_case("xx") {
                if condition == Some(Condition::IfMissing) {
                    return Err(CommandParserError::Syntax.into());
                }
                condition = Some(Condition::IfExists);
            } else if option.eq_ignore_ascii_case("ex") {
                if expire_millis.is_some() {
                    return Err(CommandParserError::Syntax.into());
                }
                expire_millis = Some(checked_expiry(next_expiry(parser)?, 1000)?);
            } else if option.eq_ignore_ascii_case("px") {
                if expire_millis.is_some() {
                    return Err(CommandParserError::Syntax.into());
                }
                expire_millis = Some(checked_expiry(next_expiry(parser)?, 1)?);
            } else {
                return Err(CommandParserError::Syntax.into());
            }
        }

        Ok(Self {
            key,
            value,
            expire_millis,
            condition,
        })
    }
}

fn next_expiry(parser: &mut CommandParser) -> Result<u64, Error> {
    let raw = match parser.next_string() {
        Ok(raw) => raw,
        Err(CommandParserError::EndOfStream) => return Err(CommandParserError::Syntax.into()),
        Err(e) => return Err(e.into()),
    };
    let value: i64 = raw.parse().map_err(|_| CommandParserError::NotInteger)?;
    if value <= 0 {
        return Err(invalid_expiry());
    }

    Ok(value as u64)
}

/// Scale an expiry to milliseconds, rejecting values whose absolute deadline
/// would not fit in the expiry clock.
fn checked_expiry(value: u64, unit_millis: u64) -> Result<u64, Error> {
    value
        .checked_mul(unit_millis)
        .filter(|ms| now_millis().checked_add(*ms).is_some())
        .ok_or_else(invalid_expiry)
}

fn invalid_expiry() -> Error {
    CommandParserError::InvalidExpiry {
        command: "set".to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::pubsub::Broker;
    use crate::store::Store;
    use tokio::sync::mpsc;

    fn session() -> Session {
        let (push, _rx) = mpsc::unbounded_channel();
        Session::new(Store::new(16), Broker::new(), push)
    }

    fn set_frame(args: &[&str]) -> Frame {
        let mut parts = vec![Frame::Bulk(Bytes::from("SET"))];
        parts.extend(args.iter().map(|a| Frame::Bulk(Bytes::from(a.to_string()))));
        Frame::Array(parts)
    }

    #[tokio::test]
    async fn plain_set() {
        let cmd = Command::try_from(set_frame(&["foo", "xy"])).unwrap();

        assert_eq!(
            cmd,
            Command::Set(Set {
                key: String::from("foo"),
                value: Bytes::from("xy"),
                expire_millis: None,
                condition: None,
            })
        );

        let mut session = session();
        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Simple("OK".to_string()));
        assert_eq!(
            session.store.lock().get(0, "foo").unwrap(),
            Some(Bytes::from("xy"))
        );
    }

    #[tokio::test]
    async fn set_with_expiry() {
        let cmd = Command::try_from(set_frame(&["foo", "bar", "EX", "10"])).unwrap();

        assert_eq!(
            cmd,
            Command::Set(Set {
                key: String::from("foo"),
                value: Bytes::from("bar"),
                expire_millis: Some(10_000),
                condition: None,
            })
        );

        let mut session = session();
        let before = now_millis();
        cmd.exec(&mut session).unwrap();

        let snapshot = session.store.lock().snapshot();
        let (_, _, expires_at) = &snapshot[0][0];
        let expires_at = expires_at.unwrap();
        assert!(expires_at >= before + 10_000);
        assert!(expires_at <= now_millis() + 10_000);
    }

    #[tokio::test]
    async fn px_expiry_is_milliseconds() {
        let cmd = Command::try_from(set_frame(&["foo", "bar", "PX", "1500"])).unwrap();

        let mut session = session();
        let before = now_millis();
        cmd.exec(&mut session).unwrap();

        let snapshot = session.store.lock().snapshot();
        let (_, _, expires_at) = &snapshot[0][0];
        let expires_at = expires_at.unwrap();
        assert!(expires_at >= before + 1500);
        assert!(expires_at <= now_millis() + 1500);
    }

    #[tokio::test]
    async fn nx_blocks_overwrite() {
        let mut session = session();
        session
            .store
            .lock()
            .set(0, "foo".to_string(), Bytes::from("old"), None)
            .unwrap();

        let cmd = Command::try_from(set_frame(&["foo", "new", "NX"])).unwrap();
        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Null);
        assert_eq!(
            session.store.lock().get(0, "foo").unwrap(),
            Some(Bytes::from("old"))
        );

        let cmd = Command::try_from(set_frame(&["fresh", "v", "NX"])).unwrap();
        assert_eq!(
            cmd.exec(&mut session).unwrap(),
            Frame::Simple("OK".to_string())
        );
    }

    #[tokio::test]
    async fn xx_requires_existing_key() {
        let mut session = session();

        let cmd = Command::try_from(set_frame(&["foo", "v", "XX"])).unwrap();
        let result = cmd.exec(&mut session).unwrap();

        assert_eq!(result, Frame::Null);
        assert_eq!(session.store.lock().get(0, "foo").unwrap(), None);

        session
            .store
            .lock()
            .set(0, "foo".to_string(), Bytes::from("old"), None)
            .unwrap();
        let cmd = Command::try_from(set_frame(&["foo", "new", "XX"])).unwrap();
        assert_eq!(
            cmd.exec(&mut session).unwrap(),
            Frame::Simple("OK".to_string())
        );
        assert_eq!(
            session.store.lock().get(0, "foo").unwrap(),
            Some(Bytes::from("new"))
        );
    }

    #[tokio::test]
    async fn nx_treats_expired_key_as_absent() {
        let mut session = session();
        session
            .store
            .lock()
            .set(
                0,
                "foo".to_string(),
                Bytes::from("old"),
                Some(now_millis() - 1),
            )
            .unwrap();

        let cmd = Command::try_from(set_frame(&["foo", "new", "NX"])).unwrap();

        assert_eq!(
            cmd.exec(&mut session).unwrap(),
            Frame::Simple("OK".to_string())
        );
    }

    #[test]
    fn nx_and_xx_conflict() {
        let err = Command::try_from(set_frame(&["foo", "bar", "NX", "XX"]))
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "ERR syntax error");
    }

    #[test]
    fn ex_and_px_conflict() {
        let err = Command::try_from(set_frame(&["foo", "bar", "EX", "1", "PX", "1000"]))
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "ERR syntax error");
    }

    #[test]
    fn non_numeric_expiry() {
        let err = Command::try_from(set_frame(&["foo", "bar", "EX", "soon"]))
            .err()
            .unwrap();

        assert_eq!(
            err.to_string(),
            "ERR value is not an integer or out of range"
        );
    }

    #[test]
    fn negative_expiry() {
        let err = Command::try_from(set_frame(&["foo", "bar", "EX", "-1"]))
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "ERR invalid expire time in 'set' command");
    }

    #[test]
    fn huge_expiry_is_rejected_at_parse_time() {
        // i64::MAX seconds parses but cannot be scaled to a millisecond
        // deadline; it must fail cleanly instead of overflowing later.
        let err = Command::try_from(set_frame(&["foo", "bar", "EX", "9223372036854775807"]))
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "ERR invalid expire time in 'set' command");
    }

    #[test]
    fn unknown_option() {
        let err = Command::try_from(set_frame(&["foo", "bar", "KEEPTTL"]))
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "ERR syntax error");
    }

    #[test]
    fn missing_value() {
        let err = Command::try_from(set_frame(&["foo"])).err().unwrap();

        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'set' command"
        );
    }
}
