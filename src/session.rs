use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::Frame;
use crate::pubsub::Broker;
use crate::store::Store;

/// Per-connection state driving command execution.
///
/// A session is always in one of two states: Normal, or Subscribed once its
/// subscription count is above zero. While Subscribed, only the pub/sub
/// command subset is accepted; the session returns to Normal when the count
/// drops back to zero. The bound database index starts at 0 and changes only
/// via `SELECT`.
pub struct Session {
    pub id: Uuid,
    /// Index of the logical database this connection is bound to.
    pub db: usize,
    /// Number of channels currently subscribed; non-zero means Subscribed.
    pub subscriptions: usize,
    pub store: Store,
    pub broker: Broker,
    /// Out-of-band frames (pub/sub deliveries and extra subscription
    /// confirmations) pushed to the connection's write loop.
    pub push: mpsc::UnboundedSender<Frame>,
}

impl Session {
    pub fn new(store: Store, broker: Broker, push: mpsc::UnboundedSender<Frame>) -> Session {
        Session {
            id: Uuid::new_v4(),
            db: 0,
            subscriptions: 0,
            store,
            broker,
            push,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions > 0
    }
}
