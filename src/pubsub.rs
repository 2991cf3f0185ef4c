use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::Frame;

/// Push side of a subscriber connection. Delivered frames are written to the
/// client by its connection task, never by the broker itself.
pub type Subscriber = mpsc::UnboundedSender<Frame>;

/// Channel registry for publish/subscribe. Channels are global across all
/// logical databases and ephemeral: a channel exists only while it has at
/// least one subscriber, and nothing here is ever persisted.
#[derive(Clone, Default)]
pub struct Broker {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    /// channel name -> subscribed session ids
    channels: HashMap<String, HashSet<Uuid>>,
    /// session id -> push sender for that connection
    subscribers: HashMap<Uuid, Subscriber>,
    /// session id -> channels it holds
    memberships: HashMap<Uuid, HashSet<String>>,
}

impl Broker {
    pub fn new() -> Broker {
        Broker::default()
    }

    /// Add a session to a channel's subscriber set. Idempotent: subscribing
    /// twice has no additional effect. Returns the session's subscription
    /// count after the call.
    pub fn subscribe(&self, id: Uuid, channel: &str, subscriber: Subscriber) -> usize {
        let mut registry = self.inner.lock().unwrap();

        registry.subscribers.entry(id).or_insert(subscriber);
        registry
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(id);
        registry
            .memberships
            .entry(id)
            .or_default()
            .insert(channel.to_string());

        registry.memberships.get(&id).map_or(0, |c| c.len())
    }

    /// Remove a session from a channel. The last unsubscription destroys the
    /// channel. Returns the session's remaining subscription count.
    pub fn unsubscribe(&self, id: Uuid, channel: &str) -> usize {
        let mut registry = self.inner.lock().unwrap();

        if let Some(subscribers) = registry.channels.get_mut(channel) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                registry.channels.remove(channel);
            }
        }

        let remaining = match registry.memberships.get_mut(&id) {
            Some(channels) => {
                channels.remove(channel);
                channels.len()
            }
            None => 0,
        };

        if remaining == 0 {
            registry.subscribers.remove(&id);
            registry.memberships.remove(&id);
        }

        remaining
    }

    /// The channels a session currently holds, sorted for deterministic
    /// replies.
    pub fn channels_of(&self, id: Uuid) -> Vec<String> {
        let registry = self.inner.lock().unwrap();

        let mut channels: Vec<String> = registry
            .memberships
            .get(&id)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Drop every subscription a session holds. Used on connection close;
    /// produces no replies.
    pub fn unsubscribe_all(&self, id: Uuid) {
        let mut registry = self.inner.lock().unwrap();

        if let Some(channels) = registry.memberships.remove(&id) {
            for channel in channels {
                if let Some(subscribers) = registry.channels.get_mut(&channel) {
                    subscribers.remove(&id);
                    if subscribers.is_empty() {
                        registry.channels.remove(&channel);
                    }
                }
            }
        }
        registry.subscribers.remove(&id);
    }

    /// Deliver `message` to every current subscriber of `channel`, returning
    /// the number of receivers. The subscriber set is snapshotted before
    /// delivery, so concurrent unsubscriptions neither crash nor
    /// double-deliver, and a dropped receiver never blocks the rest.
    pub fn publish(&self, channel: &str, message: Bytes) -> usize {
        let receivers: Vec<Subscriber> = {
            let registry = self.inner.lock().unwrap();
            registry
                .channels
                .get(channel)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| registry.subscribers.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };

        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"message")),
            Frame::Bulk(Bytes::from(channel.to_string())),
            Frame::Bulk(message),
        ]);

        let mut delivered = 0;
        for receiver in &receivers {
            if receiver.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber() -> (Subscriber, mpsc::UnboundedReceiver<Frame>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn subscribe_is_idempotent() {
        let broker = Broker::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = subscriber();

        assert_eq!(broker.subscribe(id, "news", tx.clone()), 1);
        assert_eq!(broker.subscribe(id, "news", tx.clone()), 1);
        assert_eq!(broker.subscribe(id, "sport", tx), 2);
    }

    #[test]
    fn publish_reaches_current_subscribers() {
        let broker = Broker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = subscriber();
        let (tx_b, mut rx_b) = subscriber();

        broker.subscribe(a, "news", tx_a);
        broker.subscribe(b, "news", tx_b);

        let receivers = broker.publish("news", Bytes::from("hello"));
        assert_eq!(receivers, 2);

        let expected = Frame::Array(vec![
            Frame::Bulk(Bytes::from("message")),
            Frame::Bulk(Bytes::from("news")),
            Frame::Bulk(Bytes::from("hello")),
        ]);
        assert_eq!(rx_a.try_recv().unwrap(), expected);
        assert_eq!(rx_b.try_recv().unwrap(), expected);
    }

    #[test]
    fn publish_to_unknown_channel_reaches_nobody() {
        let broker = Broker::new();

        assert_eq!(broker.publish("nowhere", Bytes::from("hi")), 0);
    }

    #[test]
    fn unsubscribe_removes_delivery() {
        let broker = Broker::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = subscriber();

        broker.subscribe(id, "news", tx);
        assert_eq!(broker.unsubscribe(id, "news"), 0);

        assert_eq!(broker.publish("news", Bytes::from("hello")), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_does_not_block_others() {
        let broker = Broker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, rx_a) = subscriber();
        let (tx_b, mut rx_b) = subscriber();

        broker.subscribe(a, "news", tx_a);
        broker.subscribe(b, "news", tx_b);
        drop(rx_a);

        let delivered = broker.publish("news", Bytes::from("hello"));

        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_all_cleans_up() {
        let broker = Broker::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = subscriber();

        broker.subscribe(id, "news", tx.clone());
        broker.subscribe(id, "sport", tx);
        assert_eq!(broker.channels_of(id), vec!["news", "sport"]);

        broker.unsubscribe_all(id);

        assert!(broker.channels_of(id).is_empty());
        assert_eq!(broker.publish("news", Bytes::from("hello")), 0);
    }
}
