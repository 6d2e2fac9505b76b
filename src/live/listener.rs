// Push bus subscription.
//
// The bus is polled from the last id seen; a subscription starts at the
// newest message present when it is opened, so history is never replayed.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::notice::{Notice, Notifier};
use crate::store::{PushMessage, PushSource};

pub struct Subscription {
    source: Arc<dyn PushSource>,
    channel: String,
    last_id: i64,
}

impl Subscription {
    /// Blocking; call before entering the event loop or on the blocking pool
    pub fn open(source: Arc<dyn PushSource>, channel: &str) -> Result<Self> {
        let last_id = source
            .latest_message_id(channel)
            .with_context(|| format!("Failed to subscribe to channel '{}'", channel))?;
        log::debug!("Subscribed to '{}' after message {}", channel, last_id);
        Ok(Self { source, channel: channel.to_string(), last_id })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn last_id(&self) -> i64 {
        self.last_id
    }

    /// Messages published since the previous poll
    pub fn poll(&mut self) -> Result<Vec<PushMessage>> {
        let messages = self.source.poll_messages(&self.channel, self.last_id)?;
        if let Some(newest) = messages.iter().map(|m| m.id).max() {
            self.last_id = self.last_id.max(newest);
        }
        Ok(messages)
    }
}

/// Background task forwarding push messages to the event loop
pub struct LiveListener {
    subscription: Subscription,
    every: Duration,
}

impl LiveListener {
    pub fn new(subscription: Subscription, every: Duration) -> Self {
        Self { subscription, every }
    }

    /// Subscribe and start polling.
    ///
    /// When the subscription cannot be opened the board runs without live
    /// updates: the failure is logged, a Fetch notice goes out and `None`
    /// is returned.
    pub fn start(
        source: Arc<dyn PushSource>,
        channel: &str,
        every: Duration,
        tx: UnboundedSender<PushMessage>,
        notifier: &Notifier,
    ) -> Option<JoinHandle<()>> {
        match Subscription::open(source, channel) {
            Ok(subscription) => Some(LiveListener::new(subscription, every).spawn(tx)),
            Err(e) => {
                log::error!("Live updates disabled: {:#}", e);
                notifier.notify(Notice::fetch_failed("live updates"));
                None
            }
        }
    }

    /// Poll until the receiver goes away
    pub fn spawn(self, tx: UnboundedSender<PushMessage>) -> JoinHandle<()> {
        let LiveListener { mut subscription, every } = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }

                let polled = tokio::task::spawn_blocking(move || {
                    let result = subscription.poll();
                    (subscription, result)
                })
                .await;
                let result = match polled {
                    Ok((returned, result)) => {
                        subscription = returned;
                        result
                    }
                    Err(e) => {
                        log::error!("Push listener stopped: {}", e);
                        break;
                    }
                };

                match result {
                    Ok(messages) => {
                        for message in messages {
                            log::debug!("Push message {} on '{}'", message.id, message.channel);
                            if tx.send(message).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => log::warn!("Polling channel '{}' failed: {:#}", subscription.channel(), e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::BusRepo;
    use crate::store::SqliteStore;
    use serde_json::json;

    const CHANNEL: &str = "kitchen_new_order";

    fn publish(store: &SqliteStore, channel: &str, name: &str) -> i64 {
        store
            .with_conn(|conn| BusRepo::send(conn, channel, &json!({"order_id": 1, "name": name})))
            .unwrap()
    }

    #[test]
    fn test_subscription_skips_history() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        publish(&store, CHANNEL, "Old");

        let mut sub = Subscription::open(store.clone(), CHANNEL).unwrap();
        assert!(sub.poll().unwrap().is_empty());

        publish(&store, CHANNEL, "Order 0002");
        publish(&store, "other_channel", "Elsewhere");
        publish(&store, CHANNEL, "Order 0003");

        let names: Vec<String> = sub
            .poll()
            .unwrap()
            .iter()
            .filter_map(|m| m.order_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Order 0002", "Order 0003"]);
        assert!(sub.poll().unwrap().is_empty());
    }

    struct DeadBus;

    impl PushSource for DeadBus {
        fn latest_message_id(&self, _channel: &str) -> Result<i64> {
            anyhow::bail!("bus table missing")
        }

        fn poll_messages(&self, _channel: &str, _after_id: i64) -> Result<Vec<PushMessage>> {
            anyhow::bail!("bus table missing")
        }
    }

    #[tokio::test]
    async fn test_failed_subscription_is_not_fatal() {
        let (notifier, mut notices) = Notifier::channel();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = LiveListener::start(Arc::new(DeadBus), CHANNEL, Duration::from_millis(10), tx, &notifier);
        assert!(handle.is_none());
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, crate::notice::NoticeKind::Fetch);
        assert_eq!(notice.message, "Failed to load live updates");
    }

    #[tokio::test]
    async fn test_listener_forwards_messages() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let sub = Subscription::open(store.clone(), CHANNEL).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = LiveListener::new(sub, Duration::from_millis(10)).spawn(tx);

        publish(&store, CHANNEL, "Order 0042");
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.order_name(), Some("Order 0042"));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
