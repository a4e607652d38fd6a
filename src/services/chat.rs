//! Real-time fan-out of conversation events
//!
//! One `tokio::sync::broadcast` channel per conversation with at least one
//! listener. Opening an event stream joins the conversation's group and
//! dropping the receiver leaves it. Groups left without receivers are pruned
//! the next time the hub is touched.
//!
//! Events reach subscribers in the order they were published. A subscriber
//! that falls more than `capacity` events behind gets `Lagged` and resumes
//! from the oldest retained event.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{broadcast, RwLock};

use crate::models::conversation::ChatEvent;

#[derive(Clone)]
pub struct ChatHub {
    groups: Arc<RwLock<HashMap<i32, broadcast::Sender<ChatEvent>>>>,
    capacity: usize,
}

impl ChatHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Join a conversation group
    pub async fn subscribe(&self, conversation_id: i32) -> broadcast::Receiver<ChatEvent> {
        let mut groups = self.groups.write().await;
        groups.retain(|_, tx| tx.receiver_count() > 0);
        groups
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to everyone in the group. Returns the number of receivers
    /// reached; zero when nobody is listening.
    pub async fn publish(&self, conversation_id: i32, event: ChatEvent) -> usize {
        let delivered = {
            let groups = self.groups.read().await;
            match groups.get(&conversation_id) {
                Some(tx) => tx.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(n) => n,
            None => {
                self.prune().await;
                0
            }
        }
    }

    /// Drop groups nobody listens to anymore
    pub async fn prune(&self) {
        let mut groups = self.groups.write().await;
        groups.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// Number of live groups
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::UserType;
    use chrono::Utc;
    use tokio::sync::broadcast::error::RecvError;

    fn read_event(conversation_id: i32) -> ChatEvent {
        ChatEvent::Read {
            conversation_id,
            reader: UserType::Staff,
            read_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let hub = ChatHub::new(16);
        let mut a = hub.subscribe(1).await;
        let mut b = hub.subscribe(1).await;

        let first = read_event(1);
        let second = read_event(1);
        assert_eq!(hub.publish(1, first.clone()).await, 2);
        assert_eq!(hub.publish(1, second.clone()).await, 2);

        assert_eq!(a.recv().await.unwrap(), first);
        assert_eq!(a.recv().await.unwrap(), second);
        assert_eq!(b.recv().await.unwrap(), first);
        assert_eq!(b.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let hub = ChatHub::new(16);
        let mut other = hub.subscribe(2).await;
        let _mine = hub.subscribe(1).await;

        hub.publish(1, read_event(1)).await;
        assert!(matches!(other.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn publish_without_listeners_is_a_no_op() {
        let hub = ChatHub::new(16);
        assert_eq!(hub.publish(9, read_event(9)).await, 0);
        assert_eq!(hub.group_count().await, 0);
    }

    #[tokio::test]
    async fn empty_groups_are_pruned() {
        let hub = ChatHub::new(16);
        let rx = hub.subscribe(1).await;
        assert_eq!(hub.group_count().await, 1);

        drop(rx);
        assert_eq!(hub.publish(1, read_event(1)).await, 0);
        assert_eq!(hub.group_count().await, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let hub = ChatHub::new(2);
        let mut slow = hub.subscribe(1).await;
        for _ in 0..5 {
            hub.publish(1, read_event(1)).await;
        }
        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert!(slow.recv().await.is_ok());
    }
}
