//! 通知分发
//!
//! 每个订阅者一条无界通道，发送不会阻塞，也不会回调到 Transport。

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::TransportEvent;

#[derive(Default)]
pub(crate) struct EventHub {
    subscribers: Mutex<Vec<Sender<TransportEvent>>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> Receiver<TransportEvent> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    /// 按顺序发布，顺便清理已断开的订阅者
    pub(crate) fn publish(&self, events: Vec<TransportEvent>) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.lock();
        for event in events {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<TransportEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaybackState;

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        let hub = EventHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.publish(vec![
            TransportEvent::VolumeChanged(0.5),
            TransportEvent::PlaybackStateChanged(PlaybackState::Playing),
        ]);

        for rx in [&a, &b] {
            let got: Vec<_> = rx.try_iter().collect();
            assert_eq!(
                got,
                vec![
                    TransportEvent::VolumeChanged(0.5),
                    TransportEvent::PlaybackStateChanged(PlaybackState::Playing),
                ]
            );
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let hub = EventHub::default();
        let kept = hub.subscribe();
        drop(hub.subscribe());

        hub.publish(vec![TransportEvent::PositionChanged(1.0)]);

        assert_eq!(hub.lock().len(), 1);
        assert_eq!(kept.try_recv().unwrap(), TransportEvent::PositionChanged(1.0));
    }
}
