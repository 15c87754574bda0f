use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Outbound half of a connection. The socket task drains the receiver.
pub type ConnectionSink = mpsc::UnboundedSender<ServerMessage>;

/// Push channel to every connection or to a single one. Sends never block.
pub trait Broadcaster: Send {
    fn attach(&mut self, id: ConnectionId, sink: ConnectionSink);

    /// Drop the connection's sink. Returns whether it was attached.
    fn detach(&mut self, id: &str) -> bool;

    fn broadcast(&self, msg: ServerMessage);

    fn send_to(&self, id: &str, msg: ServerMessage);
}

/// Broadcaster backed by one unbounded channel per connection
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: HashMap<ConnectionId, ConnectionSink>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Broadcaster for ConnectionHub {
    fn attach(&mut self, id: ConnectionId, sink: ConnectionSink) {
        self.connections.insert(id, sink);
    }

    fn detach(&mut self, id: &str) -> bool {
        self.connections.remove(id).is_some()
    }

    fn broadcast(&self, msg: ServerMessage) {
        tracing::trace!("Broadcasting {}", msg.event_name());
        for sink in self.connections.values() {
            // A closed sink means the socket is going away; its Disconnect follows
            let _ = sink.send(msg.clone());
        }
    }

    fn send_to(&self, id: &str, msg: ServerMessage) {
        match self.connections.get(id) {
            Some(sink) => {
                let _ = sink.send(msg);
            }
            None => tracing::debug!("Dropping {} for unknown connection {}", msg.event_name(), id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let mut hub = ConnectionHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.attach("a".into(), tx1);
        hub.attach("b".into(), tx2);

        hub.broadcast(ServerMessage::RoundPaused);

        assert_eq!(rx1.try_recv().unwrap(), ServerMessage::RoundPaused);
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::RoundPaused);
    }

    #[test]
    fn test_send_to_targets_one_connection() {
        let mut hub = ConnectionHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.attach("a".into(), tx1);
        hub.attach("b".into(), tx2);

        hub.send_to(
            "b",
            ServerMessage::PlayerError {
                message: "nope".into(),
            },
        );

        assert!(rx1.try_recv().is_err());
        assert!(matches!(
            rx2.try_recv().unwrap(),
            ServerMessage::PlayerError { .. }
        ));
    }

    #[test]
    fn test_detach_closes_the_channel() {
        let mut hub = ConnectionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.attach("a".into(), tx);

        assert!(hub.detach("a"));
        assert!(!hub.detach("a"));
        assert_eq!(hub.connection_count(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_closed_receiver_does_not_break_broadcast() {
        let mut hub = ConnectionHub::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.attach("a".into(), tx1);
        hub.attach("b".into(), tx2);
        drop(rx1);

        hub.broadcast(ServerMessage::RoundPaused);
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::RoundPaused);
    }
}
