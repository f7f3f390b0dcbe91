use super::{encode_message, Delta, Message, ReplicationChannel, Snapshot};
use crate::ObserverId;

use atlas_core::SmallKeyHashMap;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Encoded messages as they travel from host to observer.
pub type Packet = Box<[u8]>;

/// A [`ReplicationChannel`] for observers living in the same process. Every message goes through the real codec.
///
/// An observer whose receiver was dropped is disconnected on the next send.
#[derive(Debug, Default)]
pub struct LocalTransport {
    senders: SmallKeyHashMap<ObserverId, Sender<Packet>>,
}

impl LocalTransport {
    /// Registers `observer`, replacing any previous connection, and returns its end of the channel.
    pub fn connect(&mut self, observer: ObserverId) -> Receiver<Packet> {
        let (tx, rx) = unbounded();
        self.senders.insert(observer, tx);
        rx
    }

    pub fn disconnect(&mut self, observer: ObserverId) -> bool {
        self.senders.remove(&observer).is_some()
    }

    pub fn is_connected(&self, observer: ObserverId) -> bool {
        self.senders.contains_key(&observer)
    }

    /// Returns `false` if the message did not reach the observer's channel.
    fn send(&mut self, observer: ObserverId, message: &Message) -> bool {
        let sender = match self.senders.get(&observer) {
            Some(sender) => sender,
            None => {
                log::debug!("dropping message for unknown observer {}", observer);
                return false;
            }
        };
        let packet = match encode_message(message) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("failed to encode message for observer {}: {}", observer, e);
                return false;
            }
        };
        if sender.send(packet).is_err() {
            log::warn!("observer {} hung up, disconnecting", observer);
            self.senders.remove(&observer);
            return false;
        }
        true
    }
}

impl ReplicationChannel for LocalTransport {
    fn send_full_snapshot(&mut self, observer: ObserverId, snapshot: &Snapshot) -> bool {
        self.send(observer, &Message::Snapshot(snapshot.clone()))
    }

    fn send_delta(&mut self, observer: ObserverId, delta: &Delta) {
        self.send(observer, &Message::Delta(delta.clone()));
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_message, AnnotationSnapshot, AtlasId};

    #[test]
    fn delivers_encoded_messages_and_drops_hung_up_observers() {
        let mut transport = LocalTransport::default();
        let rx = transport.connect(ObserverId(1));

        let snapshot = Snapshot::Annotations(AnnotationSnapshot {
            atlas: AtlasId(2),
            annotations: Vec::new(),
        });
        assert!(transport.send_full_snapshot(ObserverId(1), &snapshot));
        // Unknown observers are ignored.
        assert!(!transport.send_full_snapshot(ObserverId(2), &snapshot));

        let packet = rx.try_recv().unwrap();
        assert_eq!(
            decode_message(&packet).unwrap(),
            Message::Snapshot(snapshot.clone())
        );
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!transport.send_full_snapshot(ObserverId(1), &snapshot));
        assert!(!transport.is_connected(ObserverId(1)));
    }
}
