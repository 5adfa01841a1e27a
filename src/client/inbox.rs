//! Holding queues for replies that arrived while the client was waiting for
//! something else. Publications and acknowledgements are kept apart so a
//! subscriber draining deliveries never consumes a pending ack.

use std::collections::VecDeque;

use crate::protocol::{Payload, PayloadKind};

#[derive(Debug, Default)]
pub struct Inbox {
    acks: VecDeque<Payload>,
    publications: VecDeque<Payload>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&mut self, payload: Payload) {
        if payload.kind() == PayloadKind::Publish {
            self.publications.push_back(payload);
        } else {
            self.acks.push_back(payload);
        }
    }

    /// Removes and returns the oldest parked payload of one of the `expected` kinds.
    pub fn take(&mut self, expected: &[PayloadKind]) -> Option<Payload> {
        for queue in [&mut self.acks, &mut self.publications] {
            if let Some(pos) = queue.iter().position(|p| expected.contains(&p.kind())) {
                return queue.remove(pos);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.acks.clear();
        self.publications.clear();
    }

    pub fn len(&self) -> usize {
        self.acks.len() + self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acks.is_empty() && self.publications.is_empty()
    }
}
