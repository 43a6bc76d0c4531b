use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{message::ServerEvent, registry::ConnectionId};

pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection {0} is not attached")]
    Detached(ConnectionId),
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Unicast send primitive the coordinator delivers through.
pub trait Transport {
    fn send(&self, to: ConnectionId, event: ServerEvent) -> Result<(), DeliveryError>;
}

/// Routes server events to the outbox of each attached connection.
#[derive(Debug, Default)]
pub struct Switchboard {
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, id: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(id, outbox);
    }

    pub fn detach(&mut self, id: ConnectionId) -> Option<Outbox> {
        self.outboxes.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }
}

impl Transport for Switchboard {
    fn send(&self, to: ConnectionId, event: ServerEvent) -> Result<(), DeliveryError> {
        let outbox = self.outboxes.get(&to).ok_or(DeliveryError::Detached(to))?;
        outbox.send(event).map_err(|_| DeliveryError::Closed(to))
    }
}
