//! Presence tracking and the broadcast-or-notify decision.
//!
//! A [`Coordinator`] owns the membership of one chat instance. Each handler
//! runs to completion against `&mut self`, so the caller decides how events
//! are serialized (see [`crate::relay`]). Delivery goes through a
//! [`Transport`]; a message sent while its author is alone is handed to a
//! [`Notifier`] instead of being broadcast.
//!
//! Phases move `Empty -> Solo -> Populated` on connect and back on
//! disconnect. Only `Solo` changes how a chat message is handled.

use tracing::{debug, info, warn};

use crate::{
    message::{ServerEvent, StatusNotice},
    notify::{NotificationPolicy, Notifier},
    registry::{ConnectionId, ConnectionRegistry, Phase},
    transport::Transport,
};

pub struct Coordinator<T, N> {
    registry: ConnectionRegistry,
    transport: T,
    notifier: N,
    policy: NotificationPolicy,
}

impl<T, N> Coordinator<T, N>
where
    T: Transport,
    N: Notifier,
{
    pub fn new(transport: T, notifier: N, policy: NotificationPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            transport,
            notifier,
            policy,
        }
    }

    pub fn participants(&self) -> usize {
        self.registry.count()
    }

    pub fn phase(&self) -> Phase {
        self.registry.phase()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn on_connect(&mut self, id: ConnectionId) -> Phase {
        if !self.registry.join(id) {
            warn!(connection = %id, "connection is already registered");
            return self.phase();
        }

        info!(connection = %id, participants = self.participants(), "participant connected");

        if self.phase() == Phase::Solo {
            self.unicast(id, ServerEvent::status(StatusNotice::SoleParticipant));
        } else {
            self.broadcast(ServerEvent::status(StatusNotice::Joined), Some(id));
            self.unicast(id, ServerEvent::status(StatusNotice::OthersPresent));
        }

        self.phase()
    }

    pub fn on_message(&mut self, id: ConnectionId, text: String) -> Phase {
        if !self.registry.contains(id) {
            warn!(connection = %id, "dropping message from unregistered connection");
            return self.phase();
        }

        debug!(connection = %id, %text, "chat message received");

        if self.phase() == Phase::Solo {
            self.unicast(id, ServerEvent::status(StatusNotice::Waiting));
            self.notifier.dispatch(self.policy.compose(&text));
        } else {
            self.broadcast(ServerEvent::ChatMessage(text), None);
        }

        self.phase()
    }

    pub fn on_disconnect(&mut self, id: ConnectionId) -> Phase {
        if !self.registry.leave(id) {
            warn!(connection = %id, "disconnect for unregistered connection");
            return self.phase();
        }

        info!(connection = %id, participants = self.participants(), "participant disconnected");

        let notice = match self.phase() {
            Phase::Empty => StatusNotice::Empty,
            Phase::Solo | Phase::Populated => StatusNotice::Left,
        };
        self.broadcast(ServerEvent::status(notice), None);

        self.phase()
    }

    fn unicast(&self, to: ConnectionId, event: ServerEvent) {
        if let Err(error) = self.transport.send(to, event) {
            warn!(%error, "failed to deliver event");
        }
    }

    fn broadcast(&self, event: ServerEvent, except: Option<ConnectionId>) {
        for id in self.registry.snapshot() {
            if Some(id) != except {
                self.unicast(id, event.clone());
            }
        }
    }
}
