//! Single task that owns the coordinator.
//!
//! Sessions never touch presence state directly: they submit [`RelayEvent`]s
//! through a [`RelayHandle`] and the relay task applies them one at a time.
//! Every handler finishes before the next event is read, so the coordinator
//! needs no locking.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    coordinator::Coordinator,
    notify::Notifier,
    registry::ConnectionId,
    transport::{Outbox, Switchboard},
};

#[derive(Debug)]
pub enum RelayEvent {
    Connected { id: ConnectionId, outbox: Outbox },
    Message { id: ConnectionId, text: String },
    Disconnected { id: ConnectionId },
    Participants { reply: oneshot::Sender<usize> },
}

#[derive(Clone)]
pub struct RelayHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
    next_id: Arc<AtomicU64>,
}

impl RelayHandle {
    fn submit(&self, event: RelayEvent) {
        if self.events.send(event).is_err() {
            warn!("relay task has stopped; event dropped");
        }
    }

    /// Allocates an id for a new connection and registers its outbox.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.submit(RelayEvent::Connected { id, outbox });
        id
    }

    pub fn message(&self, id: ConnectionId, text: String) {
        self.submit(RelayEvent::Message { id, text });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.submit(RelayEvent::Disconnected { id });
    }

    /// Current participant count, or `None` if the relay has stopped.
    pub async fn participants(&self) -> Option<usize> {
        let (reply, response) = oneshot::channel();
        self.events.send(RelayEvent::Participants { reply }).ok()?;
        response.await.ok()
    }
}

/// Moves the coordinator into its own task. The task exits once every
/// [`RelayHandle`] has been dropped.
pub fn spawn<N>(coordinator: Coordinator<Switchboard, N>) -> (RelayHandle, JoinHandle<()>)
where
    N: Notifier + Send + 'static,
{
    let (events, inbox) = mpsc::unbounded_channel();
    let handle = RelayHandle {
        events,
        next_id: Arc::new(AtomicU64::new(1)),
    };
    let task = tokio::spawn(run(coordinator, inbox));
    (handle, task)
}

async fn run<N: Notifier>(
    mut coordinator: Coordinator<Switchboard, N>,
    mut inbox: mpsc::UnboundedReceiver<RelayEvent>,
) {
    while let Some(event) = inbox.recv().await {
        apply(&mut coordinator, event);
    }
    debug!(
        participants = coordinator.participants(),
        "relay inbox closed"
    );
}

fn apply<N: Notifier>(coordinator: &mut Coordinator<Switchboard, N>, event: RelayEvent) {
    match event {
        RelayEvent::Connected { id, outbox } => {
            coordinator.transport_mut().attach(id, outbox);
            coordinator.on_connect(id);
        }
        RelayEvent::Message { id, text } => {
            coordinator.on_message(id, text);
        }
        RelayEvent::Disconnected { id } => {
            coordinator.transport_mut().detach(id);
            coordinator.on_disconnect(id);
        }
        RelayEvent::Participants { reply } => {
            let _ = reply.send(coordinator.participants());
        }
    }
}
