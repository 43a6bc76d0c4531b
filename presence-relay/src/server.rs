use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::{
    message::{ClientEvent, ServerEvent, decode, encode},
    registry::ConnectionId,
    relay::RelayHandle,
};

pub const SOCKET_PATH: &str = "/socket";

pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    pub fn new(listener: TcpListener, relay: RelayHandle, allowed_origins: Vec<HeaderValue>) -> Self {
        Self {
            listener,
            app: router(relay, allowed_origins),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server { listener, app } = self;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("relay shutting down");
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

#[derive(Clone)]
struct AppState {
    relay: RelayHandle,
    allowed_origins: Arc<[HeaderValue]>,
}

impl AppState {
    /// Requests without an `Origin` header come from non-browser clients and
    /// are always let through. An empty allow list admits every origin.
    fn admits(&self, headers: &HeaderMap) -> bool {
        match headers.get(header::ORIGIN) {
            Some(origin) => {
                self.allowed_origins.is_empty() || self.allowed_origins.contains(origin)
            }
            None => true,
        }
    }
}

pub fn router(relay: RelayHandle, allowed_origins: Vec<HeaderValue>) -> Router {
    let origins = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.clone())
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST]);

    let state = AppState {
        relay,
        allowed_origins: allowed_origins.into(),
    };

    Router::new()
        .route(SOCKET_PATH, get(upgrade))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.admits(&headers) {
        warn!(origin = ?headers.get(header::ORIGIN), "rejected connection from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| run_session(socket, state.relay))
}

async fn run_session(socket: WebSocket, relay: RelayHandle) {
    let (sink, mut stream) = socket.split();
    let (outbox, inbox) = mpsc::unbounded_channel();
    let id = relay.connect(outbox);
    let writer = tokio::spawn(forward_outbox(sink, inbox, id));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&relay, id, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(connection = %id, %error, "websocket read failed");
                break;
            }
        }
    }

    // Detaching the outbox ends the writer once it has flushed.
    relay.disconnect(id);
    if let Err(error) = writer.await {
        warn!(connection = %id, %error, "session writer panicked");
    }
}

fn handle_frame(relay: &RelayHandle, id: ConnectionId, frame: &str) {
    match decode::<ClientEvent>(frame) {
        Ok(ClientEvent::ChatMessage(text)) => relay.message(id, text),
        Err(error) => debug!(connection = %id, %error, "ignoring malformed frame"),
    }
}

async fn forward_outbox(
    mut sink: SplitSink<WebSocket, Message>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
    id: ConnectionId,
) {
    while let Some(event) = inbox.recv().await {
        let frame = match encode(&event) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(connection = %id, %error, "failed to encode event");
                continue;
            }
        };
        if let Err(error) = sink.send(Message::Text(frame)).await {
            debug!(connection = %id, %error, "failed to deliver message to client");
            break;
        }
    }
    let _ = sink.close().await;
}
