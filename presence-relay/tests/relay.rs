use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use presence_relay::{
    coordinator::Coordinator,
    message::{ClientEvent, ServerEvent, StatusNotice, decode, encode},
    notify::{MailNotifier, Mailer, Notification, NotificationPolicy, NotifyError},
    relay::{self, RelayHandle},
    server::{SOCKET_PATH, Server},
    transport::Switchboard,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest, http::HeaderValue},
};

const READ_TIMEOUT: Duration = Duration::from_secs(2);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct ChannelMailer {
    sent: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Mailer for ChannelMailer {
    async fn send(&self, notification: &Notification) -> Result<String, NotifyError> {
        let _ = self.sent.send(notification.clone());
        Ok("250 queued".to_string())
    }
}

struct TestRelay {
    addr: SocketAddr,
    handle: RelayHandle,
    mail: mpsc::UnboundedReceiver<Notification>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl TestRelay {
    async fn start() -> Result<Self> {
        let (sent, mail) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(
            Switchboard::new(),
            MailNotifier::new(Arc::new(ChannelMailer { sent })),
            NotificationPolicy::new("owner@example.com"),
        );
        let (handle, _relay_task) = relay::spawn(coordinator);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let server = Server::new(
            listener,
            handle.clone(),
            vec![axum::http::HeaderValue::from_static("http://localhost:3000")],
        );
        let addr = server.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            let _ = server.run_until(shutdown).await;
        });

        Ok(Self {
            addr,
            handle,
            mail,
            shutdown,
            server,
        })
    }

    fn url(&self) -> String {
        format!("ws://{}{}", self.addr, SOCKET_PATH)
    }

    async fn connect(&self) -> Result<Socket> {
        let (socket, _) = connect_async(self.url()).await?;
        Ok(socket)
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.server.await;
    }
}

async fn send_chat(socket: &mut Socket, text: &str) -> Result<()> {
    let frame = encode(&ClientEvent::ChatMessage(text.to_string()))?;
    socket.send(Message::text(frame)).await?;
    Ok(())
}

async fn next_event(socket: &mut Socket, description: &str) -> Result<ServerEvent> {
    loop {
        let frame = timeout(READ_TIMEOUT, socket.next())
            .await
            .with_context(|| format!("{description}: timed out"))?
            .ok_or_else(|| anyhow!("{description}: stream closed"))??;
        if let Message::Text(text) = frame {
            return Ok(decode(text.as_str())?);
        }
    }
}

async fn expect_quiet(socket: &mut Socket) {
    let pending = timeout(Duration::from_millis(150), socket.next()).await;
    assert!(pending.is_err(), "unexpected frame: {pending:?}");
}

fn status(notice: StatusNotice) -> ServerEvent {
    ServerEvent::status(notice)
}

#[tokio::test]
async fn two_participants_chat_then_one_is_left_alone() -> Result<()> {
    let mut relay = TestRelay::start().await?;

    let mut alice = relay.connect().await?;
    assert_eq!(
        next_event(&mut alice, "alice greeting").await?,
        status(StatusNotice::SoleParticipant)
    );

    let mut bob = relay.connect().await?;
    assert_eq!(
        next_event(&mut bob, "bob greeting").await?,
        status(StatusNotice::OthersPresent)
    );
    assert_eq!(
        next_event(&mut alice, "alice sees bob").await?,
        status(StatusNotice::Joined)
    );

    send_chat(&mut alice, "hi").await?;
    assert_eq!(next_event(&mut alice, "alice echo").await?, ServerEvent::chat("hi"));
    assert_eq!(next_event(&mut bob, "bob hears alice").await?, ServerEvent::chat("hi"));
    assert!(relay.mail.try_recv().is_err());

    bob.close(None).await?;
    assert_eq!(
        next_event(&mut alice, "alice sees bob leave").await?,
        status(StatusNotice::Left)
    );
    assert_eq!(relay.handle.participants().await, Some(1));

    send_chat(&mut alice, "hello").await?;
    assert_eq!(
        next_event(&mut alice, "alice waiting notice").await?,
        status(StatusNotice::Waiting)
    );
    let email = timeout(READ_TIMEOUT, relay.mail.recv())
        .await?
        .context("notification should be dispatched")?;
    assert_eq!(email.recipient, "owner@example.com");
    assert!(email.body.contains("hello"));
    expect_quiet(&mut alice).await;

    alice.close(None).await?;
    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn malformed_frames_are_ignored() -> Result<()> {
    let relay = TestRelay::start().await?;
    let mut alice = relay.connect().await?;
    let mut bob = relay.connect().await?;
    next_event(&mut alice, "alice greeting").await?;
    next_event(&mut alice, "alice sees bob").await?;
    next_event(&mut bob, "bob greeting").await?;

    alice.send(Message::text("not json")).await?;
    alice
        .send(Message::text(r#"{"event":"typing","data":"..."}"#))
        .await?;
    send_chat(&mut alice, "still works").await?;

    assert_eq!(
        next_event(&mut bob, "bob hears alice").await?,
        ServerEvent::chat("still works")
    );
    assert_eq!(relay.handle.participants().await, Some(2));

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn handshake_checks_origin() -> Result<()> {
    let relay = TestRelay::start().await?;

    let mut allowed = relay.url().into_client_request()?;
    allowed
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://localhost:3000"));
    let (mut socket, _) = connect_async(allowed).await?;
    assert_eq!(
        next_event(&mut socket, "allowed origin greeting").await?,
        status(StatusNotice::SoleParticipant)
    );

    let mut denied = relay.url().into_client_request()?;
    denied
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://evil.test"));
    assert!(connect_async(denied).await.is_err());
    assert_eq!(relay.handle.participants().await, Some(1));

    relay.stop().await;
    Ok(())
}
