//! WebSocket chat relay that tracks who is connected.
//!
//! Every connected participant sees every chat message. When someone writes
//! while nobody else is connected, the relay tells them they are alone and
//! forwards the message by email instead. Each module focuses on a concrete
//! responsibility:
//!
//! - [`coordinator`] holds the presence state machine and decides between
//!   broadcasting and notifying.
//! - [`relay`] runs the coordinator on a single task and feeds it events.
//! - [`registry`] tracks connection membership.
//! - [`transport`] routes outbound events to each connection's outbox.
//! - [`notify`] delivers out-of-band notifications over SMTP.
//! - [`server`] accepts WebSocket connections over axum.
//! - [`client`] is a terminal client for the relay.
//! - [`message`] defines the JSON frames exchanged with clients.
//! - [`cli`] and [`config`] parse and validate the command line.

pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod message;
pub mod notify;
pub mod registry;
pub mod relay;
pub mod server;
pub mod transport;
