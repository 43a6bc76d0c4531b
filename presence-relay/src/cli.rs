use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay, accepting WebSocket connections.
    Serve(ServeArgs),
    /// Connect to a relay and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to bind to. Use port 0 for an ephemeral port.
    #[arg(long, env = "RELAY_LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Origin allowed to open a chat connection. May be repeated.
    #[arg(
        long = "allowed-origin",
        env = "RELAY_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5500,http://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Address notification emails are sent from.
    #[arg(long, env = "EMAIL_USER")]
    pub mail_user: Option<String>,

    /// Password for the sending account.
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub mail_password: Option<String>,

    /// SMTP relay host.
    #[arg(long, env = "SMTP_RELAY", default_value = "smtp.gmail.com")]
    pub smtp_relay: String,

    /// Who receives a message sent while nobody else is connected.
    /// Defaults to the sending address.
    #[arg(long, env = "NOTIFY_RECIPIENT")]
    pub notify_recipient: Option<String>,

    #[arg(long, env = "NOTIFY_SUBJECT", default_value = "Message")]
    pub notify_subject: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// WebSocket URL of the relay.
    #[arg(long, default_value = "ws://127.0.0.1:8000/socket")]
    pub server: String,
}
