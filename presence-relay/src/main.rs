use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use presence_relay::{
    cli::{Cli, Command},
    client,
    config::RelayConfig,
    coordinator::Coordinator,
    notify::{MailNotifier, Mailer, SmtpMailer, UnconfiguredMailer},
    relay,
    server::Server,
    transport::Switchboard,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn build_mailer(config: &RelayConfig) -> Result<Arc<dyn Mailer>> {
    let Some(mail) = &config.mail else {
        warn!("EMAIL_USER/EMAIL_PASSWORD not set; notification emails are disabled");
        return Ok(Arc::new(UnconfiguredMailer));
    };

    let mailer = Arc::new(SmtpMailer::new(&mail.relay, &mail.credentials)?);
    let probe = Arc::clone(&mailer);
    tokio::spawn(async move { probe.verify().await });
    Ok(mailer)
}

async fn serve(config: RelayConfig) -> Result<()> {
    let notifier = MailNotifier::new(build_mailer(&config)?);
    let coordinator = Coordinator::new(Switchboard::new(), notifier, config.policy.clone());
    let (relay, _relay_task) = relay::spawn(coordinator);

    let listener = TcpListener::bind(config.listen).await?;
    let server = Server::new(listener, relay, config.allowed_origins);
    let addr = server.local_addr()?;
    info!("relay listening on {}", addr);
    server.run_until_ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up EMAIL_USER and friends from a local .env before clap reads the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            if let Err(err) = serve(RelayConfig::try_from(args)?).await {
                warn!("relay exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
