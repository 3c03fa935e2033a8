use anyhow::Result;
use clap::Parser;
use seller_tracking::{
    TrackingSession,
    cli::Args,
    config::Config,
    events::create_event_channel,
    formatter::OutputFormat,
    monitoring::setup_metrics,
    tracing_setup::setup_tracing,
    transport::WebSocketConnector,
    ui::{UIController, UIOptions},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(&args.log_level, args.json_logs)?;
    info!("Starting seller tracking client v{}", env!("CARGO_PKG_VERSION"));

    // wss endpoints need a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = Arc::new(Config::from_args(&args)?);

    if config.metrics.enabled {
        setup_metrics(&config.metrics).await?;
    }

    let (event_sender, event_receiver) = create_event_channel();
    let connector = Arc::new(WebSocketConnector::new(config.websocket.timeout));
    let mut session = TrackingSession::new(config.clone(), connector, event_sender);

    let mut ui = UIController::new(
        event_receiver,
        session.subscribe_tracking(),
        OutputFormat::from(args.format.as_str()),
        UIOptions {
            colored: !args.no_color,
            quiet: args.quiet,
        },
    );
    let ui_task = tokio::spawn(async move { ui.run().await });

    session
        .start(
            args.seller.as_deref().unwrap_or_default(),
            args.shopkeeper.as_deref().unwrap_or_default(),
        )
        .await;

    info!("Tracking started. Type `r` to reconnect, `q` or Ctrl+C to quit...");
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "r" | "reconnect" => session.reconnect(),
                    "q" | "quit" => break,
                    "" => {}
                    other => warn!("Unknown command: {}", other),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    session.stop().await;
    drop(session);
    let _ = ui_task.await;

    info!("Client stopped successfully");
    Ok(())
}
