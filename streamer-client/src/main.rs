//! exec-streamer: attach the local terminal to a remote exec stream
//!
//! Connects to an already-established raw stdio stream and hands it to the
//! session streamer. Resize requests are logged only, since a bare socket
//! has no channel to carry them.

mod cli;
mod client;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use streamer_core::{load_config, Dimensions, LocalIo, SessionStreamer, StreamerConfig};
use streamer_utils::{init_logging_with_config, LogConfig, Result, StreamerError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config();

    if let Err(e) = init_logging_with_config(LogConfig::client(&config.logging.filter)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let exit_code = match run(cli, config).await {
        Ok(()) => 0,
        Err(StreamerError::DetachRequested) => {
            eprintln!("Detached from session");
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli, mut config: StreamerConfig) -> Result<()> {
    if let Some(keys) = cli.detach_keys {
        config.stream.detach_keys = keys;
    }
    let streamer = SessionStreamer::from_config(LocalIo::stdio(), &config)?;

    let stream = client::connect(&cli.addr).await?;

    // Raw mode delivers ctrl-c to the remote; this covers piped input
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    streamer.stream(&cancel, &cli.session, stream, log_resize).await
}

async fn log_resize(_cancel: CancellationToken, session_id: String, size: Dimensions) -> Result<()> {
    tracing::info!(
        session_id = %session_id,
        rows = size.rows,
        cols = size.cols,
        "Resize requested; transport has no resize channel"
    );
    Ok(())
}
