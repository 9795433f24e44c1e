//! CLI argument parsing

use clap::Parser;

/// Attach the local terminal to a remote exec stream
#[derive(Parser, Debug)]
#[command(name = "exec-streamer")]
#[command(about = "Attach the local terminal to a remote exec stream")]
#[command(version)]
pub struct Cli {
    /// Attach stream address (tcp://host:port or unix://path)
    ///
    /// The endpoint must already speak raw stdio bytes, e.g. a hijacked
    /// exec-start connection forwarded to a local socket.
    /// Example: tcp://127.0.0.1:2375 or unix:///tmp/exec.sock
    #[arg(long, env = "STREAMER_ADDR")]
    pub addr: String,

    /// Exec session id the stream belongs to
    #[arg(short = 's', long)]
    pub session: String,

    /// Detach key sequence, overriding the config file ("" disables)
    #[arg(long)]
    pub detach_keys: Option<String>,
}
