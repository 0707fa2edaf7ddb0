// Author: Dustin Pilgrim
// License: MIT

use clap::Parser;
use simkl_scrobbler::{app, cli};

use cli::Command;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let args = cli::Args::parse();

    match args.command {
        Some(Command::Init) | Some(Command::Status { .. }) | Some(Command::Stop) => {
            app::command::run(args).await
        }
        Some(Command::Start) => app::daemon_mode::run(args, false).await,
        Some(Command::Tray) => app::daemon_mode::run(args, true).await,
        None => app::daemon_mode::run(args, false).await,
    }
}
