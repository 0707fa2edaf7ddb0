// Author: Dustin Pilgrim
// License: MIT

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "simkl-scrobbler",
    version = env!("CARGO_PKG_VERSION"),
    about = "Simkl media scrobbling agent"
)]
pub struct Args {
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Authenticate with Simkl via the device-code flow and write settings.json")]
    Init,

    #[command(about = "Run the scrobbler in the foreground")]
    Start,

    #[command(about = "Run the scrobbler in the foreground with a tray icon")]
    Tray,

    #[command(about = "Report what the running scrobbler is currently tracking")]
    Status {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Ask the running scrobbler to shut down")]
    Stop,
}
