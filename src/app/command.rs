// Author: Dustin Pilgrim
// License: MIT

use std::io::{self, Write};

use crate::cli::{Args, Command};
use crate::config::{self, Settings};
use crate::simkl::auth;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

pub async fn run(args: Args) -> Result<(), AnyError> {
    let cmd = args.command.as_ref().expect("command mode");

    match cmd {
        Command::Init => run_init(args.config.as_deref()).await,
        Command::Status { json } => run_status(*json).await,
        Command::Stop => run_stop().await,
        Command::Start | Command::Tray => unreachable!("handled before dispatch"),
    }
}

/// Device-code OAuth flow (SPEC_FULL.md §6.4): never touches the IPC
/// socket, only ever writes `settings.json`.
async fn run_init(config_path: Option<&std::path::Path>) -> Result<(), AnyError> {
    print!("Simkl Client ID: ");
    io::stdout().flush()?;
    let mut client_id = String::new();
    io::stdin().read_line(&mut client_id)?;
    let client_id = client_id.trim().to_string();

    if client_id.is_empty() {
        eprintln!("simkl-scrobbler: a client id is required");
        return Ok(());
    }

    println!("Requesting a device code from Simkl...");
    let device = auth::request_device_code(&client_id).await?;

    println!("Visit {} and enter code: {}", device.verification_url, device.user_code);
    println!("Waiting for authorization...");

    let access_token = auth::poll_for_token(&client_id, &device).await?;

    let loaded = config::load_from_path(config_path)?;
    let mut settings: Settings = loaded.settings;
    settings.simkl_client_id = Some(client_id);
    settings.simkl_access_token = Some(access_token);
    settings.save(&loaded.path)?;

    println!("Saved credentials to {}", loaded.path.display());
    Ok(())
}

async fn run_status(json: bool) -> Result<(), AnyError> {
    let cmd = if json { "status --json" } else { "status" };

    match crate::ipc::client::send_raw(cmd).await {
        Ok(resp) => {
            println!("{}", resp.trim_end());
            Ok(())
        }
        Err(e) => {
            if json {
                println!(r#"{{"error":"not_running","detail":"{e}"}}"#);
            } else {
                eprintln!("simkl-scrobbler: {e}");
            }
            Ok(())
        }
    }
}

async fn run_stop() -> Result<(), AnyError> {
    match crate::ipc::client::send_raw("stop").await {
        Ok(resp) => {
            let out = resp.trim_end();
            println!("{}", if out.is_empty() { "stopping" } else { out });
            Ok(())
        }
        Err(e) => {
            eprintln!("simkl-scrobbler: {e}");
            Ok(())
        }
    }
}
