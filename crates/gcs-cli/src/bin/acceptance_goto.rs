//! Acceptance run: goto while in HOLD triggers the automatic mode switch.

use anyhow::Result;
use clap::Parser;
use gcs_cli::{run_goto_mode_switch, ScenarioOptions};
use gcs_sdk::{GcsClient, Session};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ground-control server URL
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    #[arg(long, env = "GCS_WS_TOKEN")]
    token: Option<String>,

    /// Ground speed override in m/s
    #[arg(long, default_value_t = 20.0)]
    speed: f64,

    #[arg(long, default_value_t = 1.0)]
    timeout_scale: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut client = GcsClient::new(args.url);
    client.set_token(args.token);

    let options = ScenarioOptions {
        speed_mps: args.speed,
        timeout_scale: args.timeout_scale,
        ..ScenarioOptions::default()
    };

    let mut session = Session::connect(&client).await?;
    run_goto_mode_switch(&mut session, &options).await?;
    session.close().await?;

    println!("ACCEPTANCE_GOTO_OK");
    Ok(())
}
