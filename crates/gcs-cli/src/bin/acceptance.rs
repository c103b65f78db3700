//! Acceptance run: full flight cycle against a running ground-control server.
//!
//! Exits non-zero on the first failed expectation.

use anyhow::Result;
use clap::Parser;
use gcs_cli::{run_flight_cycle, ScenarioOptions};
use gcs_sdk::{GcsClient, Session};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ground-control server URL
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    /// Stream token, if the server sets GCS_WS_TOKEN
    #[arg(long, env = "GCS_WS_TOKEN")]
    token: Option<String>,

    /// Goto and mission offset in degrees
    #[arg(long, default_value_t = 0.001)]
    offset_deg: f64,

    /// Ground speed override in m/s
    #[arg(long, default_value_t = 20.0)]
    speed: f64,

    /// Multiplier for every wait
    #[arg(long, default_value_t = 1.0)]
    timeout_scale: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut client = GcsClient::new(args.url);
    client.set_token(args.token);

    let health = client.health().await?;
    println!("Connected to {} ({} mode)", client.base_url(), health.mode);

    let options = ScenarioOptions {
        offset_deg: args.offset_deg,
        speed_mps: args.speed,
        timeout_scale: args.timeout_scale,
        ..ScenarioOptions::default()
    };

    let mut session = Session::connect(&client).await?;
    run_flight_cycle(&mut session, &options).await?;
    session.close().await?;

    println!("ACCEPTANCE OK");
    Ok(())
}
