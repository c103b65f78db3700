//! Submit one command over HTTP and print the acks it produced.

use anyhow::{Context, Result};
use clap::Parser;
use gcs_core::CommandType;
use gcs_sdk::{CommandRequest, GcsClient};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ground-control server URL
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    /// Command type, e.g. arm, takeoff, goto, upload_mission
    command: CommandType,

    /// Params as a JSON object, e.g. '{"alt": 10}'
    #[arg(long, default_value = "{}")]
    params: String,

    /// Reuse an id instead of generating one
    #[arg(long)]
    id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = GcsClient::new(args.url);

    let params: Value = serde_json::from_str(&args.params).context("params must be JSON")?;
    let mut request = CommandRequest::new(args.command, params);
    if let Some(id) = args.id {
        request.id = id;
    }

    println!("Sending {} ({})", request.command_type, request.id);
    for ack in client.submit_command(&request).await? {
        match ack.reason {
            Some(reason) => println!("  {} {:?}: {}", ack.id, ack.status, reason),
            None => println!("  {} {:?}", ack.id, ack.status),
        }
    }
    Ok(())
}
