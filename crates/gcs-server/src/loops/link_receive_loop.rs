//! Link receive loop.
//!
//! Drains inbound link messages into the adapter's telemetry cache,
//! independently of the telemetry publish rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;

use gcs_core::{LinkAdapter, LinkError};

use crate::backoff::Backoff;

const RECEIVE_POLL_MS: u64 = 10;
const RECEIVE_BACKOFF_MAX_SECS: u64 = 5;

pub async fn run_link_receive_loop(link: Arc<LinkAdapter>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_millis(RECEIVE_POLL_MS));
    let mut backoff = Backoff::new(
        Duration::from_millis(RECEIVE_POLL_MS * 10),
        Duration::from_secs(RECEIVE_BACKOFF_MAX_SECS),
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Link receive loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if !backoff.ready() {
                    continue;
                }
                match link.poll_inbound() {
                    Ok(_) => backoff.reset(),
                    Err(LinkError::Closed) => {
                        tracing::info!("Link closed, receive loop exiting");
                        break;
                    }
                    Err(err) => {
                        let delay = backoff.fail();
                        tracing::warn!(
                            "Link receive failed: {} (attempt {}, backing off {:?})",
                            err,
                            backoff.failures(),
                            delay
                        );
                    }
                }
            }
        }
    }
}
