//! Background self-ping that keeps free-tier hosts from idling the service
//! out. Failures are logged and never fatal.

use std::time::Duration;
use tracing::{info, warn};

const STARTUP_DELAY: Duration = Duration::from_secs(30);
const PING_INTERVAL: Duration = Duration::from_secs(5 * 60);
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn the keepalive loop pinging `{base_url}/api/health`.
pub fn spawn(base_url: String) {
    tokio::spawn(run(base_url));
}

async fn run(base_url: String) {
    let client = match reqwest::Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            warn!(%error, "keepalive disabled: failed to build http client");
            return;
        }
    };

    let health_url = format!("{}/api/health", base_url.trim_end_matches('/'));
    info!(url = %health_url, "keepalive pinger started");

    // Give the listener a moment before the first ping.
    tokio::time::sleep(STARTUP_DELAY).await;

    let mut ticker = tokio::time::interval(PING_INTERVAL);
    loop {
        ticker.tick().await;
        match client.get(&health_url).send().await {
            Ok(response) => {
                info!(status = response.status().as_u16(), "keepalive ping");
            }
            Err(error) => {
                warn!(%error, "keepalive ping failed");
            }
        }
    }
}
