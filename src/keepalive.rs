//! Periodic self-ping that keeps free-tier hosts from idling the process.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Time between pings.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10 * 60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a single ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Ok,
    Status(u16),
    Failed(String),
}

/// GET `url` once and log how it went.
pub async fn ping_once(client: &reqwest::Client, url: &str) -> PingOutcome {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::info!(%url, "keep-alive ping successful");
            PingOutcome::Ok
        }
        Ok(response) => {
            let status = response.status().as_u16();
            tracing::warn!(%url, status, "keep-alive ping failed");
            PingOutcome::Status(status)
        }
        Err(error) => {
            tracing::error!(%url, %error, "keep-alive ping failed");
            PingOutcome::Failed(error.to_string())
        }
    }
}

/// Spawn the pinger. Returns `None` when no URL is configured.
///
/// The first ping happens one interval after start.
pub fn spawn(
    url: Option<String>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    let Some(url) = url else {
        tracing::info!("HEALTH_CHECK_URL not set, keep-alive disabled");
        return None;
    };

    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to build keep-alive HTTP client");
            return None;
        }
    };

    tracing::info!(%url, minutes = interval.as_secs() / 60, "keep-alive started");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    ping_once(&client, &url).await;
                }
                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    tracing::info!("keep-alive stopped");
                    break;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let address = listener.local_addr().expect("local address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn ping_reports_success_and_status() {
        let base = serve(
            Router::new()
                .route("/status", get(|| async { "ok" }))
                .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await;
        let client = reqwest::Client::new();

        assert_eq!(ping_once(&client, &format!("{base}/status")).await, PingOutcome::Ok);
        assert_eq!(
            ping_once(&client, &format!("{base}/down")).await,
            PingOutcome::Status(503)
        );
    }

    #[tokio::test]
    async fn unreachable_url_is_a_failure() {
        let client = reqwest::Client::new();

        let outcome = ping_once(&client, "http://127.0.0.1:9/status").await;

        assert!(matches!(outcome, PingOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn disabled_without_url() {
        let (_tx, rx) = watch::channel(false);

        assert!(spawn(None, KEEP_ALIVE_INTERVAL, rx).is_none());
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = spawn(
            Some("http://127.0.0.1:9/status".into()),
            KEEP_ALIVE_INTERVAL,
            rx,
        )
        .expect("pinger spawned");

        tx.send(true).expect("receiver alive");

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("pinger should stop promptly")
            .expect("pinger task should not panic");
    }
}
