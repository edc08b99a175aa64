use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::ConnectivityConfig;

/// Coarse reachability of the translation API, shown to the user only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    Online,
    Weak,
    Offline,
}

/// Outcome of a single health check
#[derive(Debug, Clone, Copy)]
pub enum HealthCheck {
    Responded { success: bool, latency: Duration },
    Unreachable,
}

pub fn classify(outcome: HealthCheck, weak_latency: Duration) -> ConnectivityStatus {
    match outcome {
        HealthCheck::Responded { success: true, latency } if latency <= weak_latency => {
            ConnectivityStatus::Online
        }
        HealthCheck::Responded { .. } => ConnectivityStatus::Weak,
        HealthCheck::Unreachable => ConnectivityStatus::Offline,
    }
}

pub struct ConnectivityMonitor {
    client: Client,
    health_url: String,
    poll_interval: Duration,
    weak_latency: Duration,
}

impl ConnectivityMonitor {
    pub fn new(health_url: String, config: &ConnectivityConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            health_url,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            weak_latency: Duration::from_millis(config.weak_latency_ms),
        })
    }

    pub async fn check(&self) -> ConnectivityStatus {
        let started = Instant::now();
        let outcome = match self.client.get(&self.health_url).send().await {
            Ok(response) => HealthCheck::Responded {
                success: response.status().is_success(),
                latency: started.elapsed(),
            },
            Err(e) => {
                debug!("Health check failed: {}", e);
                HealthCheck::Unreachable
            }
        };
        classify(outcome, self.weak_latency)
    }

    /// Poll in the background. Receivers only wake when the status changes.
    pub fn spawn(self) -> watch::Receiver<ConnectivityStatus> {
        let interval = self.poll_interval;
        let monitor = Arc::new(self);
        spawn_polling(interval, move || {
            let monitor = monitor.clone();
            async move { monitor.check().await }
        })
    }
}

fn spawn_polling<F, Fut>(
    interval: Duration,
    mut check: F,
) -> watch::Receiver<ConnectivityStatus>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ConnectivityStatus> + Send + 'static,
{
    let (tx, rx) = watch::channel(ConnectivityStatus::Offline);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let status = check().await;
            let changed = tx.send_if_modified(|current| {
                if *current == status {
                    return false;
                }
                *current = status;
                true
            });
            if changed {
                info!("Connectivity changed: {:?}", status);
            }
            if tx.is_closed() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[test]
    fn classification_thresholds() {
        let weak = Duration::from_millis(1500);
        assert_eq!(
            classify(
                HealthCheck::Responded { success: true, latency: Duration::from_millis(100) },
                weak
            ),
            ConnectivityStatus::Online
        );
        assert_eq!(
            classify(
                HealthCheck::Responded { success: true, latency: Duration::from_secs(3) },
                weak
            ),
            ConnectivityStatus::Weak
        );
        assert_eq!(
            classify(
                HealthCheck::Responded { success: false, latency: Duration::from_millis(10) },
                weak
            ),
            ConnectivityStatus::Weak
        );
        assert_eq!(classify(HealthCheck::Unreachable, weak), ConnectivityStatus::Offline);
    }

    #[tokio::test]
    async fn health_check_against_live_and_dead_servers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/broken", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ConnectivityConfig::default();
        let online =
            ConnectivityMonitor::new(format!("http://{}/health", addr), &config).unwrap();
        assert_eq!(online.check().await, ConnectivityStatus::Online);

        let degraded =
            ConnectivityMonitor::new(format!("http://{}/broken", addr), &config).unwrap();
        assert_eq!(degraded.check().await, ConnectivityStatus::Weak);

        let dead_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead_listener.local_addr().unwrap();
        drop(dead_listener);
        let offline =
            ConnectivityMonitor::new(format!("http://{}/health", dead_addr), &config).unwrap();
        assert_eq!(offline.check().await, ConnectivityStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_only_on_transitions() {
        use ConnectivityStatus::*;
        let script = Arc::new(Mutex::new(VecDeque::from(vec![
            Online, Online, Online, Weak, Weak, Online,
        ])));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = calls.clone();
        let mut rx = spawn_polling(Duration::from_secs(5), move || {
            counted.fetch_add(1, Ordering::SeqCst);
            let status = script.lock().unwrap().pop_front().unwrap_or(Online);
            async move { status }
        });
        assert_eq!(*rx.borrow(), Offline);

        for expected in [Online, Weak, Online] {
            rx.changed().await.unwrap();
            assert_eq!(*rx.borrow_and_update(), expected);
        }

        // A minute of identical results must not wake the receiver
        let quiet = tokio::time::timeout(Duration::from_secs(60), rx.changed()).await;
        assert!(quiet.is_err());
        assert!(calls.load(Ordering::SeqCst) >= 10);
    }
}
