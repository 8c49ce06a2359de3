//! Per-address sliding-window throttle.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use finvue_core::DataError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{AppState, error::ApiError};

/// Outcome of one check-and-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Recorded; `remaining` more requests fit in the window.
    Allowed {
        /// Requests left before the cap.
        remaining: usize,
    },
    /// Over the cap; the oldest recorded request expires after `retry_after`.
    Limited {
        /// Time until a slot frees.
        retry_after: Duration,
    },
}

/// At most `max` requests per client address in any `window`.
///
/// Each address keeps the instants of its recent requests. A request is
/// admitted when fewer than `max` of them are younger than `window`; rejected
/// requests are not recorded.
#[derive(Debug)]
pub struct Throttle {
    max: usize,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl Throttle {
    /// Creates a throttle.
    #[must_use]
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Requests allowed per window.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Checks the cap for `addr` and records the request if admitted.
    pub async fn check(&self, addr: IpAddr) -> Decision {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let hits = clients.entry(addr).or_default();

        while hits
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max {
            let retry_after = hits
                .front()
                .map_or(self.window, |&t| self.window - now.duration_since(t));
            return Decision::Limited { retry_after };
        }

        hits.push_back(now);
        Decision::Allowed {
            remaining: self.max - hits.len(),
        }
    }

    /// Forgets clients with no request inside the window. Returns how many
    /// were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, hits| {
            hits.back()
                .is_some_and(|&t| now.duration_since(t) < self.window)
        });
        before - clients.len()
    }

    /// Number of addresses currently tracked.
    pub async fn tracked(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Sweeps once per window until the throttle is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let throttle: Weak<Self> = Arc::downgrade(self);
        let period = self.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(throttle) = throttle.upgrade() else {
                    break;
                };
                let dropped = throttle.sweep().await;
                if dropped > 0 {
                    debug!(dropped, "Swept idle throttle entries");
                }
            }
        })
    }
}

/// Client address from the connection, or `0.0.0.0` when unknown.
fn client_addr(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip())
}

/// Middleware rejecting requests over the per-address cap with 429.
pub async fn enforce(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let addr = client_addr(&req);
    match state.throttle.check(addr).await {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Limited { retry_after } => {
            warn!(client = %addr, path = %req.uri().path(), "Request throttled");
            ApiError(DataError::RateLimited {
                retry_after: Some(retry_after),
            })
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let throttle = Throttle::new(2, Duration::from_secs(10));

        assert_eq!(throttle.check(ip(1)).await, Decision::Allowed { remaining: 1 });
        advance(Duration::from_secs(5)).await;
        assert_eq!(throttle.check(ip(1)).await, Decision::Allowed { remaining: 0 });
        advance(Duration::from_secs(1)).await;
        assert_eq!(
            throttle.check(ip(1)).await,
            Decision::Limited {
                retry_after: Duration::from_secs(4)
            }
        );

        // other addresses are independent
        assert_eq!(throttle.check(ip(2)).await, Decision::Allowed { remaining: 1 });

        // the first request ages out, the second is still inside the window
        advance(Duration::from_secs(4)).await;
        assert_eq!(throttle.check(ip(1)).await, Decision::Allowed { remaining: 0 });
        assert!(matches!(throttle.check(ip(1)).await, Decision::Limited { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_are_not_recorded() {
        let throttle = Throttle::new(1, Duration::from_secs(10));
        assert!(matches!(throttle.check(ip(1)).await, Decision::Allowed { .. }));
        for _ in 0..5 {
            advance(Duration::from_secs(1)).await;
            assert!(matches!(throttle.check(ip(1)).await, Decision::Limited { .. }));
        }
        advance(Duration::from_secs(5)).await;
        assert!(matches!(throttle.check(ip(1)).await, Decision::Allowed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_idle_clients() {
        let throttle = Throttle::new(5, Duration::from_secs(10));
        throttle.check(ip(1)).await;
        advance(Duration::from_secs(6)).await;
        throttle.check(ip(2)).await;
        assert_eq!(throttle.tracked().await, 2);

        advance(Duration::from_secs(5)).await;
        assert_eq!(throttle.sweep().await, 1);
        assert_eq!(throttle.tracked().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task() {
        let throttle = Arc::new(Throttle::new(5, Duration::from_secs(10)));
        throttle.check(ip(1)).await;
        let handle = throttle.spawn_sweeper();

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(throttle.tracked().await, 0);

        drop(throttle);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(handle.is_finished());
    }
}
