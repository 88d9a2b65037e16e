// Per-client rate limiting for the generate endpoint

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ServerConfig;

/// Token bucket for one client address
#[derive(Debug)]
struct Allowance {
    available: f64,
    updated_at: Instant,
}

/// Token-bucket limiter keyed by client IP. Cloning shares the buckets.
#[derive(Clone)]
pub struct RateLimiter {
    allowances: Arc<DashMap<IpAddr, Allowance>>,
    per_second: f64,
    burst: f64,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self {
            allowances: Arc::new(DashMap::new()),
            per_second,
            burst: f64::from(burst.max(1)),
            trust_forwarded_for: false,
        }
    }

    /// Key clients by the first `X-Forwarded-For` entry instead of the
    /// socket peer. Only safe behind a proxy that overwrites the header.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Limiter for `[server]`, or `None` when rate limiting is off.
    pub fn from_config(config: &ServerConfig) -> Option<Self> {
        config
            .rate_limit_per_second
            .map(|rate| {
                Self::new(rate, config.rate_limit_burst)
                    .trust_forwarded_for(config.trust_forwarded_for)
            })
    }

    /// Take one token for `client` at time `now`.
    ///
    /// Returns how long the client should wait when the bucket is empty.
    pub fn try_acquire_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut allowance = self.allowances.entry(client).or_insert(Allowance {
            available: self.burst,
            updated_at: now,
        });

        let elapsed = now.saturating_duration_since(allowance.updated_at);
        allowance.available =
            (allowance.available + elapsed.as_secs_f64() * self.per_second).min(self.burst);
        allowance.updated_at = now;

        if allowance.available >= 1.0 {
            allowance.available -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - allowance.available;
            Err(Duration::try_from_secs_f64(missing / self.per_second).unwrap_or(Duration::MAX))
        }
    }

    pub fn try_acquire(&self, client: IpAddr) -> Result<(), Duration> {
        self.try_acquire_at(client, Instant::now())
    }

    /// Drop buckets untouched for longer than `idle`.
    pub fn forget_idle(&self, idle: Duration) {
        let now = Instant::now();
        self.allowances
            .retain(|_, allowance| now.saturating_duration_since(allowance.updated_at) < idle);
    }

    pub fn tracked_clients(&self) -> usize {
        self.allowances.len()
    }
}

/// Reject requests over the client's allowance with 429 and `Retry-After`.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&request, limiter.trust_forwarded_for);

    match limiter.try_acquire(client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            tracing::warn!(client = %client, "Rate limit exceeded");
            let retry_after = wait.as_secs().max(1).to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", retry_after)],
                Json(json!({ "error": "Too many requests" })),
            )
                .into_response()
        }
    }
}

/// Client address: the first `X-Forwarded-For` entry when trusted, then the
/// socket peer.
fn client_ip(request: &Request<Body>, trust_forwarded_for: bool) -> IpAddr {
    trust_forwarded_for
        .then(|| forwarded_for(request.headers()))
        .flatten()
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(1.0, 3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.try_acquire_at(addr(1), now).is_ok());
        }
        let wait = limiter.try_acquire_at(addr(1), now).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(1));
    }

    #[test]
    fn test_refills_over_time() {
        let limiter = RateLimiter::new(2.0, 1);
        let start = Instant::now();
        assert!(limiter.try_acquire_at(addr(1), start).is_ok());
        assert!(limiter.try_acquire_at(addr(1), start).is_err());
        let later = start + Duration::from_millis(600);
        assert!(limiter.try_acquire_at(addr(1), later).is_ok());
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1.0, 1);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(addr(1), now).is_ok());
        assert!(limiter.try_acquire_at(addr(1), now).is_err());
        assert!(limiter.try_acquire_at(addr(2), now).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_forget_idle() {
        let limiter = RateLimiter::new(1.0, 1);
        let _ = limiter.try_acquire(addr(1));
        limiter.forget_idle(Duration::ZERO);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(RateLimiter::from_config(&ServerConfig::default()).is_none());
    }

    #[test]
    fn test_tiny_rate_waits_saturate() {
        let limiter = RateLimiter::new(1e-300, 1);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(addr(1), now).is_ok());
        assert_eq!(limiter.try_acquire_at(addr(1), now), Err(Duration::MAX));
    }

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request<Body> {
        let mut request = Request::builder().uri("/generate");
        if let Some(forwarded) = forwarded {
            request = request.header("x-forwarded-for", forwarded);
        }
        let mut request = request.body(Body::empty()).unwrap();
        let peer: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let request = request_from("192.0.2.9:4000", Some("198.51.100.7"));
        assert_eq!(
            client_ip(&request, false),
            "192.0.2.9".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            client_ip(&request, true),
            "198.51.100.7".parse::<IpAddr>().unwrap()
        );

        let request = request_from("192.0.2.9:4000", None);
        assert_eq!(
            client_ip(&request, true),
            "192.0.2.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_from_config_carries_trust_flag() {
        let config = ServerConfig {
            rate_limit_per_second: Some(1.0),
            trust_forwarded_for: true,
            ..ServerConfig::default()
        };
        assert!(RateLimiter::from_config(&config).unwrap().trust_forwarded_for);
    }

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.7, 10.0.0.1".parse().unwrap());
        assert_eq!(
            forwarded_for(&headers),
            Some("198.51.100.7".parse::<IpAddr>().unwrap())
        );

        headers.insert("x-forwarded-for", "garbage".parse().unwrap());
        assert_eq!(forwarded_for(&headers), None);
    }
}
