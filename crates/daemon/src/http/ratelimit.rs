//! In-memory per-client-IP rate limiting: a request window plus a separate
//! auth-failure counter that blocks the IP for a configured duration.
//! Entries are pruned amortized per operation; when the map exceeds a hard
//! cap, least-recently-seen non-blocked entries are evicted first.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Auth failures tolerated before the IP is blocked.
pub const MAX_AUTH_FAILURES: u32 = 11;
/// Hard cap on tracked clients.
const MAX_ENTRIES: usize = 10_000;
/// Request window length.
const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct ClientEntry {
    window_start: Instant,
    requests: u32,
    auth_failures: u32,
    blocked_until: Option<Instant>,
    last_seen: Instant,
}

/// Decision for one incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    /// Request window exhausted.
    Limited,
    /// Blocked after repeated auth failures; retry after this long.
    AuthBlocked { retry_after: Duration },
}

pub struct RateLimiter {
    clients: Mutex<HashMap<IpAddr, ClientEntry>>,
    requests_per_minute: u32,
    block_duration: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, block_duration: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            requests_per_minute,
            block_duration,
        }
    }

    /// Admit or refuse a request from `ip` at `now`.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Gate {
        let mut clients = self.clients.lock();
        Self::prune(&mut clients, now);

        let entry = clients.entry(ip).or_insert_with(|| ClientEntry {
            window_start: now,
            requests: 0,
            auth_failures: 0,
            blocked_until: None,
            last_seen: now,
        });
        entry.last_seen = now;

        if let Some(until) = entry.blocked_until {
            if now < until {
                return Gate::AuthBlocked { retry_after: until.duration_since(now) };
            }
            entry.blocked_until = None;
            entry.auth_failures = 0;
        }

        if now.duration_since(entry.window_start) >= WINDOW {
            entry.window_start = now;
            entry.requests = 0;
        }
        entry.requests += 1;
        if entry.requests > self.requests_per_minute {
            return Gate::Limited;
        }
        Gate::Allowed
    }

    /// Record a failed authentication; the block engages once the counter
    /// passes [`MAX_AUTH_FAILURES`].
    pub fn record_auth_failure(&self, ip: IpAddr, now: Instant) {
        let mut clients = self.clients.lock();
        let entry = clients.entry(ip).or_insert_with(|| ClientEntry {
            window_start: now,
            requests: 0,
            auth_failures: 0,
            blocked_until: None,
            last_seen: now,
        });
        entry.last_seen = now;
        entry.auth_failures += 1;
        if entry.auth_failures >= MAX_AUTH_FAILURES {
            entry.blocked_until = Some(now + self.block_duration);
        }
    }

    /// A successful authentication clears the failure streak.
    pub fn record_auth_success(&self, ip: IpAddr) {
        if let Some(entry) = self.clients.lock().get_mut(&ip) {
            entry.auth_failures = 0;
        }
    }

    fn prune(clients: &mut HashMap<IpAddr, ClientEntry>, now: Instant) {
        // stale: not seen for two windows and not blocked
        clients.retain(|_, e| {
            e.blocked_until.is_some_and(|until| now < until)
                || now.duration_since(e.last_seen) < WINDOW * 2
        });
        if clients.len() <= MAX_ENTRIES {
            return;
        }
        // over cap: evict least-recently-seen non-blocked entries first
        let mut seen: Vec<(IpAddr, Instant)> = clients
            .iter()
            .filter(|(_, e)| !e.blocked_until.is_some_and(|until| now < until))
            .map(|(ip, e)| (*ip, e.last_seen))
            .collect();
        seen.sort_by_key(|(_, t)| *t);
        let excess = clients.len().saturating_sub(MAX_ENTRIES);
        for (ip, _) in seen.into_iter().take(excess) {
            clients.remove(&ip);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.clients.lock().len()
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
