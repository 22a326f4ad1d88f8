use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::thread;

use governor::clock::{Clock as _, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota};
use log::debug;

/// Blocking call-rate ceiling for a single endpoint.
pub struct RateLimiter {
    name: String,
    inner: DefaultDirectRateLimiter,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, quota: Quota) -> Self {
        Self {
            name: name.into(),
            inner: governor::RateLimiter::direct(quota),
            clock: DefaultClock::default(),
        }
    }

    pub fn per_minute(name: impl Into<String>, calls: NonZeroU32) -> Self {
        Self::new(name, Quota::per_minute(calls))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block the current thread until a permit is available.
    pub fn wait(&self) {
        while let Err(not_until) = self.inner.check() {
            let pause = not_until.wait_time_from(self.clock.now());
            debug!("rate limit reached for `{}`, sleeping {:?}", self.name, pause);
            thread::sleep(pause);
        }
    }

    /// Run `call` once a permit is available.
    pub fn call<T>(&self, call: impl FnOnce() -> T) -> T {
        self.wait();
        call()
    }
}

/// Per-endpoint limiters, created on first use. Endpoints never share a budget.
pub struct RateLimiters {
    default_quota: Quota,
    quotas: HashMap<String, Quota>,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiters {
    pub fn new(default_quota: Quota) -> Self {
        Self {
            default_quota,
            quotas: HashMap::new(),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(calls: NonZeroU32) -> Self {
        Self::new(Quota::per_minute(calls))
    }

    pub fn with_quota(mut self, endpoint: impl Into<String>, quota: Quota) -> Self {
        self.quotas.insert(endpoint.into(), quota);
        self
    }

    pub fn for_endpoint(&self, endpoint: &str) -> Arc<RateLimiter> {
        let mut guard = self
            .limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                let quota = self
                    .quotas
                    .get(endpoint)
                    .copied()
                    .unwrap_or(self.default_quota);
                Arc::new(RateLimiter::new(endpoint, quota))
            })
            .clone()
    }

    pub fn call<T>(&self, endpoint: &str, call: impl FnOnce() -> T) -> T {
        self.for_endpoint(endpoint).call(call)
    }
}
