//! Download-with-retry into flash, with a cached last known-good copy.
//!
//! [`FetchController::acquire`] is the only entry point the wake cycle needs:
//!
//! - up to [`RetryPolicy::max_attempts`] attempts, [`RetryPolicy::retry_delay_ms`] apart,
//!   stopping at the first success
//! - every attempt starts by discarding whatever is stored at the destination, so a
//!   failed attempt never leaves a truncated asset behind
//! - a fresh download is copied over the cache file when caching is enabled
//! - once all attempts are spent the cache copy is restored over the destination

use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::error::{NetworkError, PipelineError};
use crate::storage::{copy_asset, Storage};

pub mod transport;

pub use transport::{FetchRequest, HttpMethod, HttpResponse, HttpTransport};

use transport::HTTP_OK;

/// Download buffer size
pub const TRANSFER_CHUNK: usize = 1024;

/// Monotonic time plus blocking delays
pub trait Clock: DelayNs {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed [`Clock`], works on the host and on ESP-IDF std
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Where an asset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSource {
    pub url: String,
    pub method: HttpMethod,
}

impl FetchSource {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredFrom {
    /// Fresh download, on the given 1-based attempt
    Network { attempt: u32 },
    /// Every attempt failed, the cached copy was restored
    Cache,
}

/// Successful outcome of [`FetchController::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub from: AcquiredFrom,
    pub bytes: u64,
}

pub struct FetchController<T, S, C> {
    transport: T,
    storage: S,
    clock: C,
    policy: RetryPolicy,
    cache_path: String,
}

impl<T, S, C> FetchController<T, S, C>
where
    T: HttpTransport,
    S: Storage,
    C: Clock,
{
    pub fn new(
        transport: T,
        storage: S,
        clock: C,
        policy: RetryPolicy,
        cache_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            storage,
            clock,
            policy,
            cache_path: cache_path.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn cache_path(&self) -> &str {
        &self.cache_path
    }

    /// Get `source` into `destination`, see the module docs for the policy
    pub fn acquire(
        &mut self,
        source: &FetchSource,
        payload: Option<&[u8]>,
        destination: &str,
        caching: bool,
    ) -> Result<Acquired, PipelineError> {
        let attempts = self.policy.max_attempts;

        for attempt in 1..=attempts {
            let started = self.clock.now_ms();
            info!(
                "Fetch attempt {}/{}: {:?} {}",
                attempt, attempts, source.method, source.url
            );

            match self.attempt(source, payload, destination) {
                Ok(bytes) => {
                    info!(
                        "Fetched {} bytes into {} on attempt {} ({} ms)",
                        bytes,
                        destination,
                        attempt,
                        self.clock.now_ms().saturating_sub(started)
                    );
                    if caching {
                        self.refresh_cache(destination);
                    }
                    return Ok(Acquired {
                        from: AcquiredFrom::Network { attempt },
                        bytes,
                    });
                }
                Err(err) => {
                    warn!("Fetch attempt {}/{} failed: {}", attempt, attempts, err);
                    self.discard(destination);
                }
            }

            if attempt < attempts {
                debug!("Retrying in {} ms", self.policy.retry_delay_ms);
                self.clock.delay_ms(self.policy.retry_delay_ms);
            }
        }

        if !caching {
            error!("All {} attempts failed, caching disabled", attempts);
            return Err(PipelineError::Unavailable { attempts });
        }

        match self.restore_from_cache(destination) {
            Ok(bytes) => Ok(Acquired {
                from: AcquiredFrom::Cache,
                bytes,
            }),
            Err(err) => {
                error!("All {} attempts failed and no cache: {}", attempts, err);
                Err(PipelineError::Unavailable { attempts })
            }
        }
    }

    /// Copy the cached asset over `destination`.
    ///
    /// Also used directly when the network is known to be down.
    pub fn restore_from_cache(&mut self, destination: &str) -> Result<u64, PipelineError> {
        if !self.storage.exists(&self.cache_path) {
            return Err(PipelineError::StorageFailure {
                context: "restoring from cache",
                source: io::Error::new(ErrorKind::NotFound, "no cached asset"),
            });
        }
        self.discard(destination);
        let bytes = copy_asset(&self.storage, &self.cache_path, destination)?;
        info!(
            "Restored {} bytes from cache {} into {}",
            bytes, self.cache_path, destination
        );
        Ok(bytes)
    }

    fn attempt(
        &mut self,
        source: &FetchSource,
        payload: Option<&[u8]>,
        destination: &str,
    ) -> Result<u64, PipelineError> {
        self.discard(destination);

        let request = FetchRequest {
            method: source.method,
            url: &source.url,
            payload,
        };
        let mut response = self.transport.send(&request)?;

        let status = response.status();
        if status != HTTP_OK {
            return Err(NetworkError::Status(status).into());
        }
        let expected = match response.content_length() {
            Some(len) if len > 0 => len,
            other => return Err(NetworkError::InvalidContentLength(other).into()),
        };
        debug!("HTTP {} with {} bytes", status, expected);

        ensure_space(&self.storage, expected, destination, &self.cache_path)?;

        let mut file = self
            .storage
            .create(destination)
            .map_err(PipelineError::storage("creating destination"))?;

        let mut buffer = [0u8; TRANSFER_CHUNK];
        let mut received = 0u64;
        let mut last_data = self.clock.now_ms();

        while received < expected {
            match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    file.write_all(&buffer[..read])
                        .map_err(PipelineError::storage("writing destination"))?;
                    received += read as u64;
                    last_data = self.clock.now_ms();
                }
                Err(e) if is_pending(&e) => {
                    let idle_ms = self.clock.now_ms().saturating_sub(last_data);
                    if idle_ms > self.policy.stall_timeout_ms as u64 {
                        return Err(NetworkError::Stalled {
                            received,
                            expected,
                            idle_ms,
                        }
                        .into());
                    }
                    self.clock.delay_ms(self.policy.poll_interval_ms);
                }
                Err(e) => return Err(NetworkError::Body(e).into()),
            }
        }

        file.flush()
            .map_err(PipelineError::storage("flushing destination"))?;
        drop(file);

        if received != expected {
            return Err(NetworkError::LengthMismatch { received, expected }.into());
        }
        Ok(received)
    }

    fn refresh_cache(&mut self, destination: &str) {
        match copy_asset(&self.storage, destination, &self.cache_path) {
            Ok(bytes) => info!("Cache {} refreshed ({} bytes)", self.cache_path, bytes),
            // The download itself is fine, only the fallback copy is lost
            Err(err) => error!("Cache refresh failed: {}", err),
        }
    }

    fn discard(&self, path: &str) {
        if self.storage.exists(path) {
            debug!("Discarding {}", path);
            if let Err(e) = self.storage.remove(path) {
                warn!("Could not remove {}: {}", path, e);
            }
        }
    }
}

fn is_pending(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Free room for `needed` bytes: first the stale destination, then the cache file.
fn ensure_space<S: Storage>(
    storage: &S,
    needed: u64,
    destination: &str,
    cache_path: &str,
) -> Result<(), PipelineError> {
    let free = storage
        .free_space()
        .map_err(PipelineError::storage("querying free space"))?;
    if free >= needed {
        return Ok(());
    }

    let mut free = free;
    for victim in [destination, cache_path] {
        if free >= needed {
            break;
        }
        if storage.exists(victim) {
            warn!(
                "Only {} bytes free, {} needed: removing {}",
                free, needed, victim
            );
            storage
                .remove(victim)
                .map_err(PipelineError::storage("freeing space"))?;
            free = storage
                .free_space()
                .map_err(PipelineError::storage("querying free space"))?;
        }
    }

    if free < needed {
        if let Ok(assets) = storage.list() {
            for asset in assets {
                debug!("  {} ({} bytes)", asset.name, asset.size);
            }
        }
        return Err(PipelineError::StorageFailure {
            context: "reserving space",
            source: io::Error::other(format!("{} bytes free, {} needed", free, needed)),
        });
    }
    Ok(())
}
