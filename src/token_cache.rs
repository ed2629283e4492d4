//! Renewal-aware token cache with single-flight exchanges
//!
//! An entry moves through four states, judged lazily on every access:
//!
//! ```text
//! pending ──> ready ──(expires_at - lead)──> stale ──(expires_at)──> expired
//! ```
//!
//! - **ready**: served without I/O.
//! - **stale**: still served, and one background renewal is started.
//! - **missing / expired**: the caller waits for an exchange. Concurrent
//!   callers for the same key wait on the same exchange.
//!
//! Exchanges run as spawned tasks, so a caller that gives up never cancels
//! an exchange other callers (or the next request) could use. Failures are
//! handed to every waiter and never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::clock::Clock;
use crate::config::TokenCacheConfig;
use crate::error::Error;
use crate::error::Result;

/// Identity of a cached token
///
/// Built from the credential identity and everything that changes the token
/// the provider would mint, so distinct requests never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub client_email: String,
    pub private_key_id: String,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access {
        scope: String,
        subject: Option<String>,
    },
    Id {
        audience: String,
        uid: String,
        /// Developer claims rendered as canonical JSON
        claims: Option<String>,
    },
}

/// What a fetcher hands back to the cache
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub value: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Keeps a background renewal alive past the request that triggered it
///
/// Hosts with a deferred-completion mechanism (a task tracker drained on
/// shutdown, for instance) implement this. Renewals run on the tokio runtime
/// whether or not a hook is installed.
pub trait WaitUntil: Send + Sync {
    fn wait_until(&self, task: BoxFuture<'static, ()>);
}

impl<F> WaitUntil for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync,
{
    fn wait_until(&self, task: BoxFuture<'static, ()>) {
        self(task)
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<CachedToken>>>;

enum Lookup {
    Hit(String),
    Wait(SharedFetch),
}

#[derive(Default)]
struct Entry {
    ready: Option<CachedToken>,
    pending: Option<(u64, SharedFetch)>,
}

struct Inner {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    clock: Arc<dyn Clock>,
    renewal_lead: i64,
    wait_until: Option<Arc<dyn WaitUntil>>,
    next_fetch_id: AtomicU64,
}

impl Inner {
    fn complete(&self, key: &CacheKey, fetch_id: u64, result: &Result<CachedToken>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if !matches!(entry.pending, Some((id, _)) if id == fetch_id) {
            return;
        }

        entry.pending = None;
        match result {
            Ok(token) => entry.ready = Some(token.clone()),
            Err(error) => warn!(?key.kind, %error, "Token exchange failed, next access retries"),
        }
    }
}

/// Process-wide token cache, cheap to clone
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Inner>,
}

impl TokenCache {
    pub fn new(config: TokenCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                clock,
                renewal_lead: i64::try_from(config.renewal_lead.as_secs()).unwrap_or(i64::MAX),
                wait_until: None,
                next_fetch_id: AtomicU64::new(1),
            }),
        }
    }

    /// Install the background-task hook used for renewals
    ///
    /// Must be called before the cache is cloned or shared.
    pub fn with_wait_until(mut self, hook: Arc<dyn WaitUntil>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.wait_until = Some(hook);
        } else {
            warn!("TokenCache already shared, ignoring wait_until hook");
        }
        self
    }

    /// Return the token for `key`, calling `fetcher` at most once for all concurrent callers
    ///
    /// `fetcher` is only invoked when an exchange is needed, while the cache
    /// lock is held; it must return its future without awaiting anything.
    ///
    /// # Errors
    /// Propagates the fetcher's error to every caller waiting on that exchange
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedToken>> + Send + 'static,
    {
        let (lookup, renewal) = {
            let mut entries = self.inner.entries.lock();
            let now = self.inner.clock.now();
            let entry = entries.entry(key.clone()).or_default();

            let served = entry
                .ready
                .as_ref()
                .filter(|token| now < token.expires_at)
                .map(|token| (token.value.clone(), token.expires_at));

            match served {
                Some((value, expires_at))
                    if now >= expires_at.saturating_sub(self.inner.renewal_lead) =>
                {
                    let renewal = if entry.pending.is_none() {
                        debug!(
                            ?key.kind,
                            expires_at,
                            "Serving stale token, renewing in background"
                        );
                        Some(self.start_fetch(key, entry, fetcher()))
                    } else {
                        debug!(?key.kind, "Serving stale token, renewal already in flight");
                        None
                    };
                    (Lookup::Hit(value), renewal)
                }
                Some((value, _)) => {
                    debug!(?key.kind, "Token cache hit");
                    (Lookup::Hit(value), None)
                }
                None => match &entry.pending {
                    Some((_, shared)) => {
                        debug!(?key.kind, "Joining in-flight token exchange");
                        (Lookup::Wait(shared.clone()), None)
                    }
                    None => {
                        debug!(?key.kind, "Token cache miss");
                        (Lookup::Wait(self.start_fetch(key, entry, fetcher())), None)
                    }
                },
            }
        };

        // The hook runs outside the entries lock so it may use the cache
        if let (Some(renewal), Some(hook)) = (renewal, &self.inner.wait_until) {
            hook.wait_until(renewal.map(|_| ()).boxed());
        }

        match lookup {
            Lookup::Hit(value) => Ok(value),
            Lookup::Wait(waiter) => waiter.await.map(|token| token.value),
        }
    }

    fn start_fetch<Fut>(&self, key: &CacheKey, entry: &mut Entry, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<FetchedToken>> + Send + 'static,
    {
        let fetch_id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await.map(|fetched| {
                let issued_at = inner.clock.now();
                CachedToken {
                    value: fetched.value,
                    issued_at,
                    expires_at: issued_at.saturating_add(fetched.expires_in),
                }
            });
            inner.complete(&task_key, fetch_id, &result);
            result
        });

        let inner = Arc::clone(&self.inner);
        let waiter_key = key.clone();
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    let result = Err(Error::TaskAborted(join_error.to_string()));
                    inner.complete(&waiter_key, fetch_id, &result);
                    result
                }
            }
        }
        .boxed()
        .shared();

        entry.pending = Some((fetch_id, shared.clone()));
        shared
    }

    /// Drop the entry for `key`; the next access fetches a new token
    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.entries.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
