use crate::domain::errors::StorageError;
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{CacheBackend, CachedEntry, DurableStore};
use crate::infrastructure::runtime::{RetryPolicy, Sleeper, TaskSpawner, retry_with_backoff};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

type InitFuture = Shared<LocalBoxFuture<'static, Result<(), StorageError>>>;

struct MirrorSlot<T> {
    entry: CachedEntry<T>,
    generation: u64,
}

struct Inner<T> {
    store: Rc<dyn DurableStore>,
    mirror: RefCell<HashMap<String, MirrorSlot<T>>>,
    next_generation: Cell<u64>,
    // Deletes and clears issued before hydration; their durable side is
    // still queued behind initialization.
    pending_deletes: RefCell<HashSet<String>>,
    pending_clear: Cell<bool>,
    init: RefCell<Option<InitFuture>>,
    ready: Cell<bool>,
    sleeper: Rc<dyn Sleeper>,
    spawner: Rc<dyn TaskSpawner>,
    retry: RetryPolicy,
}

/// Write-behind cache: a synchronous in-memory mirror in front of an
/// asynchronous [`DurableStore`].
///
/// Reads never wait for storage. Writes land in the mirror immediately and are
/// persisted in a detached task with bounded retries; a write that still fails
/// after the last attempt is evicted from the mirror unless a newer write for
/// the same key has replaced it in the meantime.
pub struct PersistentCacheBackend<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for PersistentCacheBackend<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PersistentCacheBackend<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    pub fn new(
        store: Rc<dyn DurableStore>,
        sleeper: Rc<dyn Sleeper>,
        spawner: Rc<dyn TaskSpawner>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                store,
                mirror: RefCell::new(HashMap::new()),
                next_generation: Cell::new(0),
                pending_deletes: RefCell::new(HashSet::new()),
                pending_clear: Cell::new(false),
                init: RefCell::new(None),
                ready: Cell::new(false),
                sleeper,
                spawner,
                retry,
            }),
        }
    }

    /// Opens the durable store and hydrates the mirror.
    ///
    /// Concurrent callers share a single attempt, and its outcome is kept:
    /// after a failure every call resolves to the same error until
    /// [`reinitialize`](Self::reinitialize) is used.
    pub fn initialize(&self) -> LocalBoxFuture<'static, Result<(), StorageError>> {
        self.inner.init_future().boxed_local()
    }

    /// Drops the memoized outcome and starts a fresh initialization.
    pub fn reinitialize(&self) -> LocalBoxFuture<'static, Result<(), StorageError>> {
        self.inner.init.borrow_mut().take();
        self.inner.ready.set(false);
        self.initialize()
    }

    /// Copies every durable entry into the mirror. Entries already present in
    /// the mirror are newer and win; unparseable entries are skipped, as are
    /// keys deleted or cleared before the load.
    pub async fn load_from_storage(&self) -> Result<usize, StorageError> {
        self.inner.load_from_storage().await
    }

    pub fn len(&self) -> usize {
        self.inner.mirror.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Inner<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    fn init_future(self: &Rc<Self>) -> InitFuture {
        let mut init = self.init.borrow_mut();
        init.get_or_insert_with(|| Self::start_initialization(Rc::downgrade(self)))
            .clone()
    }

    fn start_initialization(weak: Weak<Self>) -> InitFuture {
        async move {
            let inner = weak.upgrade().ok_or(StorageError::NotInitialized)?;
            let outcome = async {
                inner.store.open().await?;
                inner.load_from_storage().await
            }
            .await;

            match outcome {
                Ok(loaded) => {
                    inner.ready.set(true);
                    get_logger().info(
                        LogComponent::Infrastructure("PersistentCache"),
                        &format!("Initialized with {loaded} cached entries"),
                    );
                    Ok(())
                }
                Err(e) => {
                    get_logger().error(
                        LogComponent::Infrastructure("PersistentCache"),
                        &format!("Initialization failed: {e}"),
                    );
                    Err(e)
                }
            }
        }
        .boxed_local()
        .shared()
    }

    async fn load_from_storage(&self) -> Result<usize, StorageError> {
        let rows = self.store.load_all().await?;
        let cleared = self.pending_clear.replace(false);
        let deleted = std::mem::take(&mut *self.pending_deletes.borrow_mut());
        if cleared {
            crate::log_debug!(
                LogComponent::Infrastructure("PersistentCache"),
                "Cache cleared before hydration, ignoring {} stored entries",
                rows.len()
            );
            return Ok(0);
        }

        let mut loaded = 0;
        for (key, raw) in rows {
            if deleted.contains(&key) {
                continue;
            }
            match serde_json::from_str::<CachedEntry<T>>(&raw) {
                Ok(entry) => {
                    let generation = self.bump_generation();
                    let mut mirror = self.mirror.borrow_mut();
                    if !mirror.contains_key(&key) {
                        mirror.insert(key, MirrorSlot { entry, generation });
                        loaded += 1;
                    }
                }
                Err(e) => get_logger().warn(
                    LogComponent::Infrastructure("PersistentCache"),
                    &format!("Skipping unreadable entry '{key}': {e}"),
                ),
            }
        }
        Ok(loaded)
    }

    fn bump_generation(&self) -> u64 {
        let generation = self.next_generation.get() + 1;
        self.next_generation.set(generation);
        generation
    }

    async fn persist_with_retry(self: Rc<Self>, key: String, entry: CachedEntry<T>, generation: u64) {
        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                get_logger().error(
                    LogComponent::Infrastructure("PersistentCache"),
                    &format!("Cannot serialize '{key}': {e}"),
                );
                self.evict_if_current(&key, generation);
                return;
            }
        };

        let this = &self;
        let store_key = key.as_str();
        let result = retry_with_backoff(self.retry, self.sleeper.as_ref(), move |_attempt| {
            let payload = payload.clone();
            async move {
                this.init_future().await?;
                this.store.put(store_key, payload).await
            }
        })
        .await;

        if let Err(e) = result {
            get_logger().error(
                LogComponent::Infrastructure("PersistentCache"),
                &format!(
                    "Giving up on '{key}' after {} attempts: {e}",
                    self.retry.max_attempts.max(1)
                ),
            );
            self.evict_if_current(&key, generation);
        }
    }

    fn evict_if_current(&self, key: &str, generation: u64) {
        let mut mirror = self.mirror.borrow_mut();
        if mirror.get(key).is_some_and(|slot| slot.generation == generation) {
            mirror.remove(key);
        }
    }

    fn spawn_durable(self: &Rc<Self>, op: DurableOp) {
        let inner = Rc::clone(self);
        self.spawner.spawn(
            async move {
                let result = async {
                    inner.init_future().await?;
                    match &op {
                        DurableOp::Remove(key) => inner.store.remove(key).await,
                        DurableOp::Clear => inner.store.clear().await,
                    }
                }
                .await;
                if let Err(e) = result {
                    get_logger().warn(
                        LogComponent::Infrastructure("PersistentCache"),
                        &format!("Durable {op:?} failed: {e}"),
                    );
                }
            }
            .boxed_local(),
        );
    }
}

#[derive(Debug)]
enum DurableOp {
    Remove(String),
    Clear,
}

impl<T> CacheBackend<T> for PersistentCacheBackend<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    fn get(&self, key: &str) -> Option<CachedEntry<T>> {
        self.inner
            .mirror
            .borrow()
            .get(key)
            .map(|slot| slot.entry.clone())
    }

    fn set(&self, key: &str, value: CachedEntry<T>) {
        let generation = self.inner.bump_generation();
        self.inner.mirror.borrow_mut().insert(
            key.to_string(),
            MirrorSlot {
                entry: value.clone(),
                generation,
            },
        );

        let task = Rc::clone(&self.inner).persist_with_retry(key.to_string(), value, generation);
        self.inner.spawner.spawn(task.boxed_local());
    }

    fn delete(&self, key: &str) {
        self.inner.mirror.borrow_mut().remove(key);
        if !self.inner.ready.get() {
            self.inner.pending_deletes.borrow_mut().insert(key.to_string());
        }
        self.inner.spawn_durable(DurableOp::Remove(key.to_string()));
    }

    fn clear(&self) {
        self.inner.mirror.borrow_mut().clear();
        if !self.inner.ready.get() {
            self.inner.pending_deletes.borrow_mut().clear();
            self.inner.pending_clear.set(true);
        }
        self.inner.spawn_durable(DurableOp::Clear);
    }

    fn keys(&self) -> Vec<String> {
        self.inner.mirror.borrow().keys().cloned().collect()
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.get()
    }
}
