/// Scoped store pinning for block-taking commands
///
/// While a pipelined block runs, every nested command must reach the one
/// store chosen for the outer command. The pin lives in a slot on the
/// router instance; acquisition returns an RAII guard so the slot is
/// cleared on every exit path, including panics and early errors inside
/// the block. Exactly one pin can be active per router; a second
/// acquisition fails loudly instead of silently overwriting the first.
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::{PuenteError, PuenteResult};
use crate::store::{Command, StoreBackend, Value};

/// Router-instance slot holding the currently pinned store, if any
pub(crate) struct PinSlot {
    inner: Mutex<Option<Arc<dyn StoreBackend>>>,
}

impl PinSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// The pinned store, if a block is currently executing
    pub(crate) fn current(&self) -> Option<Arc<dyn StoreBackend>> {
        self.inner.lock().expect("pin slot poisoned").clone()
    }

    /// Pin `store` for the lifetime of the returned guard
    pub(crate) fn acquire(
        &self,
        store: Arc<dyn StoreBackend>,
        command: &str,
    ) -> PuenteResult<PinGuard<'_>> {
        let mut slot = self.inner.lock().expect("pin slot poisoned");
        if slot.is_some() {
            return Err(PuenteError::pin_active(command));
        }
        *slot = Some(store);
        Ok(PinGuard { slot: self })
    }
}

/// Clears the pin slot when dropped
pub(crate) struct PinGuard<'a> {
    slot: &'a PinSlot,
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.inner.lock().expect("pin slot poisoned");
        *slot = None;
    }
}

/// Handle given to a pipelined block, bound to the store chosen for the
/// outer command.
///
/// Every operation goes straight to that store, bypassing
/// classification, the migration gate, and the dual-store executors.
pub struct PinnedStore {
    store: Arc<dyn StoreBackend>,
}

impl PinnedStore {
    pub(crate) fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }

    /// Name of the store this block is bound to
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Execute an arbitrary command against the pinned store
    pub async fn call(&self, command: Command) -> PuenteResult<Value> {
        Ok(self.store.call(&command).await?)
    }

    pub async fn get(&self, key: &str) -> PuenteResult<Value> {
        self.call(Command::get(key)).await
    }

    pub async fn mget(&self, keys: &[&str]) -> PuenteResult<Value> {
        self.call(Command::mget(keys)).await
    }

    pub async fn set(&self, key: &str, value: impl Into<Bytes>) -> PuenteResult<Value> {
        self.call(Command::set(key, value)).await
    }

    pub async fn setnx(&self, key: &str, value: impl Into<Bytes>) -> PuenteResult<Value> {
        self.call(Command::setnx(key, value)).await
    }

    pub async fn setex(
        &self,
        key: &str,
        ttl_sec: u64,
        value: impl Into<Bytes>,
    ) -> PuenteResult<Value> {
        self.call(Command::setex(key, ttl_sec, value)).await
    }

    pub async fn sadd(&self, key: &str, member: impl Into<Bytes>) -> PuenteResult<Value> {
        self.call(Command::sadd(key, member)).await
    }

    pub async fn srem(&self, key: &str, member: impl Into<Bytes>) -> PuenteResult<Value> {
        self.call(Command::srem(key, member)).await
    }

    pub async fn smembers(&self, key: &str) -> PuenteResult<Value> {
        self.call(Command::smembers(key)).await
    }

    pub async fn scard(&self, key: &str) -> PuenteResult<Value> {
        self.call(Command::scard(key)).await
    }

    pub async fn del(&self, key: &str) -> PuenteResult<Value> {
        self.call(Command::del(key)).await
    }
}
