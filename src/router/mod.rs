/// Dual-store routing between a primary and a secondary key-value store
///
/// The `MultiStore` facade lets an application migrate between two
/// backing stores with no downtime and no lost writes. Per call it
/// consults the migration gate, classifies the command, and dispatches:
/// reads run primary-first with fallback to the secondary, writes fan
/// out to both stores with the secondary authoritative, and anything
/// unclassified passes through to the secondary only. Block-taking
/// commands pin one store for the lifetime of the block.
pub mod classify;
pub mod gate;
pub mod pin;
mod read;
mod write;

pub use classify::{classify, takes_block, CommandKind};
pub use gate::{EnvGate, FeatureToggle, MigrationGate};
pub use pin::PinnedStore;

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::{ConfigError, StoreOptions};
use crate::error::{PuenteError, PuenteResult};
use crate::observe::{ErrorContext, Observability, METHOD_MISSING_TOTAL};
use crate::router::pin::PinSlot;
use crate::router::read::FallbackRead;
use crate::router::write::DualWrite;
use crate::store::memory::MemoryStore;
use crate::store::{Command, StoreBackend, Value};

/// Router facade over two store handles.
///
/// Constructed once per process; the store handles, migration gate, and
/// observability sink are injected and owned elsewhere. The only
/// mutable state is the pin slot used by pipelined blocks.
pub struct MultiStore {
    primary: Arc<dyn StoreBackend>,
    secondary: Arc<dyn StoreBackend>,
    gate: Arc<dyn MigrationGate>,
    observe: Arc<dyn Observability>,
    pin: PinSlot,
}

impl MultiStore {
    pub fn new(
        primary: Arc<dyn StoreBackend>,
        secondary: Arc<dyn StoreBackend>,
        gate: Arc<dyn MigrationGate>,
        observe: Arc<dyn Observability>,
    ) -> Self {
        Self {
            primary,
            secondary,
            gate,
            observe,
            pin: PinSlot::new(),
        }
    }

    /// Build a router from backend options.
    ///
    /// Only the embedded `memory` backend can be constructed here;
    /// options for external backends are opaque to the router, so those
    /// deployments build their own `StoreBackend` handles and use
    /// [`MultiStore::new`].
    pub fn open(
        primary: &StoreOptions,
        secondary: &StoreOptions,
        gate: Arc<dyn MigrationGate>,
        observe: Arc<dyn Observability>,
    ) -> PuenteResult<Self> {
        Ok(Self::new(
            build_store(primary)?,
            build_store(secondary)?,
            gate,
            observe,
        ))
    }

    /// Route one command invocation.
    ///
    /// Dispatch order: an active pin short-circuits everything; a
    /// block-taking command without its block is rejected; a disabled
    /// gate routes to the secondary only; otherwise the command's
    /// classification picks the executor.
    pub async fn dispatch(&self, command: Command) -> PuenteResult<Value> {
        // Nested call during a pipelined block: go straight to the
        // pinned store, bypassing gate and classification.
        if let Some(store) = self.pin.current() {
            return Ok(store.call(&command).await?);
        }

        // Block-taking commands cannot be routed as bare invocations;
        // they have their own entry point that pins a store around the
        // block.
        if takes_block(&command.name) {
            return Err(PuenteError::internal(format!(
                "command '{}' takes a block; use MultiStore::pipelined",
                command.name
            )));
        }

        if !self.gate.multi_store_enabled() {
            return Ok(self.secondary.call(&command).await?);
        }

        match classify(&command.name) {
            CommandKind::Read => {
                let executor = FallbackRead {
                    primary: &self.primary,
                    secondary: &self.secondary,
                    observe: &self.observe,
                };
                Ok(executor.read(&command).await?)
            }
            CommandKind::Write => {
                let executor = DualWrite {
                    primary: &self.primary,
                    secondary: &self.secondary,
                    observe: &self.observe,
                };
                Ok(executor.write(&command).await?)
            }
            CommandKind::Unclassified => {
                self.observe
                    .increment_counter(METHOD_MISSING_TOTAL, &command.name);
                log::warn!(
                    "unclassified command '{}' passed through to {}",
                    command.name,
                    self.secondary.name()
                );
                Ok(self.secondary.call(&command).await?)
            }
        }
    }

    /// Execute an arbitrary command by name, the passthrough-friendly
    /// entry point for commands without a typed wrapper
    pub async fn call<S: Into<String>>(&self, name: S, args: Vec<Bytes>) -> PuenteResult<Value> {
        self.dispatch(Command::new(name, args)).await
    }

    pub async fn get(&self, key: &str) -> PuenteResult<Value> {
        self.dispatch(Command::get(key)).await
    }

    pub async fn mget(&self, keys: &[&str]) -> PuenteResult<Value> {
        self.dispatch(Command::mget(keys)).await
    }

    pub async fn set(&self, key: &str, value: impl Into<Bytes>) -> PuenteResult<Value> {
        self.dispatch(Command::set(key, value)).await
    }

    pub async fn setnx(&self, key: &str, value: impl Into<Bytes>) -> PuenteResult<Value> {
        self.dispatch(Command::setnx(key, value)).await
    }

    pub async fn setex(
        &self,
        key: &str,
        ttl_sec: u64,
        value: impl Into<Bytes>,
    ) -> PuenteResult<Value> {
        self.dispatch(Command::setex(key, ttl_sec, value)).await
    }

    pub async fn sadd(&self, key: &str, member: impl Into<Bytes>) -> PuenteResult<Value> {
        self.dispatch(Command::sadd(key, member)).await
    }

    pub async fn srem(&self, key: &str, member: impl Into<Bytes>) -> PuenteResult<Value> {
        self.dispatch(Command::srem(key, member)).await
    }

    pub async fn smembers(&self, key: &str) -> PuenteResult<Value> {
        self.dispatch(Command::smembers(key)).await
    }

    pub async fn scard(&self, key: &str) -> PuenteResult<Value> {
        self.dispatch(Command::scard(key)).await
    }

    pub async fn del(&self, key: &str) -> PuenteResult<Value> {
        self.dispatch(Command::del(key)).await
    }

    pub async fn flushdb(&self) -> PuenteResult<Value> {
        self.dispatch(Command::flushdb()).await
    }

    /// Run a block of nested commands as one pipelined invocation.
    ///
    /// `pipelined` classifies as a write, so with the gate enabled the
    /// block runs twice: once pinned to the primary (errors caught and
    /// reported) and once pinned to the secondary, whose outcome is the
    /// caller's. With the gate disabled it runs once against the
    /// secondary. The block receives the pinned-store handle and every
    /// command it issues, through the handle or through this router,
    /// reaches that one store.
    pub async fn pipelined<F, Fut, T>(&self, block: F) -> PuenteResult<T>
    where
        F: Fn(PinnedStore) -> Fut,
        Fut: Future<Output = PuenteResult<T>>,
    {
        const COMMAND: &str = "pipelined";

        if !self.gate.multi_store_enabled() {
            return self.run_pinned(&self.secondary, &block).await;
        }

        if let Err(error) = self.run_pinned(&self.primary, &block).await {
            // A pin conflict means a block is already running on this
            // router; retrying on the secondary would fail identically.
            if matches!(error, PuenteError::PinActive { .. }) {
                return Err(error);
            }
            let context = ErrorContext::new(COMMAND)
                .with_extra(format!("primary pipelined block on {}", self.primary.name()));
            self.observe.report_error(&error, &context);
        }

        self.run_pinned(&self.secondary, &block).await
    }

    async fn run_pinned<F, Fut, T>(
        &self,
        store: &Arc<dyn StoreBackend>,
        block: &F,
    ) -> PuenteResult<T>
    where
        F: Fn(PinnedStore) -> Fut,
        Fut: Future<Output = PuenteResult<T>>,
    {
        // Guard clears the pin on every exit path out of the block.
        let _pin = self.pin.acquire(store.clone(), "pipelined")?;
        block(PinnedStore::new(store.clone())).await
    }
}

fn build_store(options: &StoreOptions) -> PuenteResult<Arc<dyn StoreBackend>> {
    match options.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new(options.name.clone()))),
        other => Err(ConfigError::ValidationError(format!(
            "backend '{other}' requires an external client; construct the router with MultiStore::new"
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::error::StoreError;
    use crate::observe::{LogObservability, READ_FALLBACK_TOTAL, REPORTED_ERRORS_TOTAL};

    /// Memory store wrapper that counts calls and can fail on demand
    struct RecordingStore {
        inner: MemoryStore,
        calls: Mutex<Vec<String>>,
        fail_commands: Mutex<HashSet<String>>,
    }

    impl RecordingStore {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(name),
                calls: Mutex::new(Vec::new()),
                fail_commands: Mutex::new(HashSet::new()),
            })
        }

        fn fail_on(&self, command: &str) {
            self.fail_commands
                .lock()
                .unwrap()
                .insert(command.to_string());
        }

        fn calls_of(&self, command: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| *c == command)
                .count()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingStore {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn call(&self, command: &Command) -> Result<Value, StoreError> {
            self.calls.lock().unwrap().push(command.name.clone());
            if self.fail_commands.lock().unwrap().contains(&command.name) {
                return Err(StoreError::connection("injected failure"));
            }
            self.inner.call(command).await
        }
    }

    struct Harness {
        router: Arc<MultiStore>,
        primary: Arc<RecordingStore>,
        secondary: Arc<RecordingStore>,
        gate: Arc<FeatureToggle>,
        observe: Arc<LogObservability>,
    }

    fn harness(enabled: bool) -> Harness {
        let primary = RecordingStore::new("primary");
        let secondary = RecordingStore::new("secondary");
        let gate = Arc::new(FeatureToggle::new(enabled));
        let observe = Arc::new(LogObservability::new());
        let router = Arc::new(MultiStore::new(
            primary.clone(),
            secondary.clone(),
            gate.clone(),
            observe.clone(),
        ));
        Harness {
            router,
            primary,
            secondary,
            gate,
            observe,
        }
    }

    #[tokio::test]
    async fn test_round_trip_with_both_stores_healthy() {
        let h = harness(true);

        h.router.set("k", "v").await.unwrap();
        assert_eq!(h.router.get("k").await.unwrap(), Value::bulk("v"));

        // write went to both, read was answered by the primary alone
        assert_eq!(h.primary.calls_of("set"), 1);
        assert_eq!(h.secondary.calls_of("set"), 1);
        assert_eq!(h.primary.calls_of("get"), 1);
        assert_eq!(h.secondary.calls_of("get"), 0);
    }

    #[tokio::test]
    async fn test_gate_disabled_never_touches_primary() {
        let h = harness(false);

        h.router.set("k", "v").await.unwrap();
        h.router.get("k").await.unwrap();
        h.router.call("incr", vec![Bytes::from("n")]).await.ok();

        assert_eq!(h.primary.total_calls(), 0);
        assert_eq!(h.secondary.calls_of("set"), 1);
        assert_eq!(h.secondary.calls_of("get"), 1);
        assert_eq!(h.secondary.calls_of("incr"), 1);
    }

    #[tokio::test]
    async fn test_gate_flips_mid_process() {
        let h = harness(false);

        h.router.set("k", "v").await.unwrap();
        assert_eq!(h.primary.total_calls(), 0);

        h.gate.enable();
        h.router.set("k", "v2").await.unwrap();
        assert_eq!(h.primary.calls_of("set"), 1);
    }

    #[tokio::test]
    async fn test_unclassified_command_passes_through() {
        let h = harness(true);

        let result = h.router.call("foo", vec![Bytes::from("a")]).await;
        // the memory backend rejects the name, like a real client would
        assert!(matches!(
            result,
            Err(PuenteError::Store(StoreError::UnknownCommand { .. }))
        ));

        assert_eq!(h.primary.total_calls(), 0);
        assert_eq!(h.secondary.calls_of("foo"), 1);
        assert_eq!(h.observe.counter_value(METHOD_MISSING_TOTAL, "foo"), 1);
    }

    #[tokio::test]
    async fn test_dbsize_is_unclassified_but_served() {
        let h = harness(true);
        h.router.set("k", "v").await.unwrap();

        let value = h.router.call("dbsize", vec![]).await.unwrap();
        assert_eq!(value, Value::Int(1));
        assert_eq!(h.primary.calls_of("dbsize"), 0);
        assert_eq!(h.observe.counter_value(METHOD_MISSING_TOTAL, "dbsize"), 1);
    }

    #[tokio::test]
    async fn test_primary_write_failure_is_invisible() {
        let h = harness(true);
        h.primary.fail_on("set");

        let value = h.router.set("k", "v").await.unwrap();
        assert_eq!(value, Value::ok());
        assert_eq!(h.observe.counter_value(REPORTED_ERRORS_TOTAL, "set"), 1);
    }

    #[tokio::test]
    async fn test_secondary_write_failure_propagates() {
        let h = harness(true);
        h.secondary.fail_on("set");

        let result = h.router.set("k", "v").await;
        assert!(matches!(
            result,
            Err(PuenteError::Store(StoreError::Connection { .. }))
        ));
    }

    #[tokio::test]
    async fn test_read_falls_back_when_primary_raises() {
        let h = harness(true);
        h.secondary
            .call(&Command::set("k", "v42"))
            .await
            .unwrap();
        h.primary.fail_on("get");

        let value = h.router.get("k").await.unwrap();
        assert_eq!(value, Value::bulk("v42"));
        assert_eq!(h.observe.counter_value(READ_FALLBACK_TOTAL, "get"), 1);
    }

    #[tokio::test]
    async fn test_both_stores_empty_read_is_not_an_error() {
        let h = harness(true);

        let value = h.router.get("nope").await.unwrap();
        assert_eq!(value, Value::Nil);
        assert_eq!(h.observe.counter_value(READ_FALLBACK_TOTAL, "get"), 0);
    }

    #[tokio::test]
    async fn test_pipelined_block_runs_once_per_store() {
        let h = harness(true);

        let value = h
            .router
            .pipelined(|store| async move {
                store.set("k", "v").await?;
                store.get("k").await
            })
            .await
            .unwrap();

        assert_eq!(value, Value::bulk("v"));
        // each nested command executed exactly once on each store, and
        // the get inside the block never took the fallback path
        assert_eq!(h.primary.calls_of("set"), 1);
        assert_eq!(h.primary.calls_of("get"), 1);
        assert_eq!(h.secondary.calls_of("set"), 1);
        assert_eq!(h.secondary.calls_of("get"), 1);
        assert_eq!(h.observe.counter_value(READ_FALLBACK_TOTAL, "get"), 0);
    }

    #[tokio::test]
    async fn test_pipelined_with_gate_disabled_runs_secondary_only() {
        let h = harness(false);

        h.router
            .pipelined(|store| async move { store.set("k", "v").await })
            .await
            .unwrap();

        assert_eq!(h.primary.total_calls(), 0);
        assert_eq!(h.secondary.calls_of("set"), 1);
    }

    #[tokio::test]
    async fn test_pipelined_primary_block_failure_is_recovered() {
        let h = harness(true);
        h.primary.fail_on("set");

        let value = h
            .router
            .pipelined(|store| async move { store.set("k", "v").await })
            .await
            .unwrap();

        assert_eq!(value, Value::ok());
        assert_eq!(
            h.observe.counter_value(REPORTED_ERRORS_TOTAL, "pipelined"),
            1
        );
        assert_eq!(
            h.secondary
                .call(&Command::get("k"))
                .await
                .unwrap(),
            Value::bulk("v")
        );
    }

    #[tokio::test]
    async fn test_pipelined_secondary_block_failure_propagates() {
        let h = harness(true);
        h.secondary.fail_on("set");

        let result = h
            .router
            .pipelined(|store| async move { store.set("k", "v").await })
            .await;

        assert!(matches!(
            result,
            Err(PuenteError::Store(StoreError::Connection { .. }))
        ));
        // the pin is released; routing works again afterwards
        assert_eq!(h.router.get("k").await.unwrap(), Value::bulk("v"));
    }

    #[tokio::test]
    async fn test_router_calls_inside_block_reach_pinned_store() {
        let h = harness(true);
        let router = h.router.clone();

        h.router
            .pipelined(|store| {
                let router = router.clone();
                async move {
                    // issued through the router, not the handle: still
                    // pinned, so no method-missing accounting happens
                    router.call("dbsize", vec![]).await?;
                    store.set("k", "v").await
                }
            })
            .await
            .unwrap();

        assert_eq!(h.primary.calls_of("dbsize"), 1);
        assert_eq!(h.secondary.calls_of("dbsize"), 1);
        assert_eq!(h.observe.counter_value(METHOD_MISSING_TOTAL, "dbsize"), 0);
    }

    #[tokio::test]
    async fn test_nested_pipelined_is_rejected() {
        let h = harness(true);
        let router = h.router.clone();

        let result = h
            .router
            .pipelined(|_store| {
                let router = router.clone();
                async move {
                    router
                        .pipelined(|inner| async move { inner.get("k").await })
                        .await
                }
            })
            .await;

        assert!(matches!(result, Err(PuenteError::PinActive { .. })));
        // outer pin released despite the failure
        h.router.set("k", "v").await.unwrap();
    }

    #[tokio::test]
    async fn test_bare_pipelined_invocation_is_rejected() {
        let h = harness(true);

        let result = h.router.call("pipelined", vec![]).await;
        assert!(matches!(result, Err(PuenteError::Internal { .. })));
        // neither store saw the malformed invocation
        assert_eq!(h.primary.total_calls(), 0);
        assert_eq!(h.secondary.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_open_builds_memory_backends() {
        let primary = StoreOptions::memory("old-store");
        let secondary = StoreOptions::memory("new-store");
        let router = MultiStore::open(
            &primary,
            &secondary,
            Arc::new(FeatureToggle::new(true)),
            Arc::new(LogObservability::new()),
        )
        .unwrap();

        router.set("k", "v").await.unwrap();
        assert_eq!(router.get("k").await.unwrap(), Value::bulk("v"));
    }

    #[tokio::test]
    async fn test_open_rejects_external_backends() {
        let mut primary = StoreOptions::memory("old-store");
        primary.backend = "redis".to_string();
        let secondary = StoreOptions::memory("new-store");

        let result = MultiStore::open(
            &primary,
            &secondary,
            Arc::new(FeatureToggle::new(true)),
            Arc::new(LogObservability::new()),
        );
        assert!(matches!(result, Err(PuenteError::Config(_))));
    }
}
