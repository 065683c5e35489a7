/// Dual-write execution
///
/// Writes go to the primary first; a primary failure is caught and
/// reported but never aborts the call. The secondary then runs
/// unconditionally and its outcome, value or error, is what the caller
/// sees. Execution is strictly sequential so the secondary always
/// observes the call after the primary attempt has finished.
use std::sync::Arc;

use crate::error::{PuenteError, StoreError};
use crate::observe::{ErrorContext, Observability};
use crate::store::{Command, StoreBackend, Value};

pub(crate) struct DualWrite<'a> {
    pub primary: &'a Arc<dyn StoreBackend>,
    pub secondary: &'a Arc<dyn StoreBackend>,
    pub observe: &'a Arc<dyn Observability>,
}

impl DualWrite<'_> {
    pub(crate) async fn write(&self, command: &Command) -> Result<Value, StoreError> {
        if let Err(error) = self.primary.call(command).await {
            let context = ErrorContext::new(&command.name)
                .with_extra(format!("primary write on {}", self.primary.name()));
            self.observe
                .report_error(&PuenteError::Store(error), &context);
        }

        // Secondary is authoritative; its result or error is the caller's.
        self.secondary.call(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::observe::{LogObservability, REPORTED_ERRORS_TOTAL};
    use crate::store::memory::MemoryStore;

    struct DownStore;

    #[async_trait]
    impl StoreBackend for DownStore {
        fn name(&self) -> &str {
            "down"
        }

        async fn call(&self, _command: &Command) -> Result<Value, StoreError> {
            Err(StoreError::connection("refused"))
        }
    }

    async fn write(
        primary: &Arc<dyn StoreBackend>,
        secondary: &Arc<dyn StoreBackend>,
        observe: &Arc<LogObservability>,
        command: &Command,
    ) -> Result<Value, StoreError> {
        let observe: Arc<dyn Observability> = observe.clone();
        DualWrite {
            primary,
            secondary,
            observe: &observe,
        }
        .write(command)
        .await
    }

    #[tokio::test]
    async fn test_write_reaches_both_stores() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let observe = Arc::new(LogObservability::new());

        let p: Arc<dyn StoreBackend> = primary.clone();
        let s: Arc<dyn StoreBackend> = secondary.clone();
        let value = write(&p, &s, &observe, &Command::set("k", "v")).await.unwrap();

        assert_eq!(value, Value::ok());
        assert_eq!(
            primary.call(&Command::get("k")).await.unwrap(),
            Value::bulk("v")
        );
        assert_eq!(
            secondary.call(&Command::get("k")).await.unwrap(),
            Value::bulk("v")
        );
    }

    #[tokio::test]
    async fn test_primary_failure_is_invisible_to_caller() {
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let observe = Arc::new(LogObservability::new());

        let p: Arc<dyn StoreBackend> = Arc::new(DownStore);
        let s: Arc<dyn StoreBackend> = secondary.clone();
        let value = write(&p, &s, &observe, &Command::set("k", "v")).await.unwrap();

        assert_eq!(value, Value::ok());
        assert_eq!(
            secondary.call(&Command::get("k")).await.unwrap(),
            Value::bulk("v")
        );
        assert_eq!(observe.counter_value(REPORTED_ERRORS_TOTAL, "set"), 1);
    }

    #[tokio::test]
    async fn test_secondary_failure_propagates() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let observe = Arc::new(LogObservability::new());

        let p: Arc<dyn StoreBackend> = primary.clone();
        let s: Arc<dyn StoreBackend> = Arc::new(DownStore);
        let result = write(&p, &s, &observe, &Command::set("k", "v")).await;

        assert!(matches!(result, Err(StoreError::Connection { .. })));
        // primary was still updated; the migration reconciles this later
        assert_eq!(
            primary.call(&Command::get("k")).await.unwrap(),
            Value::bulk("v")
        );
        // no recovered-error report for the authoritative side
        assert_eq!(observe.counter_value(REPORTED_ERRORS_TOTAL, "set"), 0);
    }

    #[tokio::test]
    async fn test_secondary_result_is_authoritative() {
        // setnx: key exists only on the secondary, so primary says 1 but
        // the caller must see the secondary's 0
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        secondary.call(&Command::set("k", "existing")).await.unwrap();
        let observe = Arc::new(LogObservability::new());

        let p: Arc<dyn StoreBackend> = primary.clone();
        let s: Arc<dyn StoreBackend> = secondary.clone();
        let value = write(&p, &s, &observe, &Command::setnx("k", "new"))
            .await
            .unwrap();

        assert_eq!(value, Value::Int(0));
        assert_eq!(
            secondary.call(&Command::get("k")).await.unwrap(),
            Value::bulk("existing")
        );
    }
}
