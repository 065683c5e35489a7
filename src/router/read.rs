/// Fallback-read execution
///
/// Reads try the primary store first. A primary error is caught,
/// reported, and treated as an empty result; a present primary value is
/// returned immediately with no further action. Only when the primary
/// has no answer does the secondary run, so a read can never fail
/// solely because the primary failed.
use std::sync::Arc;

use crate::error::{PuenteError, StoreError};
use crate::observe::{ErrorContext, Observability, READ_FALLBACK_TOTAL};
use crate::store::{Command, StoreBackend, Value};

pub(crate) struct FallbackRead<'a> {
    pub primary: &'a Arc<dyn StoreBackend>,
    pub secondary: &'a Arc<dyn StoreBackend>,
    pub observe: &'a Arc<dyn Observability>,
}

impl FallbackRead<'_> {
    pub(crate) async fn read(&self, command: &Command) -> Result<Value, StoreError> {
        let primary_value = match self.primary.call(command).await {
            Ok(value) => value,
            Err(error) => {
                let context = ErrorContext::new(&command.name)
                    .with_extra(format!("primary read on {}", self.primary.name()));
                self.observe
                    .report_error(&PuenteError::Store(error), &context);
                Value::Nil
            }
        };

        if !primary_value.is_missing() {
            return Ok(primary_value);
        }

        // Primary had no answer; the secondary decides the outcome.
        match self.secondary.call(command).await {
            Ok(value) if !value.is_missing() => {
                self.observe
                    .increment_counter(READ_FALLBACK_TOTAL, &command.name);
                tracing::info!(
                    command = %command.name,
                    store = self.secondary.name(),
                    "read served by fallback store",
                );
                Ok(value)
            }
            Ok(value) => {
                tracing::warn!(
                    command = %command.name,
                    "read missed on both stores",
                );
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(
                    command = %command.name,
                    "read missed on both stores",
                );
                Err(error)
            }
        }
    }
}
