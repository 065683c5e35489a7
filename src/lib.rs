pub mod config;
pub mod error;
/// Puente - dual-store router for zero-downtime key-value store migrations
///
/// Puente sits between an application and two independent key-value
/// backends while the application migrates from one to the other:
/// 1. Reads: primary store first, falling back to the secondary when the
///    primary errors or has no answer
/// 2. Writes: fanned out to both stores, with the secondary authoritative
/// 3. Unclassified commands: passed through to the secondary only
/// 4. Pipelined blocks: pinned to one store for the block's lifetime
///
/// The migration toggle, the two store handles, and the observability
/// sink are all injected, so routing behavior is an explicit function of
/// its inputs and can flip mid-process without a restart.
pub mod observe;
pub mod router;
pub mod store;

pub use config::{Config, ConfigError, LoggingConfig, MigrationConfig, StoreOptions};
pub use error::{ErrorSeverity, PuenteError, PuenteResult, StoreError};
pub use observe::{
    ErrorContext, LogObservability, Observability, METHOD_MISSING_TOTAL, READ_FALLBACK_TOTAL,
};
pub use router::{
    classify, CommandKind, EnvGate, FeatureToggle, MigrationGate, MultiStore, PinnedStore,
};
pub use store::memory::MemoryStore;
pub use store::{Command, StoreBackend, Value};
