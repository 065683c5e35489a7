/// Migration mode gate
///
/// The gate decides per call whether dual-store behavior is active. It
/// is injected into the router as an explicit capability and consulted
/// fresh on every dispatch, so the toggle can flip mid-process without
/// a restart.
use std::sync::atomic::{AtomicBool, Ordering};

/// Live migration toggle consumed by the router.
///
/// Implementations must not cache across calls, and must map any
/// failure to read their configuration source to `false` (the safer
/// secondary-only state).
pub trait MigrationGate: Send + Sync {
    fn multi_store_enabled(&self) -> bool;
}

/// Atomically flippable in-process toggle
pub struct FeatureToggle {
    enabled: AtomicBool,
}

impl FeatureToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn enable(&self) {
        self.set(true);
    }

    pub fn disable(&self) {
        self.set(false);
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl MigrationGate for FeatureToggle {
    fn multi_store_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Environment-variable-backed gate, read on every call.
///
/// Anything other than a literal truthy value ("1", "true", "on",
/// case-insensitive) disables dual-store mode, including an unset or
/// unreadable variable.
pub struct EnvGate {
    variable: String,
}

impl EnvGate {
    pub fn new<S: Into<String>>(variable: S) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl MigrationGate for EnvGate {
    fn multi_store_enabled(&self) -> bool {
        match std::env::var(&self.variable) {
            Ok(value) => {
                let value = value.trim().to_lowercase();
                value == "1" || value == "true" || value == "on"
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_without_restart() {
        let toggle = FeatureToggle::new(false);
        assert!(!toggle.multi_store_enabled());

        toggle.enable();
        assert!(toggle.multi_store_enabled());

        toggle.disable();
        assert!(!toggle.multi_store_enabled());
    }

    #[test]
    fn test_env_gate_defaults_to_disabled() {
        let gate = EnvGate::new("PUENTE_TEST_GATE_UNSET_VARIABLE");
        assert!(!gate.multi_store_enabled());
    }

    #[test]
    fn test_env_gate_truthy_values() {
        let variable = "PUENTE_TEST_GATE_TRUTHY";
        let gate = EnvGate::new(variable);

        std::env::set_var(variable, "true");
        assert!(gate.multi_store_enabled());

        std::env::set_var(variable, "ON");
        assert!(gate.multi_store_enabled());

        std::env::set_var(variable, "yes");
        assert!(!gate.multi_store_enabled());

        std::env::remove_var(variable);
    }
}
