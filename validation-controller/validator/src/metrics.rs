use prometheus_client::{metrics::gauge::Gauge, registry::Registry};

/// Exposes whether the most recently validated configuration was accepted.
#[derive(Clone, Debug, Default)]
pub struct ValidatorMetrics {
    valid_config: Gauge,
}

impl ValidatorMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let valid_config = Gauge::default();
        reg.register(
            "valid_config",
            "Whether the last validated configuration was valid (1) or not (0)",
            valid_config.clone(),
        );
        Self { valid_config }
    }

    pub fn is_valid(&self) -> bool {
        self.valid_config.get() == 1
    }

    pub(crate) fn set_valid(&self, valid: bool) {
        self.valid_config.set(i64::from(valid));
    }
}
