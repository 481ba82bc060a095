//! Block generator configuration.

use crate::GeneratorError;

/// Block generator configuration.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Roll period in milliseconds (default: 200).
    pub block_interval_ms: u64,
    /// Maximum number of completed blocks awaiting drain (default: 10).
    pub block_queue_capacity: usize,
    /// Admission cap in items per second; zero means unlimited (default: 0).
    pub max_rate_per_second: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { block_interval_ms: 200, block_queue_capacity: 10, max_rate_per_second: 0 }
    }
}

impl GeneratorConfig {
    /// Creates a new builder for configuring a block generator.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    /// Rejects values the generator cannot run with.
    pub(crate) fn validate(&self) -> Result<(), GeneratorError> {
        if self.block_interval_ms == 0 {
            return Err(GeneratorError::InvalidConfig(
                "block_interval_ms must be positive".to_string(),
            ));
        }
        if self.block_queue_capacity == 0 {
            return Err(GeneratorError::InvalidConfig(
                "block_queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Clone, Debug)]
pub struct GeneratorConfigBuilder {
    block_interval_ms: u64,
    block_queue_capacity: usize,
    max_rate_per_second: u32,
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            block_interval_ms: defaults.block_interval_ms,
            block_queue_capacity: defaults.block_queue_capacity,
            max_rate_per_second: defaults.max_rate_per_second,
        }
    }
}

impl GeneratorConfigBuilder {
    /// Sets the roll period in milliseconds.
    pub const fn block_interval_ms(mut self, block_interval_ms: u64) -> Self {
        self.block_interval_ms = block_interval_ms;
        self
    }

    /// Sets the block queue capacity.
    pub const fn block_queue_capacity(mut self, block_queue_capacity: usize) -> Self {
        self.block_queue_capacity = block_queue_capacity;
        self
    }

    /// Sets the admission cap in items per second (zero means unlimited).
    pub const fn max_rate_per_second(mut self, max_rate_per_second: u32) -> Self {
        self.max_rate_per_second = max_rate_per_second;
        self
    }

    /// Builds the [`GeneratorConfig`].
    pub const fn build(self) -> GeneratorConfig {
        GeneratorConfig {
            block_interval_ms: self.block_interval_ms,
            block_queue_capacity: self.block_queue_capacity,
            max_rate_per_second: self.max_rate_per_second,
        }
    }
}
