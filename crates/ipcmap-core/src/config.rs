//! Cache configuration

/// Default number of table slots reserved up front
pub const DEFAULT_CAPACITY: usize = 64;

/// What `resolve` does when a cached handle is requested on another device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Return the existing mapping and log a warning
    #[default]
    Ignore,
    /// Fail with [`Error::DeviceMismatch`](crate::Error::DeviceMismatch)
    Reject,
}

/// Handle cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub initial_capacity: usize,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            mismatch_policy: MismatchPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.initial_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Ignore);
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default()
            .with_capacity(8)
            .with_mismatch_policy(MismatchPolicy::Reject);
        assert_eq!(config.initial_capacity, 8);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Reject);
    }
}
