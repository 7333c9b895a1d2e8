//! Registry configuration

/// Default upper bound on resolver chain length
pub const DEFAULT_MAX_RESOLVER_DEPTH: usize = 8;

/// Registry-wide subscription policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Reject parameter-less subscriptions to address channels
    pub require_address: bool,

    /// Reject parameter-less subscriptions to entity type channels
    pub require_type: bool,

    /// Maximum number of resolver rewrites applied to one inbound topic
    pub max_resolver_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            require_address: false,
            require_type: false,
            max_resolver_depth: DEFAULT_MAX_RESOLVER_DEPTH,
        }
    }
}

impl RegistryConfig {
    /// Set whether address channels require a parameter
    pub fn require_address(mut self, required: bool) -> Self {
        self.require_address = required;
        self
    }

    /// Set whether entity type channels require a parameter
    pub fn require_type(mut self, required: bool) -> Self {
        self.require_type = required;
        self
    }

    /// Set the resolver chain bound (at least 1)
    pub fn max_resolver_depth(mut self, depth: usize) -> Self {
        self.max_resolver_depth = depth.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert!(!config.require_address);
        assert!(!config.require_type);
        assert_eq!(config.max_resolver_depth, DEFAULT_MAX_RESOLVER_DEPTH);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .require_address(true)
            .require_type(true)
            .max_resolver_depth(3);

        assert!(config.require_address);
        assert!(config.require_type);
        assert_eq!(config.max_resolver_depth, 3);
    }

    #[test]
    fn test_resolver_depth_floor() {
        let config = RegistryConfig::default().max_resolver_depth(0);

        assert_eq!(config.max_resolver_depth, 1);
    }
}
