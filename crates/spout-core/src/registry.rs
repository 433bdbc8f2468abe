use crate::{Error, Result, Spout, SpoutFactory};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of spout factories, keyed by spout name
pub struct Registry {
    spout_factories: HashMap<String, Arc<dyn SpoutFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            spout_factories: HashMap::new(),
        }
    }

    /// Register a spout factory
    pub fn register_spout(&mut self, factory: Arc<dyn SpoutFactory>) {
        let name = factory.name().to_string();
        self.spout_factories.insert(name, factory);
    }

    /// Get a spout factory by name
    pub fn get_spout_factory(&self, name: &str) -> Result<Arc<dyn SpoutFactory>> {
        self.spout_factories
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("Spout '{}' not found", name)))
    }

    /// Build a spout from its name and argument map
    pub fn create_spout(&self, name: &str, args: Value) -> Result<Box<dyn Spout>> {
        self.get_spout_factory(name)?.create(args)
    }

    /// List all registered spout names, sorted
    pub fn list_spouts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.spout_factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchOutput, RunState, StateStore};
    use async_trait::async_trait;
    use serde_json::json;

    struct NullSpout;

    #[async_trait]
    impl Spout for NullSpout {
        fn name(&self) -> &str {
            "Null"
        }

        async fn fetch(
            &self,
            _run_id: &str,
            _output: &mut dyn BatchOutput,
            _state: &dyn StateStore,
        ) -> RunState {
            RunState::initial(false)
        }
    }

    struct NullFactory(&'static str);

    impl SpoutFactory for NullFactory {
        fn name(&self) -> &str {
            self.0
        }

        fn create(&self, _args: Value) -> Result<Box<dyn Spout>> {
            Ok(Box::new(NullSpout))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry.register_spout(Arc::new(NullFactory("Redis")));
        registry.register_spout(Arc::new(NullFactory("MySQL")));

        assert_eq!(registry.list_spouts(), vec!["MySQL", "Redis"]);
        assert!(registry.create_spout("Redis", json!({})).is_ok());
    }

    #[test]
    fn test_unknown_spout() {
        let registry = Registry::new();
        let err = registry.create_spout("Cassandra", json!({})).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
