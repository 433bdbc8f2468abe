use crate::{Result, Spout};
use serde_json::Value;

/// Factory trait for creating spouts
pub trait SpoutFactory: Send + Sync {
    /// Get the name under which this spout is invoked (e.g. "PostgreSQL")
    fn name(&self) -> &str;

    /// Create a new spout instance from its argument map
    fn create(&self, args: Value) -> Result<Box<dyn Spout>>;
}
