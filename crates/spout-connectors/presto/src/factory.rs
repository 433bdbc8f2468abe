use crate::{PrestoConfig, PrestoSpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

pub struct PrestoSpoutFactory;

impl SpoutFactory for PrestoSpoutFactory {
    fn name(&self) -> &str {
        "Presto"
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let config: PrestoConfig = decode_args(args)?;
        Ok(Box::new(PrestoSpout::new(config)))
    }
}
