use crate::{BigtableConfig, BigtableSpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

pub struct BigtableSpoutFactory;

impl SpoutFactory for BigtableSpoutFactory {
    fn name(&self) -> &str {
        "Bigtable"
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let config: BigtableConfig = decode_args(args)?;
        Ok(Box::new(BigtableSpout::new(config)))
    }
}
