use crate::{HBaseConfig, HBaseSpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

pub struct HBaseSpoutFactory;

impl SpoutFactory for HBaseSpoutFactory {
    fn name(&self) -> &str {
        "HBase"
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let config: HBaseConfig = decode_args(args)?;
        Ok(Box::new(HBaseSpout::new(config)))
    }
}
