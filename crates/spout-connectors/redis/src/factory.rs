use crate::{RedisConfig, RedisSpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

pub struct RedisSpoutFactory;

impl SpoutFactory for RedisSpoutFactory {
    fn name(&self) -> &str {
        "Redis"
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let config: RedisConfig = decode_args(args)?;
        Ok(Box::new(RedisSpout::new(config)))
    }
}
