mod factory;
mod redis_spout;

pub use factory::RedisSpoutFactory;
pub use redis_spout::{KeyScanner, RedisConfig, RedisSession, RedisSpout};
