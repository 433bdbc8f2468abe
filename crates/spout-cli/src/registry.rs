use spout_bigtable_connector::BigtableSpoutFactory;
use spout_core::Registry;
use spout_hbase_connector::HBaseSpoutFactory;
use spout_http_connector::HttpQuerySpoutFactory;
use spout_presto_connector::PrestoSpoutFactory;
use spout_redis_connector::RedisSpoutFactory;
use spout_sql_connector::RelationalSpoutFactory;
use std::sync::Arc;

/// Registry holding every spout this binary ships
pub fn build_registry() -> Registry {
    let mut registry = Registry::new();

    registry.register_spout(Arc::new(RelationalSpoutFactory::postgres()));
    registry.register_spout(Arc::new(RelationalSpoutFactory::mysql()));
    registry.register_spout(Arc::new(RelationalSpoutFactory::cloud_sql()));
    registry.register_spout(Arc::new(RelationalSpoutFactory::memsql()));
    registry.register_spout(Arc::new(RedisSpoutFactory));
    registry.register_spout(Arc::new(BigtableSpoutFactory));
    registry.register_spout(Arc::new(HBaseSpoutFactory));
    registry.register_spout(Arc::new(HttpQuerySpoutFactory::kairosdb()));
    registry.register_spout(Arc::new(HttpQuerySpoutFactory::generic()));
    registry.register_spout(Arc::new(PrestoSpoutFactory));

    registry
}
