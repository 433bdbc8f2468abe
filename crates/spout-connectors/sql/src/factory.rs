use crate::{Dialect, RelationalConfig, RelationalSpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

/// Factory for one named relational backend
pub struct RelationalSpoutFactory {
    name: &'static str,
    dialect: Dialect,
}

impl RelationalSpoutFactory {
    pub fn postgres() -> Self {
        Self {
            name: "PostgreSQL",
            dialect: Dialect::Postgres,
        }
    }

    pub fn mysql() -> Self {
        Self {
            name: "MySQL",
            dialect: Dialect::Mysql,
        }
    }

    /// Google Cloud SQL for MySQL
    pub fn cloud_sql() -> Self {
        Self {
            name: "CloudSQL",
            dialect: Dialect::Mysql,
        }
    }

    /// MemSQL / SingleStore, spoken to over the MySQL protocol
    pub fn memsql() -> Self {
        Self {
            name: "MemSQL",
            dialect: Dialect::Mysql,
        }
    }
}

impl SpoutFactory for RelationalSpoutFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let mut config: RelationalConfig = decode_args(args)?;
        config.dialect = self.dialect;
        Ok(Box::new(RelationalSpout::new(self.name, config)))
    }
}
