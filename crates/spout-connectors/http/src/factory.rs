use crate::{HttpQueryConfig, HttpQuerySpout};
use serde_json::Value;
use spout_core::{decode_args, Result, Spout, SpoutFactory};

pub struct HttpQuerySpoutFactory {
    name: &'static str,
}

impl HttpQuerySpoutFactory {
    /// KairosDB datapoint query endpoint
    pub fn kairosdb() -> Self {
        Self { name: "KairosDB" }
    }

    /// Any endpoint answering `GET ?query=` with a `results` field
    pub fn generic() -> Self {
        Self { name: "HttpQuery" }
    }
}

impl SpoutFactory for HttpQuerySpoutFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn create(&self, args: Value) -> Result<Box<dyn Spout>> {
        let config: HttpQueryConfig = decode_args(args)?;
        Ok(Box::new(HttpQuerySpout::new(self.name, config)))
    }
}
