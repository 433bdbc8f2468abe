mod factory;
mod http_query;

pub use factory::HttpQuerySpoutFactory;
pub use http_query::{HttpQueryConfig, HttpQuerySession, HttpQuerySpout};
