mod factory;
mod statement;

pub use factory::PrestoSpoutFactory;
pub use statement::{PrestoConfig, PrestoSession, PrestoSpout};
