mod factory;
mod scanner;

pub use factory::HBaseSpoutFactory;
pub use scanner::{HBaseConfig, HBaseSession, HBaseSpout};
