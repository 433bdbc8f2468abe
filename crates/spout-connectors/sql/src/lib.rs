mod factory;
mod relational;
mod row;

pub use factory::RelationalSpoutFactory;
pub use relational::{Dialect, RelationalConfig, RelationalSession, RelationalSpout};
pub use row::{mysql_row_to_json, pg_row_to_json};
