mod file;
mod pg;
mod redis_state;
mod selection;

pub use file::FileState;
pub use pg::PostgresState;
pub use redis_state::RedisState;
pub use selection::StateConfig;
