mod bigtable;
mod factory;
mod rows;

pub use bigtable::{BigtableConfig, BigtableSession, BigtableSpout};
pub use factory::BigtableSpoutFactory;
pub use rows::{CellChunk, ReadRowsResponse, RowMerger};
