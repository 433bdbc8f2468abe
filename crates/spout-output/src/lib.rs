mod folder;

pub use folder::{FolderOutput, OutputConfig};
