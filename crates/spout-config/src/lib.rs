mod manifest;
mod settings;

pub use manifest::{Manifest, SpoutEntry, MANIFEST_VERSION};
pub use settings::{LoggingConfig, Settings};
pub use spout_output::OutputConfig;
pub use spout_state::StateConfig;
