use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a loose argument map into a typed spout configuration.
///
/// Argument maps come from `key=value` command-line pairs or YAML manifests,
/// so scalars may arrive with the wrong JSON type (`"5432"` for a port, `123`
/// for a password). A strict decode is tried first; on failure the map is
/// routed through `config`, which converts between scalar types. A missing
/// map (`null`) decodes like an empty one.
pub fn decode_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        args => args,
    };

    if let Ok(decoded) = serde_json::from_value::<T>(args.clone()) {
        return Ok(decoded);
    }

    config::Config::try_from(&args)
        .and_then(|config| config.try_deserialize::<T>())
        .map_err(|e| Error::Configuration(format!("Invalid spout arguments: {}", e)))
}
