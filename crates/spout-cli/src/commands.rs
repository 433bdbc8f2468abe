use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use spout_config::{Manifest, OutputConfig, StateConfig};
use spout_core::{Registry, RunState, Spout};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Parse a `key=value` command-line pair
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("invalid KEY=value pair: `{}`", s))
}

/// Command-line pairs as a string-valued argument map
pub fn args_to_value(pairs: Vec<(String, String)>) -> Value {
    let map: Map<String, Value> = pairs
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Value::Object(map)
}

/// Build the state selection from `--state` / `--state-url`
pub fn state_from_flags(kind: &str, url: Option<String>) -> Result<StateConfig> {
    match kind {
        "memory" => Ok(StateConfig::Memory),
        "file" => Ok(StateConfig::File {
            path: url.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("state")),
        }),
        "redis" => Ok(StateConfig::Redis {
            url: url.ok_or_else(|| anyhow!("--state-url is required for redis state"))?,
            prefix: "spout:state:".to_string(),
        }),
        "postgres" => Ok(StateConfig::Postgres {
            url: url.ok_or_else(|| anyhow!("--state-url is required for postgres state"))?,
        }),
        other => Err(anyhow!("Unknown state type '{}'", other)),
    }
}

/// Build one spout and run a single fetch.
///
/// Setup problems (unknown spout, bad arguments, unusable output or state)
/// are returned; the fetch itself never fails, its outcome is in the state.
pub async fn run_spout(
    registry: &Registry,
    run_id: &str,
    spout_name: &str,
    args: Value,
    output: &OutputConfig,
    state: &StateConfig,
) -> Result<RunState> {
    let spout = registry
        .create_spout(spout_name, args)
        .with_context(|| format!("Failed to create spout '{}'", spout_name))?;
    let mut output = output.open().await.context("Failed to open output")?;
    let state = state
        .open()
        .await
        .with_context(|| format!("Failed to open {} state store", state.kind()))?;

    info!("Running {} as '{}'", spout.name(), run_id);
    let result = spout.fetch(run_id, &mut output, state.as_ref()).await;
    info!(
        "Run '{}' finished: {} success(es), {} failure(s), {} file(s) written",
        run_id,
        result.success_count,
        result.failure_count,
        output.files_written()
    );

    Ok(result)
}

/// Run every spout of a manifest in file order, or just `only`
pub async fn run_manifest(
    registry: &Registry,
    path: &Path,
    only: Option<&str>,
) -> Result<Vec<(String, RunState)>> {
    let manifest = Manifest::from_file(path)?;
    manifest.validate(&registry.list_spouts())?;

    if let Some(key) = only {
        if manifest.get(key).is_none() {
            return Err(anyhow!("Spout '{}' is not defined in {}", key, path.display()));
        }
    }

    let mut results = Vec::new();
    for (key, entry) in &manifest.spouts {
        if only.is_some_and(|only| only != key.as_str()) {
            continue;
        }
        // validate() has checked that output is present
        let Some(output) = &entry.output else {
            continue;
        };
        let state = entry.state.clone().unwrap_or_default();

        match run_spout(registry, key, &entry.name, entry.args.clone(), output, &state).await {
            Ok(result) => results.push((key.clone(), result)),
            Err(e) => error!("Skipping '{}': {:#}", key, e),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::build_registry;
    use serde_json::json;
    use spout_core::StateStore;
    use spout_state::FileState;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spout-cli-{}-{}", label, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("query=SELECT * FROM t WHERE a=1").unwrap(),
            ("query".to_string(), "SELECT * FROM t WHERE a=1".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_args_to_value() {
        let value = args_to_value(vec![("port".to_string(), "5432".to_string())]);
        assert_eq!(value, json!({ "port": "5432" }));
    }

    #[test]
    fn test_state_from_flags() {
        assert_eq!(state_from_flags("memory", None).unwrap(), StateConfig::Memory);
        assert_eq!(
            state_from_flags("file", None).unwrap(),
            StateConfig::File {
                path: PathBuf::from("state")
            }
        );
        assert!(state_from_flags("redis", None).is_err());
        assert!(state_from_flags("etcd", None).is_err());
    }

    #[tokio::test]
    async fn test_unknown_spout_is_a_setup_error() {
        let output = OutputConfig::Folder {
            path: temp_dir("out"),
        };
        let result = run_spout(
            &build_registry(),
            "run",
            "Firestore",
            json!({}),
            &output,
            &StateConfig::Memory,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_manifest_run_records_failure_in_file_state() {
        let dir = temp_dir("manifest");
        std::fs::create_dir_all(&dir).unwrap();
        let state_dir = dir.join("state");
        let manifest_path = dir.join("spouts.yaml");
        std::fs::write(
            &manifest_path,
            format!(
                r#"
version: "1"
spouts:
  local_redis:
    name: Redis
    method: fetch
    args:
      host: 127.0.0.1
      port: 1
    output:
      type: folder
      args:
        path: {out}
    state:
      type: file
      args:
        path: {state}
"#,
                out = dir.join("out").display(),
                state = state_dir.display()
            ),
        )
        .unwrap();

        let results = run_manifest(&build_registry(), &manifest_path, None).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "local_redis");
        assert_eq!(results[0].1.failure_count, 1);

        let stored = FileState::new(&state_dir).get_state("local_redis").await.unwrap();
        assert_eq!(stored, Some(results[0].1.clone()));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_only_must_name_a_manifest_entry() {
        let dir = temp_dir("only");
        std::fs::create_dir_all(&dir).unwrap();
        let manifest_path = dir.join("spouts.yaml");
        std::fs::write(
            &manifest_path,
            r#"
version: "1"
spouts:
  a:
    name: Redis
    method: fetch
    output: { type: folder, args: { path: ./out } }
"#,
        )
        .unwrap();

        let result = run_manifest(&build_registry(), &manifest_path, Some("b")).await;

        assert!(result.is_err());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
