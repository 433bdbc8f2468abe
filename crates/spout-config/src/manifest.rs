use anyhow::{anyhow, Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use spout_output::OutputConfig;
use spout_state::StateConfig;
use std::fmt;
use std::path::Path;

pub const MANIFEST_VERSION: &str = "1";

/// A YAML file describing spouts to run
///
/// ```yaml
/// version: "1"
/// spouts:
///   my_postgres:
///     name: PostgreSQL
///     method: fetch
///     args: { host: localhost, user: postgres, database: mydb, query: "SELECT 1" }
///     output: { type: folder, args: { path: ./out } }
///     state: { type: file, args: { path: ./state } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub version: String,

    /// Entries in file order
    #[serde(deserialize_with = "in_file_order")]
    pub spouts: Vec<(String, SpoutEntry)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoutEntry {
    /// Registered spout name (e.g. "PostgreSQL")
    pub name: String,

    /// Only `fetch` is supported
    pub method: String,

    /// Connection parameters handed to the spout factory
    #[serde(default)]
    pub args: Value,

    #[serde(default)]
    pub output: Option<OutputConfig>,

    /// Memory state when unset
    #[serde(default)]
    pub state: Option<StateConfig>,
}

impl Manifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn get(&self, key: &str) -> Option<&SpoutEntry> {
        self.spouts
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, entry)| entry)
    }

    /// Check every entry, reporting all problems at once
    pub fn validate(&self, known_spouts: &[String]) -> Result<()> {
        let mut problems = Vec::new();

        if self.version != MANIFEST_VERSION {
            problems.push(format!(
                "unsupported manifest version '{}' (expected '{}')",
                self.version, MANIFEST_VERSION
            ));
        }
        if self.spouts.is_empty() {
            problems.push("no spouts defined".to_string());
        }

        for (key, entry) in &self.spouts {
            if !known_spouts.iter().any(|name| name == &entry.name) {
                problems.push(format!("{}: unknown spout '{}'", key, entry.name));
            }
            if entry.method != "fetch" {
                problems.push(format!(
                    "{}: unsupported method '{}' (only 'fetch')",
                    key, entry.method
                ));
            }
            if entry.output.is_none() {
                problems.push(format!("{}: missing output configuration", key));
            }
            if !(entry.args.is_object() || entry.args.is_null()) {
                problems.push(format!("{}: args must be a mapping", key));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Invalid manifest:\n  {}", problems.join("\n  ")))
        }
    }
}

fn in_file_order<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, SpoutEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedEntries;

    impl<'de> Visitor<'de> for OrderedEntries {
        type Value = Vec<(String, SpoutEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of spout keys to spout entries")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedEntries)
}
