//! Per-request conversion options.
//!
//! The UI passes an options object next to the input; every field is
//! optional and falls back to [`ConvertOptions::default`].
use serde::{Deserialize, Serialize};

/// Default cap on container nesting for JSON, XML, YAML and TOML readers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// SQL flavour used for string escaping and identifier quoting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// Quote doubling inside `'...'`, identifiers in `"..."`.
    #[default]
    Ansi,
    /// Backslash escapes inside `'...'`, identifiers in backticks.
    Mysql,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertOptions {
    pub max_depth: usize,
    /// Indent JSON output; `false` emits compact JSON.
    pub pretty: bool,
    /// Type CSV/TSV cells (integers, floats, booleans, empty as null)
    /// instead of keeping every cell as a string.
    pub infer_types: bool,
    pub sql_dialect: SqlDialect,
    /// Table used by the SQL writer and the TOML wrapper for top-level lists.
    pub table_name: String,
    /// Element wrapping XML output that has no single natural root.
    pub root_element: String,
    /// Joins nested keys when flattening records into table columns.
    pub flatten_separator: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            pretty: true,
            infer_types: true,
            sql_dialect: SqlDialect::Ansi,
            table_name: "data".to_string(),
            root_element: "root".to_string(),
            flatten_separator: ".".to_string(),
        }
    }
}

impl ConvertOptions {
    /// Parses options from a JSON object such as `{"pretty": false}`.
    pub fn from_json(input: &str) -> Result<Self, String> {
        let options: Self = serde_json::from_str(input).map_err(|err| err.to_string())?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("maxDepth must be at least 1".into());
        }
        if self.table_name.trim().is_empty() {
            return Err("tableName must not be empty".into());
        }
        if self.root_element.trim().is_empty() {
            return Err("rootElement must not be empty".into());
        }
        if self.flatten_separator.is_empty() {
            return Err("flattenSeparator must not be empty".into());
        }
        Ok(())
    }
}
