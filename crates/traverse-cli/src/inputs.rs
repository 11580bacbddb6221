//! `key=value` input parsing.
//!
//! Values are JSON-decoded so `-i limit=3` yields a number and
//! `-i tags='["a","b"]'` a list; anything that fails to parse as JSON is
//! taken as a plain string.

use anyhow::{Context, bail};
use serde_json::Value;
use traverse_types::workflow::VarMap;

/// Parse repeated `key=value` arguments into an input map.
pub fn parse_input_args(args: &[String]) -> anyhow::Result<VarMap> {
    let mut inputs = VarMap::new();
    for arg in args {
        let (key, raw) = arg
            .split_once('=')
            .with_context(|| format!("input '{arg}' is not of the form key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("input '{arg}' has an empty key");
        }
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(key.to_string(), value);
    }
    Ok(inputs)
}
