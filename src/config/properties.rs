// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Java-properties configuration provider (`org.ops4j.pax.web.cfg`).

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{ConfigError, ConfigProvider, parse_scalar};

/// Flat `key = value` configuration as found in Karaf's `etc/*.cfg` files.
///
/// Lines starting with `#` or `!` are comments, `=` or `:` separate key and
/// value, and a trailing backslash continues the value on the next line.
#[derive(Debug, Default)]
pub struct PropertiesConfigProvider {
    entries: HashMap<String, String>,
}

impl PropertiesConfigProvider {
    /// Read a properties file from disk.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::provider_error("properties", format!("failed to read {path}: {e}"))
        })?;
        Ok(Self::parse(&content))
    }

    /// Whether `path` looks like a properties file.
    pub fn handles(path: &str) -> bool {
        Path::new(path)
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                ext == "cfg" || ext == "properties"
            })
            .unwrap_or(false)
    }

    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        let mut pending = String::new();

        for raw in content.lines() {
            let line = if pending.is_empty() {
                raw.trim()
            } else {
                raw.trim_start()
            };
            if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
                continue;
            }

            if let Some(continued) = line.strip_suffix('\\') {
                pending.push_str(continued);
                continue;
            }
            pending.push_str(line);

            if let Some((key, value)) = split_entry(&pending) {
                entries.insert(key, value);
            }
            pending.clear();
        }
        if let Some((key, value)) = split_entry(&pending) {
            entries.insert(key, value);
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.find(['=', ':']) {
        Some(pos) => Some((
            line[..pos].trim().to_string(),
            line[pos + 1..].trim().to_string(),
        )),
        None => Some((line.to_string(), String::new())),
    }
}

impl ConfigProvider for PropertiesConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "properties"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.entries.get(key).map(|value| parse_scalar(value)))
    }
}
