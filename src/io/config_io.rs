use std::fs;
use std::io;
use std::path::Path;

use crate::io::store_io::{CONFIG_FILE, StoreError, atomic_write};
use crate::model::StoreConfig;

/// Written by `lk init`
pub const CONFIG_TEMPLATE: &str = r##"# listkeeper store configuration

[store]
# File extension of list documents
extension = "list"

[lists]
# Color for new lists: gray, blue, green, yellow, orange, red
default_color = "gray"

[controller]
# Upper bound on concurrent reads while resolving list colors
max_concurrent_fetches = 4
# Resolve colors of newly discovered lists right away
eager_colors = true
"##;

/// Read the store config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing. A missing file reads as
/// the defaults.
pub fn read_config(store_dir: &Path) -> Result<(StoreConfig, toml_edit::DocumentMut), StoreError> {
    let config_path = store_dir.join(CONFIG_FILE);
    let config_text = match fs::read_to_string(&config_path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(StoreError::ReadError {
                path: config_path,
                source: e,
            });
        }
    };
    let config: StoreConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text
        .parse()
        .map_err(|e: toml_edit::TomlError| StoreError::ConfigEditError(e.to_string()))?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(store_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), StoreError> {
    let config_path = store_dir.join(CONFIG_FILE);
    atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| StoreError::WriteError {
        path: config_path,
        source: e,
    })
}

/// Set a dotted key (`controller.eager_colors`) in the config document.
///
/// `raw` is read as a TOML value when it parses as one (`8`, `true`,
/// `"red"`), and as a bare string otherwise (`red`). The edited document is
/// checked against the config schema before it is accepted.
pub fn set_config_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<(), StoreError> {
    let (table_key, field) = key
        .split_once('.')
        .ok_or_else(|| StoreError::ConfigEditError(format!("expected section.key, got {:?}", key)))?;
    if table_key.is_empty() || field.is_empty() || field.contains('.') {
        return Err(StoreError::ConfigEditError(format!(
            "expected section.key, got {:?}",
            key
        )));
    }

    let value = raw
        .parse::<toml_edit::Value>()
        .unwrap_or_else(|_| toml_edit::Value::from(raw));

    let mut edited = doc.clone();
    if !edited.contains_key(table_key) {
        edited[table_key] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let table = edited[table_key]
        .as_table_mut()
        .ok_or_else(|| StoreError::ConfigEditError(format!("{} is not a table", table_key)))?;
    table[field] = toml_edit::Item::Value(value);

    let config: StoreConfig = toml::from_str(&edited.to_string())?;
    check_known_key(&config, table_key, field)?;
    *doc = edited;
    Ok(())
}

/// serde ignores unknown keys, so typos would be accepted silently
fn check_known_key(config: &StoreConfig, table_key: &str, field: &str) -> Result<(), StoreError> {
    let value = toml::Value::try_from(config)
        .map_err(|e| StoreError::ConfigEditError(e.to_string()))?;
    let known = value
        .get(table_key)
        .and_then(|t| t.get(field))
        .is_some();
    if known {
        Ok(())
    } else {
        Err(StoreError::ConfigEditError(format!(
            "unknown setting {}.{}",
            table_key, field
        )))
    }
}
