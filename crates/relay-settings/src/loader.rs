//! Reading `settings.json` and applying `RELAY_*` overrides.
//!
//! [`load_settings_from_path`] serializes the compiled defaults to JSON,
//! overlays the user file on top with [`overlay`], deserializes the result,
//! applies environment overrides and validates.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// `~/.relay`, or `/tmp/.relay` when `HOME` is unset.
pub fn relay_home() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".relay")
}

/// `~/.relay/settings.json`.
pub fn settings_path() -> PathBuf {
    relay_home().join("settings.json")
}

/// Absolute database path. A relative `storage.dbPath` is taken relative to `home`.
pub fn resolve_db_path(settings: &RelaySettings, home: &Path) -> PathBuf {
    let configured = Path::new(&settings.storage.db_path);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        home.join(configured)
    }
}

/// [`load_settings_from_path`] on [`settings_path`].
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Defaults, then the file at `path` if it exists, then the environment.
///
/// A file that is present but not valid JSON, or a merged result that fails
/// validation, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut merged = serde_json::to_value(RelaySettings::default())?;
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "applying settings file");
            overlay(&mut merged, serde_json::from_str(&text)?);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Overlay `layer` onto `base` in place.
///
/// Objects merge key by key, recursively. A `null` in `layer` leaves the
/// base value untouched. Anything else (arrays included) replaces it.
pub fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `RELAY_*` variables from the process environment.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply `RELAY_*` overrides read through `lookup`.
///
/// Empty values are ignored. Unparsable or out-of-range values are logged
/// and ignored.
pub fn apply_overrides_from(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = var("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed("RELAY_PORT", var("RELAY_PORT"), |v| v.parse::<u16>().ok()) {
        settings.server.port = v;
    }
    if let Some(v) = parsed("RELAY_HEARTBEAT_INTERVAL", var("RELAY_HEARTBEAT_INTERVAL"), |v| {
        parse_bounded(v, 1_000..=600_000)
    }) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = parsed("RELAY_USER_ID", var("RELAY_USER_ID"), |v| parse_bounded(v, 1..=i64::MAX)) {
        settings.session.user_id = v;
    }
    if let Some(v) = parsed("RELAY_BACKLOG_CHUNK_SIZE", var("RELAY_BACKLOG_CHUNK_SIZE"), |v| {
        parse_bounded(v, 1..=10_000)
    }) {
        settings.session.backlog_chunk_size = v;
    }
    if let Some(v) = parsed("RELAY_RESTORE_ON_START", var("RELAY_RESTORE_ON_START"), parse_flag) {
        settings.session.restore_on_start = v;
    }
    if let Some(v) = var("RELAY_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = var("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = var("RELAY_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

fn parsed<T>(name: &str, raw: Option<String>, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = raw?;
    let value = parse(&raw);
    if value.is_none() {
        warn!(var = name, value = %raw, "ignoring invalid environment override");
    }
    value
}

/// `true/1/yes/on` or `false/0/no/off`, case-insensitive.
pub fn parse_flag(raw: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSE: [&str; 4] = ["false", "0", "no", "off"];
    let raw = raw.trim();
    if TRUE.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Parse `raw` as `T` and keep it only if it lies in `range`.
pub fn parse_bounded<T: FromStr + PartialOrd>(raw: &str, range: RangeInclusive<T>) -> Option<T> {
    raw.trim().parse().ok().filter(|n| range.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    fn write_settings(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn overlay_merges_objects_and_replaces_the_rest() {
        let mut base = json!({
            "server": {"host": "127.0.0.1", "port": 9400},
            "session": {"networks": ["freenode", "oftc"], "userId": 1},
        });
        overlay(
            &mut base,
            json!({
                "server": {"port": 9500, "host": null},
                "session": {"networks": ["libera"]},
                "extra": {"new": true},
            }),
        );
        assert_eq!(
            base,
            json!({
                "server": {"host": "127.0.0.1", "port": 9500},
                "session": {"networks": ["libera"], "userId": 1},
                "extra": {"new": true},
            })
        );
    }

    #[test]
    fn overlay_scalar_over_object() {
        let mut base = json!({"logging": {"level": "info"}});
        overlay(&mut base, json!({"logging": "off"}));
        assert_eq!(base["logging"], "off");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.session.backlog_chunk_size, 5);
        assert_eq!(settings.storage.db_path, "relay.db");
    }

    #[test]
    fn file_values_win_over_defaults() {
        let (_dir, path) =
            write_settings(r#"{"session": {"backlogChunkSize": 20, "networks": ["freenode", "oftc"]}}"#);
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.session.backlog_chunk_size, 20);
        assert_eq!(settings.session.networks, ["freenode", "oftc"]);
        assert_eq!(settings.session.user_id, 1);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = write_settings("{ server: ");
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_merged_settings_are_rejected() {
        let (_dir, path) = write_settings(r#"{"session": {"backlogChunkSize": 0}}"#);
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Invalid { field: "session.backlogChunkSize", .. }));
    }

    #[test]
    fn db_path_resolution() {
        let mut settings = RelaySettings::default();
        let home = Path::new("/srv/relay");
        assert_eq!(resolve_db_path(&settings, home), Path::new("/srv/relay/relay.db"));

        settings.storage.db_path = "/var/lib/relay.db".into();
        assert_eq!(resolve_db_path(&settings, home), Path::new("/var/lib/relay.db"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = RelaySettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("RELAY_HOST", "0.0.0.0"),
                ("RELAY_PORT", "0"),
                ("RELAY_USER_ID", "42"),
                ("RELAY_BACKLOG_CHUNK_SIZE", "50"),
                ("RELAY_RESTORE_ON_START", "off"),
                ("RELAY_DB_PATH", "/data/relay.db"),
                ("RELAY_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.session.user_id, 42);
        assert_eq!(settings.session.backlog_chunk_size, 50);
        assert!(!settings.session.restore_on_start);
        assert_eq!(settings.storage.db_path, "/data/relay.db");
        assert_eq!(settings.logging.format, "json");
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let mut settings = RelaySettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("RELAY_HOST", ""),
                ("RELAY_PORT", "99999"),
                ("RELAY_USER_ID", "0"),
                ("RELAY_BACKLOG_CHUNK_SIZE", "many"),
                ("RELAY_HEARTBEAT_INTERVAL", "10"),
                ("RELAY_RESTORE_ON_START", "perhaps"),
            ]),
        );
        let defaults = RelaySettings::default();
        assert_eq!(settings.server.host, defaults.server.host);
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.session.user_id, defaults.session.user_id);
        assert_eq!(settings.session.backlog_chunk_size, defaults.session.backlog_chunk_size);
        assert_eq!(settings.server.heartbeat_interval_ms, defaults.server.heartbeat_interval_ms);
        assert!(settings.session.restore_on_start);
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag("2"), None);
    }

    #[test]
    fn bounded_numbers() {
        assert_eq!(parse_bounded("9400", 0u16..=u16::MAX), Some(9400));
        assert_eq!(parse_bounded::<u16>("70000", 0..=u16::MAX), None);
        assert_eq!(parse_bounded("500", 1_000u64..=600_000), None);
        assert_eq!(parse_bounded("7", 1i64..=i64::MAX), Some(7));
        assert_eq!(parse_bounded::<usize>("-1", 1..=10), None);
    }
}
