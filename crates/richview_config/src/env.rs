use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;

use crate::{HtmlPreviewMode, RichviewConfig};

/// Resolves the configuration: defaults, then the JSON file named by
/// `RICHVIEW_CONFIG`, then `RICHVIEW_*` variables (including those loaded from
/// `.env` files between the filesystem root and `cwd`).
pub fn load_config(cwd: &Path) -> anyhow::Result<RichviewConfig> {
    dot_env(cwd);

    let mut config = match std::env::var_os("RICHVIEW_CONFIG") {
        Some(path) => read_config_file(&PathBuf::from(path))?,
        None => RichviewConfig::default(),
    };
    apply_env_overrides(&mut config);
    config.validate()?;

    tracing::debug!(?config, "Configuration resolved");
    Ok(config)
}

fn read_config_file(path: &Path) -> anyhow::Result<RichviewConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Loads every `.env` file from `cwd` up to the root. Variables already set
/// win, so the closest file takes priority.
fn dot_env(cwd: &Path) {
    for dir in cwd.ancestors() {
        let env_file = dir.join(".env");
        if env_file.is_file() {
            dotenvy::from_path(&env_file).ok();
        }
    }
}

fn apply_env_overrides(config: &mut RichviewConfig) {
    let thresholds = [
        ("RICHVIEW_THRESHOLD_CODE", &mut config.thresholds.code),
        ("RICHVIEW_THRESHOLD_JSON", &mut config.thresholds.json),
        ("RICHVIEW_THRESHOLD_XML", &mut config.thresholds.xml),
        ("RICHVIEW_THRESHOLD_HTML", &mut config.thresholds.html),
        ("RICHVIEW_THRESHOLD_MARKDOWN", &mut config.thresholds.markdown),
    ];
    for (name, threshold) in thresholds {
        if let Some(value) = env_value(name) {
            *threshold = value;
        }
    }

    let switches = [
        ("RICHVIEW_CHARTS", &mut config.chart.enabled),
        ("RICHVIEW_EXTRACT_TABLES", &mut config.extract_tables),
        ("RICHVIEW_EXTRACT_CHARTS", &mut config.extract_charts),
    ];
    for (name, switch) in switches {
        if let Some(value) = env_switch(name) {
            *switch = value;
        }
    }

    if let Some(value) = env_value("RICHVIEW_CHART_POLL_MS") {
        config.chart.poll_interval_ms = value;
    }
    if let Some(value) = env_value::<HtmlPreviewMode>("RICHVIEW_HTML_PREVIEW") {
        config.html_preview = value;
    }
    if let Some(value) = env_value("RICHVIEW_MAX_NEWLINES") {
        config.max_consecutive_newlines = value;
    }
}

/// Parsed value of `name`. Values that do not parse are logged and ignored.
fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(variable = name, value = %raw, "Ignoring unparsable setting");
    }
    parsed
}

/// `true`, `1`, `yes` and `on` enable a switch, anything else disables it.
fn env_switch(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    Some(matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;

    const VARS: &[&str] = &[
        "RICHVIEW_CONFIG",
        "RICHVIEW_THRESHOLD_MARKDOWN",
        "RICHVIEW_THRESHOLD_HTML",
        "RICHVIEW_CHART_POLL_MS",
        "RICHVIEW_HTML_PREVIEW",
        "RICHVIEW_CHARTS",
        "RICHVIEW_EXTRACT_TABLES",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let dir = tempdir().unwrap();
        let actual = load_config(dir.path()).unwrap();
        assert_eq!(actual, RichviewConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("RICHVIEW_THRESHOLD_MARKDOWN", "0.35");
            std::env::set_var("RICHVIEW_HTML_PREVIEW", "offscreen");
            std::env::set_var("RICHVIEW_CHARTS", "no");
        }
        let dir = tempdir().unwrap();
        let actual = load_config(dir.path()).unwrap();
        clear_env();

        assert_eq!(actual.thresholds.markdown, 0.35);
        assert_eq!(actual.html_preview, HtmlPreviewMode::OffscreenCanvas);
        assert!(!actual.chart.enabled);
    }

    #[test]
    #[serial]
    fn test_config_file_then_env() {
        clear_env();
        let dir = tempdir().unwrap();
        let path = dir.path().join("richview.json");
        fs::write(&path, r#"{"thresholds":{"html":0.55},"chart":{"pollIntervalMs":20}}"#).unwrap();
        unsafe {
            std::env::set_var("RICHVIEW_CONFIG", &path);
            std::env::set_var("RICHVIEW_CHART_POLL_MS", "10");
        }
        let actual = load_config(dir.path()).unwrap();
        clear_env();

        assert_eq!(actual.thresholds.html, 0.55);
        assert_eq!(actual.chart.poll_interval_ms, 10);
    }

    #[test]
    #[serial]
    fn test_invalid_threshold_from_env_fails() {
        clear_env();
        unsafe { std::env::set_var("RICHVIEW_THRESHOLD_HTML", "2.0") };
        let dir = tempdir().unwrap();
        let actual = load_config(dir.path());
        clear_env();

        assert!(actual.is_err());
    }

    #[test]
    #[serial]
    fn test_unparsable_values_keep_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("RICHVIEW_CHART_POLL_MS", "soon");
            std::env::set_var("RICHVIEW_THRESHOLD_MARKDOWN", " 0.45 ");
            std::env::set_var("RICHVIEW_EXTRACT_TABLES", "Off");
        }
        let dir = tempdir().unwrap();
        let actual = load_config(dir.path()).unwrap();
        clear_env();

        assert_eq!(actual.chart.poll_interval_ms, 50);
        assert_eq!(actual.thresholds.markdown, 0.45);
        assert!(!actual.extract_tables);
    }

    #[test]
    #[serial]
    fn test_dot_env_is_loaded() {
        clear_env();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "RICHVIEW_CHART_POLL_MS=75\n").unwrap();
        let actual = load_config(dir.path()).unwrap();
        clear_env();

        assert_eq!(actual.chart.poll_interval_ms, 75);
    }
}
