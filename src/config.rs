use crate::{ActionKind, EbookError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file names searched for, most preferred first.
pub const CONFIG_FILE_NAMES: [&str; 4] = ["efm.toml", "efm.yaml", "efm.yml", "efm.json"];

/// Per-folder settings, read from the closest `efm.toml`, `efm.yaml`,
/// `efm.yml` or `efm.json`.
///
/// ```toml
/// actions = ["drm", "rename"]
/// adobe_key_files = ["~/keys/adobe.der"]
/// dedrm_command = ["python3", "ineptepub.py", "{key}", "{input}", "{output}"]
/// ```
///
/// Unknown keys are ignored so one file can be shared with other tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Actions to run when none are given on the command line.
    pub actions: Option<Vec<ActionKind>>,

    /// Adobe ADEPT key files, tried in order when removing Adobe DRM.
    pub adobe_key_files: Vec<PathBuf>,

    /// Overrides the `k2pdfopt` binary.
    pub k2pdfopt: Option<PathBuf>,

    /// DRM removal command line with `{key}`, `{input}` and `{output}`
    /// placeholders.
    pub dedrm_command: Option<Vec<String>>,
}

impl Config {
    /// Parse the config file at `path`; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let invalid = |message: String| EbookError::Config {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).map_err(|e| invalid(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))?,
            Some("json") => serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?,
            other => return Err(invalid(format!("unknown config file extension {other:?}"))),
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.adobe_key_files = config
            .adobe_key_files
            .iter()
            .map(|key| resolve_path(base, key))
            .collect();
        config.k2pdfopt = config.k2pdfopt.map(|p| expand_home(&p));

        log::debug!("Loaded config {}", path.display());
        Ok(config)
    }

    /// Load the closest config file for a book living in `dir`, or `None`.
    pub fn closest(dir: &Path) -> Result<Option<Self>> {
        closest_config_path(dir).map(|p| Self::load(&p)).transpose()
    }
}

/// Search `dir` and each of its ancestors for a config file.
pub fn closest_config_path(dir: &Path) -> Option<PathBuf> {
    dir.ancestors().find_map(|ancestor| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| ancestor.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
