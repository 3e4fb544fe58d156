use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Values read from the YAML config file. Every field is optional; the CLI
/// overrides whatever is set here.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    #[serde(alias = "ext")]
    pub extensions: Option<String>,
    pub force_extensions: Option<bool>,
    pub lowercase: Option<bool>,
    pub prefixes: Option<String>,
    pub suffixes: Option<String>,
    pub threads: Option<usize>,
    pub max_retries: Option<u32>,
    pub timeout: Option<f64>,
    pub delay: Option<f64>,
    pub rate: Option<u32>,
    pub method: Option<String>,
    pub user_agent: Option<String>,
    pub headers: Option<Vec<String>>,
    pub proxy: Option<String>,
    pub follow_redirects: Option<bool>,
    pub exclude_server_errors: Option<bool>,
    pub exclude_status: Option<String>,
    pub blacklist_dir: Option<String>,
    pub ip: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub max_time: Option<u64>,
    pub no_color: Option<bool>,
    pub no_progress: Option<bool>,
    pub quiet: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".dirsweep").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> &'static str {
    r#"# dirsweep config
#
# Location (default):
#   ~/.dirsweep/config.yml

# Target
# url: https://example.com/app/
# ip: 10.0.0.7

# Dictionary
# wordlist: ./wordlists/common.txt
# extensions: php,asp,aspx
force_extensions: false
lowercase: false
# prefixes: ".,_"
# suffixes: "~,.bak"

# Performance
threads: 10
max_retries: 3
timeout: 30
delay: 0
# rate: 100
# max_time: 600

# HTTP
method: GET
# user_agent: "Mozilla/5.0"
# headers:
#   - "Cookie: session=abc"
# proxy: http://127.0.0.1:8080
follow_redirects: false

# Reporting
exclude_server_errors: false
# exclude_status: "400,429"
# blacklist_dir: ./db
# output: ./report.json
# output_format: json

# Output styling
no_color: false
no_progress: false
quiet: false
"#
}

pub fn ensure_default_config_file(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))
}
