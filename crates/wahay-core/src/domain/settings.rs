//! Application preferences persisted inside the encrypted configuration file.
//!
//! The settings are serialized to TOML before encryption, so the plaintext of
//! a decrypted file looks like:
//!
//! ```toml
//! unique_configuration_id = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! as_super_user = true
//! auto_join = true
//! logs_enabled = false
//! raw_log_file = "/home/alice/.local/state/wahay/wahay.log"
//! path_tor = ""
//! path_torsocks = ""
//! path_mumble = ""
//! port_mumble = ""
//! certificate_path = ""
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the decrypted TOML.  A file
//! written by an older release that lacks newer fields therefore still loads.
//!
//! # Zero values versus baseline values
//!
//! [`ApplicationSettings::default`] yields zero values (all `false`, all
//! empty).  A freshly constructed store holds those until the caller asks for
//! the baseline with [`ApplicationSettings::apply_defaults`].  Keeping the two
//! apart lets a caller tell "never configured" from "configured with the
//! recommended values".

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the raw log written when logging is enabled.
pub const RAW_LOG_FILE_NAME: &str = "wahay.log";

/// Preferences for the desktop client, persisted encrypted at rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationSettings {
    /// 64-character lowercase hex identifier, generated once before the first save.
    #[serde(default)]
    pub unique_configuration_id: String,
    /// Whether helper processes may be started with elevated privileges.
    #[serde(default = "default_true")]
    pub as_super_user: bool,
    /// Join the hosted meeting automatically after it starts.
    #[serde(default = "default_true")]
    pub auto_join: bool,
    /// Whether the raw log file is written.
    #[serde(default)]
    pub logs_enabled: bool,
    /// Location of the raw log file.
    #[serde(default = "default_raw_log_file")]
    pub raw_log_file: String,
    /// Custom path to the anonymity-network daemon binary.  Empty means "search PATH".
    #[serde(default)]
    pub path_tor: String,
    /// Custom path to the `torsocks` wrapper.
    #[serde(default)]
    pub path_torsocks: String,
    /// Custom path to the voice client binary.
    #[serde(default)]
    pub path_mumble: String,
    /// Port used by the embedded voice server.  Empty means "pick a random free port".
    #[serde(default)]
    pub port_mumble: String,
    /// Directory holding the generated voice server certificate.
    #[serde(default)]
    pub certificate_path: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_raw_log_file() -> String {
    platform_log_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(RAW_LOG_FILE_NAME)
        .to_string_lossy()
        .into_owned()
}

/// Per-user log directory, `None` when the environment does not name one.
fn platform_log_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        non_empty_var("LOCALAPPDATA").map(|p| p.join("Wahay").join("logs"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = non_empty_var("XDG_STATE_HOME")
            .or_else(|| non_empty_var("HOME").map(|h| h.join(".local").join("state")))?;
        Some(base.join("wahay"))
    }

    #[cfg(target_os = "macos")]
    {
        non_empty_var("HOME").map(|h| h.join("Library").join("Logs").join("Wahay"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
fn non_empty_var(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl ApplicationSettings {
    /// Returns the recommended baseline settings.
    pub fn baseline() -> Self {
        Self {
            unique_configuration_id: String::new(),
            as_super_user: default_true(),
            auto_join: default_true(),
            logs_enabled: false,
            raw_log_file: default_raw_log_file(),
            path_tor: String::new(),
            path_torsocks: String::new(),
            path_mumble: String::new(),
            port_mumble: String::new(),
            certificate_path: String::new(),
        }
    }

    /// Overwrites every preference with its baseline value.
    ///
    /// The unique configuration identifier is kept: once assigned it never
    /// changes for the lifetime of the installation.
    pub fn apply_defaults(&mut self) {
        let id = std::mem::take(&mut self.unique_configuration_id);
        *self = Self::baseline();
        self.unique_configuration_id = id;
    }

    /// Serializes the settings to the TOML plaintext stored inside the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`toml::ser::Error`] if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parses settings from decrypted TOML plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] if the text is not valid settings TOML.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
