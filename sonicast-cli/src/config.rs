//! Load config from file and environment.

use serde::Deserialize;
use sonicast_core::Timing;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CLI configuration. File: ~/.config/sonicast/config.toml or /etc/sonicast/config.toml.
/// Env overrides: SONICAST_SAMPLE_RATE, SONICAST_VERSION, SONICAST_LBR, SONICAST_REPEAT,
/// SONICAST_FORMAT, SONICAST_PLAYER.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Output sample rate in Hz (default 44100).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Protocol version byte (default 2).
    #[serde(default = "default_version")]
    pub version: u8,
    /// Low bit rate mode with pilot tone (default off).
    #[serde(default)]
    pub low_bit_rate: bool,
    /// Plays per transmission (default 3).
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Container: "wav" or "mp3" (default wav).
    #[serde(default = "default_format")]
    pub format: String,
    /// Player command; the container path is appended as last argument (default aplay).
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default)]
    pub player_args: Vec<String>,
    /// MP3 encoder command fed raw PCM on stdin (default lame).
    #[serde(default = "default_mp3_encoder")]
    pub mp3_encoder: String,
    #[serde(default)]
    pub timing: Timing,
}

fn default_sample_rate() -> u32 {
    sonicast_core::session::DEFAULT_SAMPLE_RATE
}
fn default_version() -> u8 {
    sonicast_core::ProtocolVersion::default().wire_byte()
}
fn default_repeat() -> u32 {
    sonicast_core::session::DEFAULT_REPEAT_COUNT
}
fn default_format() -> String {
    "wav".to_string()
}
fn default_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".to_string()
    } else {
        "aplay".to_string()
    }
}
fn default_mp3_encoder() -> String {
    "lame".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            version: default_version(),
            low_bit_rate: false,
            repeat: default_repeat(),
            format: default_format(),
            player: default_player(),
            player_args: Vec::new(),
            mp3_encoder: default_mp3_encoder(),
            timing: Timing::default(),
        }
    }
}

/// Load config: merge default, then config file (explicit path, or first one present),
/// then env vars.
pub fn load(explicit: Option<&Path>) -> Config {
    let file = match explicit {
        Some(p) => load_file(p),
        None => config_paths().iter().find(|p| p.exists()).and_then(|p| load_file(p)),
    };
    let mut c = file.unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

/// Apply SONICAST_* overrides. Unparseable values are ignored.
pub fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(p) = var("SONICAST_SAMPLE_RATE").and_then(|s| s.parse().ok()) {
        c.sample_rate = p;
    }
    if let Some(v) = var("SONICAST_VERSION").and_then(|s| s.parse().ok()) {
        c.version = v;
    }
    if let Some(s) = var("SONICAST_LBR") {
        c.low_bit_rate = matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
    if let Some(n) = var("SONICAST_REPEAT").and_then(|s| s.parse().ok()) {
        c.repeat = n;
    }
    if let Some(f) = var("SONICAST_FORMAT") {
        c.format = f;
    }
    if let Some(p) = var("SONICAST_PLAYER") {
        c.player = p;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/sonicast/config.toml"));
    }
    out.push(PathBuf::from("/etc/sonicast/config.toml"));
    out
}

fn load_file(p: &Path) -> Option<Config> {
    let s = match std::fs::read_to_string(p) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %p.display(), error = %e, "cannot read config file");
            return None;
        }
    };
    match toml::from_str::<Config>(&s) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(path = %p.display(), error = %e, "ignoring invalid config file");
            None
        }
    }
}
