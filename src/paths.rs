//! Where smartlist looks for its config file and dataset
//!
//! Each file has its own env override. Otherwise it lives in a `smartlist/`
//! directory under the XDG base for its kind:
//!
//! | File | Override | Base |
//! |------|----------|------|
//! | `config.toml` | `SMARTLIST_CONFIG` | `$XDG_CONFIG_HOME`, else `~/.config` |
//! | `yelp_database.csv` | `SMARTLIST_DATASET` | `$XDG_DATA_HOME`, else `~/.local/share` |
//!
//! Empty variables count as unset.

use std::path::PathBuf;

use tracing::info;

const APP_DIR: &str = "smartlist";

#[derive(Debug, Clone, Copy)]
enum Location {
    Config,
    Dataset,
}

impl Location {
    fn override_var(self) -> &'static str {
        match self {
            Location::Config => "SMARTLIST_CONFIG",
            Location::Dataset => "SMARTLIST_DATASET",
        }
    }

    fn base_var(self) -> &'static str {
        match self {
            Location::Config => "XDG_CONFIG_HOME",
            Location::Dataset => "XDG_DATA_HOME",
        }
    }

    fn home_base(self) -> &'static str {
        match self {
            Location::Config => ".config",
            Location::Dataset => ".local/share",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Location::Config => "config.toml",
            Location::Dataset => "yelp_database.csv",
        }
    }

    /// Resolve using `env` to look up variables.
    fn resolve_with(self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        let var = |name: &str| env(name).filter(|v| !v.is_empty());

        if let Some(path) = var(self.override_var()) {
            return PathBuf::from(path);
        }

        let base = var(self.base_var())
            .map(PathBuf::from)
            .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(self.home_base())))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(APP_DIR).join(self.file_name())
    }

    fn resolve(self) -> PathBuf {
        self.resolve_with(|name| std::env::var(name).ok())
    }
}

pub fn config_path() -> PathBuf {
    Location::Config.resolve()
}

/// Default dataset; `[server] dataset` in the config takes precedence.
pub fn dataset_path() -> PathBuf {
    Location::Dataset.resolve()
}

pub fn log_paths() {
    info!(
        config = %config_path().display(),
        dataset = %dataset_path().display(),
        "resolved paths"
    );
}
