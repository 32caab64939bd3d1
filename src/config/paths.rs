// SPDX-License-Identifier: MPL-2.0
//! Application directory resolution.
//!
//! Each directory is looked up in this order, first hit wins:
//! 1. an explicit override passed to a `_with_override()` function
//! 2. `--data-dir` / `--config-dir`, recorded by [`init_cli_overrides`]
//! 3. `LENS_REFINE_DATA_DIR` / `LENS_REFINE_CONFIG_DIR` (ignored when empty)
//! 4. the platform directory from `dirs`, plus `LensRefine/`
//!
//! Model files go to `<data dir>/models/`.

use std::path::PathBuf;
use std::sync::OnceLock;

const APP_NAME: &str = "LensRefine";
const MODELS_DIR: &str = "models";

/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "LENS_REFINE_DATA_DIR";

/// Environment variable naming the config directory.
pub const ENV_CONFIG_DIR: &str = "LENS_REFINE_CONFIG_DIR";

/// Directories given on the command line, set once at startup.
#[derive(Debug, Default)]
struct CliDirs {
    data: Option<PathBuf>,
    config: Option<PathBuf>,
}

static CLI_DIRS: OnceLock<CliDirs> = OnceLock::new();

#[derive(Debug, Clone, Copy)]
enum AppDir {
    Data,
    Config,
}

impl AppDir {
    fn env_var(self) -> &'static str {
        match self {
            AppDir::Data => ENV_DATA_DIR,
            AppDir::Config => ENV_CONFIG_DIR,
        }
    }

    fn cli_value(self) -> Option<PathBuf> {
        let dirs = CLI_DIRS.get()?;
        match self {
            AppDir::Data => dirs.data.clone(),
            AppDir::Config => dirs.config.clone(),
        }
    }

    fn env_value(self) -> Option<PathBuf> {
        std::env::var_os(self.env_var())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    fn platform_value(self) -> Option<PathBuf> {
        let base = match self {
            AppDir::Data => dirs::data_dir(),
            AppDir::Config => dirs::config_dir(),
        };
        base.map(|dir| dir.join(APP_NAME))
    }

    fn resolve(self, override_path: Option<PathBuf>) -> Option<PathBuf> {
        override_path
            .or_else(|| self.cli_value())
            .or_else(|| self.env_value())
            .or_else(|| self.platform_value())
    }
}

/// Records the `--data-dir` and `--config-dir` arguments.
///
/// Only the first call has an effect; later calls are logged and ignored.
pub fn init_cli_overrides(data_dir: Option<PathBuf>, config_dir: Option<PathBuf>) {
    let dirs = CliDirs {
        data: data_dir,
        config: config_dir,
    };
    if CLI_DIRS.set(dirs).is_err() {
        tracing::warn!("CLI directory overrides already initialized; ignoring");
    }
}

/// Data directory (holds downloaded models).
///
/// Platform defaults:
/// - Linux: `~/.local/share/LensRefine/`
/// - macOS: `~/Library/Application Support/LensRefine/`
/// - Windows: `C:\Users\<User>\AppData\Roaming\LensRefine\`
pub fn get_app_data_dir() -> Option<PathBuf> {
    AppDir::Data.resolve(None)
}

/// Data directory, preferring `override_path` when given.
pub fn get_app_data_dir_with_override(override_path: Option<PathBuf>) -> Option<PathBuf> {
    AppDir::Data.resolve(override_path)
}

/// Config directory (holds `settings.toml`).
pub fn get_app_config_dir() -> Option<PathBuf> {
    AppDir::Config.resolve(None)
}

/// Config directory, preferring `override_path` when given.
pub fn get_app_config_dir_with_override(override_path: Option<PathBuf>) -> Option<PathBuf> {
    AppDir::Config.resolve(override_path)
}

/// Directory holding model files. Relative `models/` when no data
/// directory can be determined.
pub fn get_models_dir_with_override(override_data_dir: Option<PathBuf>) -> PathBuf {
    get_app_data_dir_with_override(override_data_dir)
        .map_or_else(|| PathBuf::from(MODELS_DIR), |dir| dir.join(MODELS_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests touching process environment run one at a time
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn platform_dirs_end_with_app_name() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var(ENV_DATA_DIR);
        std::env::remove_var(ENV_CONFIG_DIR);

        for path in [get_app_data_dir(), get_app_config_dir()].into_iter().flatten() {
            assert!(path.ends_with(APP_NAME), "{}", path.display());
        }
    }

    #[test]
    fn explicit_override_wins_over_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_DATA_DIR, "/from/env");

        let chosen = get_app_data_dir_with_override(Some(PathBuf::from("/explicit")));
        assert_eq!(chosen, Some(PathBuf::from("/explicit")));

        std::env::remove_var(ENV_DATA_DIR);
    }

    #[test]
    fn environment_is_used_verbatim() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_CONFIG_DIR, "/portable/config");

        assert_eq!(get_app_config_dir(), Some(PathBuf::from("/portable/config")));

        std::env::remove_var(ENV_CONFIG_DIR);
    }

    #[test]
    fn empty_environment_value_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_DATA_DIR, "");

        assert_ne!(get_app_data_dir(), Some(PathBuf::new()));

        std::env::remove_var(ENV_DATA_DIR);
    }

    #[test]
    fn models_live_under_the_data_dir() {
        let models = get_models_dir_with_override(Some(PathBuf::from("/data")));
        assert_eq!(models, PathBuf::from("/data/models"));
    }
}
