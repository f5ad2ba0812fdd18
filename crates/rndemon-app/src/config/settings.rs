//! Settings parser for .rndemon/config.toml

use super::types::Settings;
use rndemon_core::prelude::*;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const RNDEMON_DIR: &str = ".rndemon";

/// Load settings from `<project>/.rndemon/config.toml`.
///
/// A missing, unreadable, unparsable or invalid file yields the defaults.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(RNDEMON_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    let settings: Settings = match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                return Settings::default();
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            return Settings::default();
        }
    };

    match settings.validate() {
        Ok(()) => {
            debug!("Loaded settings from {:?}", config_path);
            settings
        }
        Err(e) => {
            warn!("Ignoring {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create a commented default config in `.rndemon/`, leaving an existing
/// file untouched
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let config_dir = project_path.join(RNDEMON_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::config(format!("Failed to create .rndemon dir: {}", e)))?;
    }

    let config_path = config_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# RN Demon Configuration

[packager]
program = "react-native"  # Resolved through PATH
args = ["start"]          # Placed before the user's start arguments
marker = "app.json"       # File (glob) marking the project root
search_depth = 10
stop_timeout_ms = 5000    # Wait this long for a killed packager to exit
line_break = "\n"

[output]
strip_ansi = true
show_stderr = false
# Extra lines to hide. Prefix with exact:, prefix: or regex: (bare = prefix)
extra_denylist = []

[devtools]
browser = ""              # Empty = system default
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(RNDEMON_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILENAME), content).unwrap();
    }

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());

        assert_eq!(settings.packager.program, "react-native");
        assert_eq!(settings.packager.stop_timeout_ms, 5000);
        assert!(settings.output.strip_ansi);
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        write_config(
            temp.path(),
            r#"
[packager]
program = "npx"
args = ["react-native", "start", "--port", "8082"]

[output]
show_stderr = true
extra_denylist = ["regex:^warn "]

[devtools]
browser = "firefox"
"#,
        );

        let settings = load_settings(temp.path());

        assert_eq!(settings.packager.program, "npx");
        assert_eq!(settings.packager.args.len(), 4);
        assert!(settings.output.show_stderr);
        assert_eq!(settings.output.extra_denylist, vec!["regex:^warn "]);
        assert_eq!(settings.devtools.browser, "firefox");
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        write_config(temp.path(), "not valid toml {{{{");

        let settings = load_settings(temp.path());
        assert_eq!(settings.packager.program, "react-native");
    }

    #[test]
    fn test_load_settings_invalid_values() {
        let temp = tempdir().unwrap();
        write_config(temp.path(), "[packager]\nprogram = \"npx\"\nstop_timeout_ms = 0\n");

        let settings = load_settings(temp.path());
        assert_eq!(settings.packager.program, "react-native");
        assert_eq!(settings.packager.stop_timeout_ms, 5000);
    }

    #[test]
    fn test_init_config_dir() {
        let temp = tempdir().unwrap();

        init_config_dir(temp.path()).unwrap();

        let config_path = temp.path().join(".rndemon/config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(config_path).unwrap();
        let settings: Settings = toml::from_str(&content).expect("Default config should be valid TOML");
        assert!(settings.validate().is_ok());
        assert_eq!(settings.packager.line_break, "\n");
    }

    #[test]
    fn test_init_config_dir_idempotent() {
        let temp = tempdir().unwrap();
        init_config_dir(temp.path()).unwrap();

        let config_path = temp.path().join(".rndemon/config.toml");
        std::fs::write(&config_path, "[packager]\nprogram = \"npx\"\n").unwrap();

        init_config_dir(temp.path()).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("npx"));
    }
}
