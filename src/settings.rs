use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SETTINGS_FILE: &str = "settings.json";
const CONFIG_DIR: &str = "simplerpc";

/// The `simplerpc` configuration surface, stored as camelCase JSON so the
/// document matches what the editor plugin holds in its own settings UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    /// Discord application id; connection is refused while this is empty.
    pub application_id: String,
    pub large_image_key: String,
    pub large_image_text: String,
    /// Empty means: fall back to the active file's language identifier.
    pub small_image_key: String,
    pub small_image_text: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            application_id: String::new(),
            large_image_key: "vscode".to_string(),
            large_image_text: "Visual Studio Code".to_string(),
            small_image_key: String::new(),
            small_image_text: String::new(),
        }
    }
}

/// Owns the settings document: an in-memory copy plus its backing file.
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load from `path`, falling back to defaults when the file is missing or
    /// unreadable. A broken settings file must not keep the bridge from
    /// starting.
    pub fn load(path: PathBuf) -> Self {
        let settings = match read_settings(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(err) => {
                tracing::warn!("Failed to load settings, using defaults: {}", err);
                Settings::default()
            }
        };

        tracing::debug!("Settings loaded from {}", path.display());
        Self {
            path,
            current: Mutex::new(settings),
        }
    }

    pub fn current(&self) -> Settings {
        self.current.lock().unwrap().clone()
    }

    /// Replace the whole document and persist it. The in-memory copy is
    /// updated even when the write fails, so the session cycle that follows a
    /// configuration change still sees the new values.
    pub fn replace(&self, settings: Settings) -> Result<(), String> {
        *self.current.lock().unwrap() = settings.clone();
        write_settings(&self.path, &settings)
    }

    /// Apply a mutation and persist the result.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Result<Settings, String> {
        let updated = {
            let mut current = self.current.lock().unwrap();
            mutate(&mut current);
            current.clone()
        };
        write_settings(&self.path, &updated)?;
        Ok(updated)
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>, String> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings file: {}", e))?;

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| format!("Failed to parse settings: {}", e))
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write settings file: {}", e))
}
