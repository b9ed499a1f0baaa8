use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use super::{ConfigError, ConfigStore, RigSettings};

/// JSON settings file.
///
/// Loaded once on open, rewritten in full on every update. Writes go to a
/// sibling temp file that is then renamed over the original, so a crash never
/// leaves a half-written file behind. The in-memory settings are the live
/// value: an update that fails to reach disk still takes effect, and the next
/// successful write carries it.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: Arc<PathBuf>,
    settings: Arc<Mutex<RigSettings>>,
}

impl FileConfig {
    /// Open the settings file at `path`, using defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file exists but cannot be read, and
    /// `ConfigError::Serialization` if it is not valid settings JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        let settings = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ConfigError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => RigSettings::default(),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };

        Ok(Self { path: Arc::new(path), settings: Arc::new(Mutex::new(settings)) })
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, settings: &RigSettings) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ConfigError::Io(e.to_string()))?;
        fs::rename(&tmp, &*self.path).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

impl ConfigStore for FileConfig {
    fn snapshot(&self) -> RigSettings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update<F>(&self, change: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut RigSettings),
    {
        let mut current = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut current);
        self.persist(&current)
    }
}
