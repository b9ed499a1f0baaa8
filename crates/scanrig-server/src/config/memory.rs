use std::sync::{Arc, Mutex, PoisonError};

use super::{ConfigError, ConfigStore, RigSettings};

/// In-memory configuration for tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    settings: Arc<Mutex<RigSettings>>,
}

impl MemoryConfig {
    /// Create a store holding `settings`.
    pub fn new(settings: RigSettings) -> Self {
        Self { settings: Arc::new(Mutex::new(settings)) }
    }
}

impl ConfigStore for MemoryConfig {
    fn snapshot(&self) -> RigSettings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update<F>(&self, change: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut RigSettings),
    {
        change(&mut self.settings.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use scanrig_proto::CropArea;

    use super::*;

    #[test]
    fn clones_share_settings() {
        let config = MemoryConfig::default();
        let other = config.clone();

        let rect = CropArea { x: 0.1, y: 0.2, width: 0.5, height: 0.5 };
        config.set_crop_area(rect).unwrap();

        assert_eq!(other.crop_area(), rect);
    }

    #[test]
    fn last_write_wins() {
        let config = MemoryConfig::default();
        config.set_rotor_invert(true).unwrap();
        config.set_rotor_invert(false).unwrap();

        assert!(!config.rotor_invert());
    }
}
