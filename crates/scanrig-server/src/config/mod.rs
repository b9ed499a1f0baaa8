//! Rig configuration store.
//!
//! Process-wide settings shared by every connection: crop area, rotor
//! direction, the configured value and bounds of every slider, and a few
//! fixed facts (software version, projects folder). Writes are last-write-wins;
//! whoever updates last is what the next broadcast reflects.
//!
//! The trait is synchronous like the catalog. Implementations share state via
//! Arc, so clones observe the same settings.

mod file;
mod memory;

use std::{collections::BTreeMap, path::PathBuf};

pub use file::FileConfig;
pub use memory::MemoryConfig;
use scanrig_proto::{CropArea, ProjectId, SliderControl, SliderOptions, SliderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration persistence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Settings file could not be read or written
    #[error("config I/O error: {0}")]
    Io(String),

    /// Settings file is not valid JSON for [`RigSettings`]
    #[error("config serialization error: {0}")]
    Serialization(String),
}

/// Everything the gateway persists about the rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RigSettings {
    /// Software version reported to clients
    pub version: String,
    /// Directory holding one subdirectory per project
    pub projects_folder: PathBuf,
    /// Image crop rectangle
    pub crop: CropArea,
    /// Rotor direction is reversed
    pub rotor_invert: bool,
    /// Per-slider bounds and configured value
    pub sliders: BTreeMap<SliderControl, SliderOptions>,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            projects_folder: PathBuf::from("projects"),
            crop: CropArea::default(),
            rotor_invert: false,
            sliders: SliderControl::ALL
                .into_iter()
                .map(|control| (control, default_slider(control)))
                .collect(),
        }
    }
}

impl RigSettings {
    /// Options for `control`, falling back to its defaults if the settings
    /// file predates the control.
    pub fn slider(&self, control: SliderControl) -> SliderOptions {
        self.sliders.get(&control).copied().unwrap_or_else(|| default_slider(control))
    }

    /// Store a new value for `control`, keeping its bounds.
    pub fn set_slider_value(&mut self, control: SliderControl, value: SliderValue) {
        let options = self.slider(control).with_value(value);
        self.sliders.insert(control, options);
    }

    /// Directory of one project.
    pub fn project_dir(&self, project: ProjectId) -> PathBuf {
        self.projects_folder.join(project.to_string())
    }

    /// Scan parameters as currently configured.
    pub fn scan_plan(&self) -> ScanPlan {
        let single = |control: SliderControl| {
            let options = self.slider(control);
            options.value.as_single().unwrap_or(options.min)
        };

        let range = self.slider(SliderControl::RotorAngleRangeToScan);
        let rotor_range = range.value.as_range().unwrap_or((range.min, range.max));

        ScanPlan {
            images_per_revision: count(single(SliderControl::ImagesPerRevision)),
            rotor_angles_per_scan: count(single(SliderControl::RotorAnglesPerScan)),
            rotor_range,
            crop: self.crop,
            projects_folder: self.projects_folder.clone(),
        }
    }
}

/// Parameters a scan run is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    /// Images per turntable revision, at least 1
    pub images_per_revision: u32,
    /// Rotor stops, at least 1
    pub rotor_angles_per_scan: u32,
    /// Lowest and highest rotor angle
    pub rotor_range: (f64, f64),
    /// Crop rectangle
    pub crop: CropArea,
    /// Where the project directory is created
    pub projects_folder: PathBuf,
}

impl ScanPlan {
    /// Number of images the run captures.
    pub fn total_images(&self) -> u64 {
        u64::from(self.images_per_revision) * u64::from(self.rotor_angles_per_scan)
    }

    /// Rotor angle for stop `index` (0-based), spread evenly over the range.
    pub fn rotor_angle(&self, index: u32) -> f64 {
        let (low, high) = self.rotor_range;
        if self.rotor_angles_per_scan <= 1 {
            return low;
        }
        low + (high - low) * f64::from(index) / f64::from(self.rotor_angles_per_scan - 1)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Factory bounds and value of a slider.
pub fn default_slider(control: SliderControl) -> SliderOptions {
    let (value, min, max, step) = match control {
        SliderControl::Rotor => (SliderValue::Single(0.0), -90.0, 90.0, 1.0),
        SliderControl::Turntable => (SliderValue::Single(0.0), 0.0, 360.0, 1.0),
        SliderControl::Shutter => (SliderValue::Single(10_000.0), 100.0, 100_000.0, 100.0),
        SliderControl::Brightness => (SliderValue::Single(50.0), 0.0, 100.0, 1.0),
        SliderControl::Contrast | SliderControl::Saturation => {
            (SliderValue::Single(0.0), -100.0, 100.0, 1.0)
        },
        SliderControl::Light => (SliderValue::Single(0.0), 0.0, 2.0, 1.0),
        SliderControl::ImagesPerRevision => (SliderValue::Single(30.0), 4.0, 120.0, 1.0),
        SliderControl::RotorAnglesPerScan => (SliderValue::Single(3.0), 1.0, 10.0, 1.0),
        SliderControl::RotorAngleRangeToScan => {
            (SliderValue::Range([-30.0, 60.0]), -90.0, 90.0, 1.0)
        },
    };

    SliderOptions { value, min, max, step }
}

/// Shared, persisted rig settings.
///
/// Must be Clone (the driver and the scan engine both hold one), Send + Sync
/// and synchronous.
pub trait ConfigStore: Clone + Send + Sync + 'static {
    /// Copy of the current settings.
    fn snapshot(&self) -> RigSettings;

    /// Apply `change` and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the result could not be persisted. The change
    /// is applied to the live settings either way, so readers never see a
    /// value older than the last broadcast.
    fn update<F>(&self, change: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut RigSettings);

    /// Options for one slider.
    fn slider(&self, control: SliderControl) -> SliderOptions {
        self.snapshot().slider(control)
    }

    /// Persist a slider's configured value.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::update`].
    fn set_slider_value(
        &self,
        control: SliderControl,
        value: SliderValue,
    ) -> Result<(), ConfigError> {
        self.update(|settings| settings.set_slider_value(control, value))
    }

    /// Current crop rectangle.
    fn crop_area(&self) -> CropArea {
        self.snapshot().crop
    }

    /// Persist the crop rectangle.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::update`].
    fn set_crop_area(&self, rect: CropArea) -> Result<(), ConfigError> {
        self.update(|settings| settings.crop = rect)
    }

    /// Whether rotor motion is inverted.
    fn rotor_invert(&self) -> bool {
        self.snapshot().rotor_invert
    }

    /// Persist the rotor direction.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::update`].
    fn set_rotor_invert(&self, invert: bool) -> Result<(), ConfigError> {
        self.update(|settings| settings.rotor_invert = invert)
    }

    /// Software version string.
    fn version(&self) -> String {
        self.snapshot().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_control() {
        let settings = RigSettings::default();
        for control in SliderControl::ALL {
            assert!(settings.sliders.contains_key(&control), "missing {control}");
        }
    }

    #[test]
    fn range_control_defaults_to_a_range() {
        let options = default_slider(SliderControl::RotorAngleRangeToScan);
        assert_eq!(options.value.as_range(), Some((-30.0, 60.0)));
    }

    #[test]
    fn set_slider_value_keeps_bounds() {
        let mut settings = RigSettings::default();
        settings.set_slider_value(SliderControl::Rotor, SliderValue::Single(45.0));

        let rotor = settings.slider(SliderControl::Rotor);
        assert_eq!(rotor.value, SliderValue::Single(45.0));
        assert_eq!((rotor.min, rotor.max), (-90.0, 90.0));
    }

    #[test]
    fn scan_plan_reads_slider_values() {
        let mut settings = RigSettings::default();
        settings.set_slider_value(SliderControl::ImagesPerRevision, SliderValue::Single(12.0));
        settings.set_slider_value(SliderControl::RotorAnglesPerScan, SliderValue::Single(2.0));
        settings
            .set_slider_value(SliderControl::RotorAngleRangeToScan, SliderValue::Range([0.0, 40.0]));

        let plan = settings.scan_plan();
        assert_eq!(plan.images_per_revision, 12);
        assert_eq!(plan.rotor_angles_per_scan, 2);
        assert_eq!(plan.total_images(), 24);
        assert_eq!(plan.rotor_angle(0), 0.0);
        assert_eq!(plan.rotor_angle(1), 40.0);
    }

    #[test]
    fn scan_plan_counts_are_at_least_one() {
        let mut settings = RigSettings::default();
        settings.set_slider_value(SliderControl::ImagesPerRevision, SliderValue::Single(-3.0));

        assert_eq!(settings.scan_plan().images_per_revision, 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: RigSettings = serde_json::from_str(r#"{"rotorInvert": true}"#).unwrap();

        assert!(settings.rotor_invert);
        assert_eq!(settings.crop, CropArea::default());
        assert_eq!(settings.sliders.len(), SliderControl::ALL.len());
    }
}
