//! Domain values shared by clients and the gateway.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a scan project in the catalog.
///
/// Project ids double as directory names under the projects folder, so the
/// textual form is strictly decimal digits. See [`ProjectId::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(u64);

impl ProjectId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rejected textual project id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectIdError {
    /// No characters at all.
    #[error("project id is empty")]
    Empty,
    /// Something other than ASCII digits.
    #[error("project id must be numeric")]
    NotNumeric,
    /// Digits only, but larger than `u64::MAX`.
    #[error("project id out of range")]
    OutOfRange,
}

impl FromStr for ProjectId {
    type Err = ProjectIdError;

    /// Accepts one or more ASCII digits and nothing else: no sign, no
    /// whitespace, no path separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ProjectIdError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProjectIdError::NotNumeric);
        }
        s.parse::<u64>().map(Self).map_err(|_| ProjectIdError::OutOfRange)
    }
}

/// Project record as stored in the catalog and returned by `getProjects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Catalog key
    pub id: ProjectId,
    /// Free-form metadata (name, creation time, image count, ...)
    pub fields: BTreeMap<String, String>,
}

impl ProjectRecord {
    /// Record with no metadata.
    #[must_use]
    pub fn new(id: ProjectId) -> Self {
        Self { id, fields: BTreeMap::new() }
    }

    /// Builder-style metadata setter.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Logical UI controls backed by a rig effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SliderControl {
    /// Tilt rotor position
    Rotor,
    /// Turntable position
    Turntable,
    /// Camera shutter speed
    Shutter,
    /// Camera brightness
    Brightness,
    /// Camera contrast
    Contrast,
    /// Camera saturation
    Saturation,
    /// Illumination level (0 = off, 1 = line 1, 2 = both lines)
    Light,
    /// Images captured per turntable revision
    ImagesPerRevision,
    /// Rotor stops per scan
    RotorAnglesPerScan,
    /// Rotor angle range covered by a scan (two-handle slider)
    RotorAngleRangeToScan,
}

impl SliderControl {
    /// Every control, in the order initial sync sends them.
    pub const ALL: [Self; 10] = [
        Self::Rotor,
        Self::Turntable,
        Self::Shutter,
        Self::Brightness,
        Self::Contrast,
        Self::Saturation,
        Self::Light,
        Self::ImagesPerRevision,
        Self::RotorAnglesPerScan,
        Self::RotorAngleRangeToScan,
    ];

    /// Name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rotor => "rotor",
            Self::Turntable => "turntable",
            Self::Shutter => "shutter",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Light => "light",
            Self::ImagesPerRevision => "imagesPerRevision",
            Self::RotorAnglesPerScan => "rotorAnglesPerScan",
            Self::RotorAngleRangeToScan => "rotorAngleRangeToScan",
        }
    }

    /// Look up a control by wire name. `None` for unknown names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|control| control.as_str() == name)
    }
}

impl fmt::Display for SliderControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a slider value was produced.
///
/// Only `"slide"` marks a live, uncommitted drag. Every other wire value is a
/// commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InteractionType {
    /// Intermediate drag event
    Slide,
    /// Final value
    Commit,
}

impl From<String> for InteractionType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for InteractionType {
    fn from(value: &str) -> Self {
        if value == "slide" { Self::Slide } else { Self::Commit }
    }
}

impl From<InteractionType> for String {
    fn from(value: InteractionType) -> Self {
        match value {
            InteractionType::Slide => "slide".to_string(),
            InteractionType::Commit => "commit".to_string(),
        }
    }
}

/// Slider value: a single handle or a two-handle range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SliderValue {
    /// Single value
    Single(f64),
    /// Lower and upper bound
    Range([f64; 2]),
}

impl SliderValue {
    /// The value of a single-handle slider. `None` for ranges.
    #[must_use]
    pub fn as_single(self) -> Option<f64> {
        match self {
            Self::Single(value) => Some(value),
            Self::Range(_) => None,
        }
    }

    /// The bounds of a range slider. `None` for single values.
    #[must_use]
    pub fn as_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Single(_) => None,
            Self::Range([low, high]) => Some((low, high)),
        }
    }
}

/// Slider configuration sent on initial sync.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderOptions {
    /// Current value
    pub value: SliderValue,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Increment
    pub step: f64,
}

impl SliderOptions {
    /// Options with a new current value and the same bounds.
    #[must_use]
    pub fn with_value(self, value: SliderValue) -> Self {
        Self { value, ..self }
    }
}

/// Crop rectangle applied to captured images, in image-relative units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropArea {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Default for CropArea {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, width: 1.0, height: 1.0 }
    }
}

/// Opaque descriptor of an open archive transfer, handed to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(String);

impl TransferHandle {
    /// Wrap a descriptor produced by the transfer service.
    #[must_use]
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    /// Descriptor text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_accepts_digits() {
        assert_eq!("42".parse::<ProjectId>(), Ok(ProjectId::new(42)));
        assert_eq!("007".parse::<ProjectId>(), Ok(ProjectId::new(7)));
    }

    #[test]
    fn project_id_rejects_everything_else() {
        assert_eq!("".parse::<ProjectId>(), Err(ProjectIdError::Empty));
        assert_eq!("abc".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!("-1".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!("+1".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!(" 1".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!("1/../2".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!("١٢".parse::<ProjectId>(), Err(ProjectIdError::NotNumeric));
        assert_eq!("99999999999999999999999".parse::<ProjectId>(), Err(ProjectIdError::OutOfRange));
    }

    #[test]
    fn slider_names_resolve() {
        for control in SliderControl::ALL {
            assert_eq!(SliderControl::from_name(control.as_str()), Some(control));
        }
        assert_eq!(SliderControl::from_name("focus"), None);
        assert_eq!(SliderControl::from_name("Rotor"), None);
    }

    #[test]
    fn only_slide_is_uncommitted() {
        assert_eq!(InteractionType::from("slide"), InteractionType::Slide);
        assert_eq!(InteractionType::from("commit"), InteractionType::Commit);
        assert_eq!(InteractionType::from("change"), InteractionType::Commit);
        assert_eq!(InteractionType::from(""), InteractionType::Commit);
    }

    #[test]
    fn slider_value_accessors() {
        assert_eq!(SliderValue::Single(3.0).as_single(), Some(3.0));
        assert_eq!(SliderValue::Single(3.0).as_range(), None);
        assert_eq!(SliderValue::Range([-10.0, 45.0]).as_range(), Some((-10.0, 45.0)));
        assert_eq!(SliderValue::Range([-10.0, 45.0]).as_single(), None);
    }
}
