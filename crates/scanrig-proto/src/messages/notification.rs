//! Server to client notifications.

use serde::{Deserialize, Serialize};

use crate::{CropArea, SliderControl, SliderOptions, SliderValue};

/// State-change notification, unicast during initial sync or broadcast to
/// every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    /// Full configuration of one slider.
    InitSlider {
        /// Control being described
        control: SliderControl,
        /// Bounds and current value
        options: SliderOptions,
    },
    /// A slider's displayed value changed.
    SetSliderValue {
        /// Control name exactly as received (may be unknown to the gateway)
        name: String,
        /// Value to display
        value: SliderValue,
    },
    /// Informational key/value for the status area.
    Info {
        /// Field being updated (e.g. `info-version`, `currentAction`)
        key: String,
        /// Display text
        value: String,
    },
    /// Crop rectangle changed.
    ImgArea {
        /// Current rectangle
        rect: CropArea,
    },
    /// Rotor direction changed.
    Invert {
        /// Whether rotor motion is inverted
        flag: bool,
    },
    /// A scan session is running; interactive controls are read-only.
    DisableControls,
    /// A new preview frame is available.
    UpdateCameraPreview {
        /// Frame reference (file name or URL)
        frame: String,
    },
}

impl Notification {
    /// Info notification.
    #[must_use]
    pub fn info(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Info { key: key.into(), value: value.into() }
    }

    /// Slider value update for a known control.
    #[must_use]
    pub fn slider_value(control: SliderControl, value: SliderValue) -> Self {
        Self::SetSliderValue { name: control.as_str().to_string(), value }
    }
}
