//! Slider action dispatcher.
//!
//! Maps a slider control and interaction to the effect it has on the rig.
//! Pure lookup: the driver turns effects into device actions and config
//! writes.
//!
//! | control                                  | slide       | commit          |
//! |------------------------------------------|-------------|-----------------|
//! | rotor, turntable                         | nothing     | move to target  |
//! | shutter, brightness, contrast, saturation | camera      | camera          |
//! | light                                    | output lines | output lines   |
//! | imagesPerRevision, rotorAnglesPerScan, rotorAngleRangeToScan | nothing | persist |
//!
//! Actuator moves and configuration writes are expensive or disruptive, so
//! they wait for the commit. Camera and light changes are cheap and give live
//! feedback while dragging.

use scanrig_proto::{InteractionType, SliderControl, SliderValue};
use thiserror::Error;

use crate::devices::{ActuatorAxis, CameraParam};

/// Value did not have the shape its control expects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliderError {
    /// Single-handle control received a range (or the other way around).
    #[error("slider {control} does not accept value {value:?}")]
    ValueShape {
        /// Control that rejected the value
        control: SliderControl,
        /// Value as received
        value: SliderValue,
    },
}

/// Illumination state derived from the tri-state light slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLevel {
    /// Both lines low
    Off,
    /// Line 1 high, line 2 low
    Single,
    /// Both lines high
    Dual,
}

impl LightLevel {
    /// Level for a slider value: 1 is line 1, 2 is both lines, anything else
    /// is off.
    pub fn from_value(value: f64) -> Self {
        if value == 1.0 {
            Self::Single
        } else if value == 2.0 {
            Self::Dual
        } else {
            Self::Off
        }
    }

    /// Output line states `(line1, line2)`.
    pub fn lines(self) -> (bool, bool) {
        match self {
            Self::Off => (false, false),
            Self::Single => (true, false),
            Self::Dual => (true, true),
        }
    }
}

/// Effect of one slider interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SliderEffect {
    /// Move an actuator to an absolute position.
    MoveActuator {
        /// Actuator to move
        axis: ActuatorAxis,
        /// Target position
        target: f64,
    },
    /// Apply a camera parameter.
    SetCamera {
        /// Parameter to set
        param: CameraParam,
        /// New value
        value: f64,
    },
    /// Drive the light output lines and remember the level.
    SetLights {
        /// Derived output state
        level: LightLevel,
        /// Raw slider value to persist
        value: SliderValue,
    },
    /// Persist the value as the control's configured value.
    Persist {
        /// Control being configured
        control: SliderControl,
        /// Value to store
        value: SliderValue,
    },
}

/// Resolve the effect of a slider interaction.
///
/// Returns `Ok(None)` when the interaction is deliberately deferred (a live
/// drag of a commit-only control).
pub fn dispatch(
    control: SliderControl,
    interaction: InteractionType,
    value: SliderValue,
) -> Result<Option<SliderEffect>, SliderError> {
    let committed = interaction == InteractionType::Commit;
    let single = || value.as_single().ok_or(SliderError::ValueShape { control, value });

    let effect = match control {
        SliderControl::Rotor | SliderControl::Turntable if !committed => None,
        SliderControl::Rotor => {
            Some(SliderEffect::MoveActuator { axis: ActuatorAxis::Rotor, target: single()? })
        },
        SliderControl::Turntable => {
            Some(SliderEffect::MoveActuator { axis: ActuatorAxis::Turntable, target: single()? })
        },

        SliderControl::Shutter => camera(CameraParam::Shutter, single()?),
        SliderControl::Brightness => camera(CameraParam::Brightness, single()?),
        SliderControl::Contrast => camera(CameraParam::Contrast, single()?),
        SliderControl::Saturation => camera(CameraParam::Saturation, single()?),

        SliderControl::Light => {
            Some(SliderEffect::SetLights { level: LightLevel::from_value(single()?), value })
        },

        SliderControl::ImagesPerRevision
        | SliderControl::RotorAnglesPerScan
        | SliderControl::RotorAngleRangeToScan
            if !committed =>
        {
            None
        },
        SliderControl::ImagesPerRevision | SliderControl::RotorAnglesPerScan => {
            single()?;
            Some(SliderEffect::Persist { control, value })
        },
        SliderControl::RotorAngleRangeToScan => {
            if value.as_range().is_none() {
                return Err(SliderError::ValueShape { control, value });
            }
            Some(SliderEffect::Persist { control, value })
        },
    };

    Ok(effect)
}

fn camera(param: CameraParam, value: f64) -> Option<SliderEffect> {
    Some(SliderEffect::SetCamera { param, value })
}
