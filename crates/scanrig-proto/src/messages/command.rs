//! Client to server commands.

use serde::{Deserialize, Serialize};

use crate::{CropArea, InteractionType, SliderValue};

/// Operation requested by a client.
///
/// Project ids and slider names are carried verbatim so the gateway can
/// reject malformed ids and log unknown sliders instead of failing to decode
/// the whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Open an archive transfer for a project's images.
    Proxy {
        /// Project id as typed by the user
        project_id: String,
    },
    /// Persist and broadcast the crop rectangle.
    ImgArea {
        /// New rectangle
        rect: CropArea,
    },
    /// List one page of catalog projects.
    GetProjects {
        /// Zero-based page number
        page: u32,
        /// Page size
        per_page: u32,
    },
    /// Start a scan session.
    Start,
    /// Ask the running scan session to stop.
    Abort,
    /// Remove a project's files and catalog entry.
    Delete {
        /// Project id as typed by the user
        project_id: String,
    },
    /// Move the rotor by a relative number of steps.
    RotorCalibrate {
        /// Signed step count
        steps: i64,
    },
    /// Set and persist the rotor direction.
    RotorCalibrateDirection {
        /// Whether rotor motion is inverted
        invert: bool,
    },
    /// Declare the rotor's current position as home.
    RotorCalibrateSetHome,
    /// Declare the turntable's current position as home.
    TurntableCalibrateSetHome,
    /// Slider moved or committed.
    Slider {
        /// Live drag or commit
        interaction: InteractionType,
        /// Control name
        name: String,
        /// New value
        value: SliderValue,
    },
}

impl Command {
    /// Wire name of the command, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Proxy { .. } => "proxy",
            Self::ImgArea { .. } => "imgArea",
            Self::GetProjects { .. } => "getProjects",
            Self::Start => "start",
            Self::Abort => "abort",
            Self::Delete { .. } => "delete",
            Self::RotorCalibrate { .. } => "rotorCalibrate",
            Self::RotorCalibrateDirection { .. } => "rotorCalibrateDirection",
            Self::RotorCalibrateSetHome => "rotorCalibrateSetHome",
            Self::TurntableCalibrateSetHome => "turntableCalibrateSetHome",
            Self::Slider { .. } => "slider",
        }
    }
}
