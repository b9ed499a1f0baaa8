//! Device collaborators.
//!
//! Traits for everything the gateway drives but does not own: the two
//! actuators, the camera, the light output lines, the scan engine, the archive
//! transfer service and the project directory tree. Hardware calls are
//! synchronous submissions; the engine, transfers and removals are async and
//! run outside the driver lock.
//!
//! Devices report asynchronous completions ([`RigEvent`]) on an mpsc channel
//! that the runtime pumps back into the executor.

mod files;
mod sim;

use std::{fmt, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
pub use files::LocalProjectFiles;
use scanrig_proto::{ProjectId, TransferHandle};
pub use sim::{SimActuator, SimArchiveTransfer, SimCamera, SimLights, SimScanEngine};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{Environment, Notifier, catalog::Catalog, config::ScanPlan};

/// Device-level failure.
///
/// Messages stay inside the gateway; clients only ever see summaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Actuator rejected or failed a command
    #[error("actuator fault: {0}")]
    Actuator(String),

    /// Camera rejected or failed a command
    #[error("camera fault: {0}")]
    Camera(String),

    /// Light output could not be written
    #[error("light output fault: {0}")]
    Lights(String),

    /// Scan engine failed
    #[error("scan failed: {0}")]
    Scan(String),

    /// Archive transfer could not be opened
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Filesystem operation failed
    #[error("{0}")]
    Filesystem(String),
}

/// Motorized axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActuatorAxis {
    /// Tilt rotor
    Rotor,
    /// Rotating turntable
    Turntable,
}

impl fmt::Display for ActuatorAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotor => f.write_str("rotor"),
            Self::Turntable => f.write_str("turntable"),
        }
    }
}

/// Camera parameter adjustable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CameraParam {
    /// Exposure time
    Shutter,
    /// Brightness
    Brightness,
    /// Contrast
    Contrast,
    /// Saturation
    Saturation,
}

/// Light control output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLine {
    /// First illumination line
    Line1,
    /// Second illumination line
    Line2,
}

/// A motorized axis.
pub trait Actuator: Send + Sync {
    /// Move to an absolute position. Completion is reported as
    /// [`RigEvent::ActuatorTurned`].
    fn turn_to(&self, target: f64) -> Result<(), DeviceError>;

    /// Move by a relative number of motor steps.
    fn turn_by(&self, steps: i64) -> Result<(), DeviceError>;

    /// Declare the current position as home.
    fn set_home(&self) -> Result<(), DeviceError>;

    /// Reverse the direction of motion.
    fn set_invert(&self, invert: bool) -> Result<(), DeviceError>;
}

/// Scanning camera.
pub trait Camera: Send + Sync {
    /// Apply a parameter immediately.
    fn set(&self, param: CameraParam, value: f64) -> Result<(), DeviceError>;

    /// Start producing preview frames. Idempotent.
    fn start_preview(&self) -> Result<(), DeviceError>;

    /// Stop producing preview frames. Idempotent.
    fn stop_preview(&self) -> Result<(), DeviceError>;
}

/// The two light control output lines.
pub trait LightOutputs: Send + Sync {
    /// Drive one line high or low.
    fn write(&self, line: LightLine, high: bool) -> Result<(), DeviceError>;
}

/// Everything a scan run needs.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Id of this run
    pub scan_id: u64,
    /// Parameters captured when the run started
    pub plan: ScanPlan,
    /// Cancelled when a client aborts the run
    pub cancel: tokio_util::sync::CancellationToken,
    /// For progress broadcasts
    pub notifier: Notifier,
}

/// How a scan run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// All steps ran and the project was recorded.
    Completed {
        /// Project created by the run
        project_id: ProjectId,
    },
    /// The run observed cancellation and stopped early.
    Aborted,
}

/// The physical scan procedure.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Run a scan to completion, checking `job.cancel` between steps.
    async fn run(&self, job: ScanJob) -> Result<ScanOutcome, DeviceError>;
}

/// Service that serves a project's image archive to a client.
#[async_trait]
pub trait ArchiveTransfer: Send + Sync {
    /// Open a transfer for the archive at `archive`.
    async fn open(&self, archive: &Path) -> Result<TransferHandle, DeviceError>;
}

/// On-disk project directories.
#[async_trait]
pub trait ProjectFiles: Send + Sync {
    /// Recursively remove `dir`. A directory that does not exist counts as
    /// removed.
    async fn remove_all(&self, dir: &Path) -> Result<(), DeviceError>;
}

/// Asynchronous device notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    /// An actuator finished moving.
    ActuatorTurned {
        /// Axis that moved
        axis: ActuatorAxis,
        /// Position to display
        display_value: f64,
    },
    /// A new preview frame is available.
    PreviewReady {
        /// Frame reference
        frame: String,
    },
}

/// Synchronous hardware command emitted by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RigCommand {
    /// Move an actuator to an absolute position
    MoveActuator {
        /// Axis to move
        axis: ActuatorAxis,
        /// Target position
        target: f64,
    },
    /// Move an actuator by relative steps
    StepActuator {
        /// Axis to move
        axis: ActuatorAxis,
        /// Motor steps, negative for reverse
        steps: i64,
    },
    /// Set the actuator's home position
    SetActuatorHome {
        /// Axis to home
        axis: ActuatorAxis,
    },
    /// Reverse an actuator's direction
    SetActuatorInvert {
        /// Axis to configure
        axis: ActuatorAxis,
        /// Whether motion is inverted
        invert: bool,
    },
    /// Apply a camera parameter
    SetCamera {
        /// Parameter
        param: CameraParam,
        /// Value
        value: f64,
    },
    /// Drive both light lines
    WriteLights {
        /// Line 1 state
        line1: bool,
        /// Line 2 state
        line2: bool,
    },
    /// Start camera preview
    StartPreview,
    /// Stop camera preview
    StopPreview,
}

/// The set of device services, built once by the composition root.
#[derive(Clone)]
pub struct Rig {
    /// Tilt rotor
    pub rotor: Arc<dyn Actuator>,
    /// Turntable
    pub turntable: Arc<dyn Actuator>,
    /// Camera
    pub camera: Arc<dyn Camera>,
    /// Light outputs
    pub lights: Arc<dyn LightOutputs>,
    /// Scan engine
    pub scanner: Arc<dyn ScanEngine>,
    /// Archive transfer service
    pub transfer: Arc<dyn ArchiveTransfer>,
    /// Project directories
    pub files: Arc<dyn ProjectFiles>,
}

impl fmt::Debug for Rig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rig").finish_non_exhaustive()
    }
}

/// Timing for the simulated rig.
#[derive(Debug, Clone, Copy)]
pub struct SimTiming {
    /// Delay between preview frames
    pub preview_interval: Duration,
    /// Delay per captured image during a scan
    pub capture_delay: Duration,
}

impl Default for SimTiming {
    fn default() -> Self {
        Self { preview_interval: Duration::from_millis(500), capture_delay: Duration::from_millis(200) }
    }
}

impl Rig {
    /// Compose a rig from simulated devices.
    ///
    /// Devices report on `events`; scans record their projects in `catalog`.
    pub fn simulated<C, E>(catalog: C, env: E, timing: SimTiming, events: mpsc::Sender<RigEvent>) -> Self
    where
        C: Catalog,
        E: Environment,
    {
        Self {
            rotor: Arc::new(SimActuator::new(ActuatorAxis::Rotor, events.clone())),
            turntable: Arc::new(SimActuator::new(ActuatorAxis::Turntable, events.clone())),
            camera: Arc::new(SimCamera::new(env.clone(), timing.preview_interval, events)),
            lights: Arc::new(SimLights::new()),
            scanner: Arc::new(SimScanEngine::new(catalog, env.clone(), timing.capture_delay)),
            transfer: Arc::new(SimArchiveTransfer::new(env)),
            files: Arc::new(LocalProjectFiles),
        }
    }

    /// Actuator for `axis`.
    pub fn actuator(&self, axis: ActuatorAxis) -> &dyn Actuator {
        match axis {
            ActuatorAxis::Rotor => self.rotor.as_ref(),
            ActuatorAxis::Turntable => self.turntable.as_ref(),
        }
    }

    /// Submit a hardware command.
    ///
    /// # Errors
    ///
    /// Whatever the device reports.
    pub fn apply(&self, command: &RigCommand) -> Result<(), DeviceError> {
        match *command {
            RigCommand::MoveActuator { axis, target } => self.actuator(axis).turn_to(target),
            RigCommand::StepActuator { axis, steps } => self.actuator(axis).turn_by(steps),
            RigCommand::SetActuatorHome { axis } => self.actuator(axis).set_home(),
            RigCommand::SetActuatorInvert { axis, invert } => {
                self.actuator(axis).set_invert(invert)
            },
            RigCommand::SetCamera { param, value } => self.camera.set(param, value),
            RigCommand::WriteLights { line1, line2 } => {
                self.lights.write(LightLine::Line1, line1)?;
                self.lights.write(LightLine::Line2, line2)
            },
            RigCommand::StartPreview => self.camera.start_preview(),
            RigCommand::StopPreview => self.camera.stop_preview(),
        }
    }
}
