//! Simulated rig hardware.
//!
//! Stand-ins for the motor drivers, camera, GPIO lines, scan engine and
//! archive transfer service. They keep just enough state to be observable
//! and report completions on the rig event channel like real drivers do.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use scanrig_proto::{Notification, ProjectId, ProjectRecord, SliderControl, SliderValue, TransferHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    Actuator, ActuatorAxis, ArchiveTransfer, Camera, CameraParam, DeviceError, LightLine,
    LightOutputs, RigEvent, ScanEngine, ScanJob, ScanOutcome,
};
use crate::{Environment, catalog::Catalog};

/// Degrees per motor step (1.8 degree motor at 1/16 microstepping).
const DEGREES_PER_STEP: f64 = 1.8 / 16.0;

fn report(events: &mpsc::Sender<RigEvent>, event: RigEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::debug!(error = %e, "rig event dropped");
    }
}

#[derive(Debug, Default)]
struct ActuatorState {
    position: f64,
    invert: bool,
}

/// Simulated stepper axis that reaches its target instantly.
#[derive(Debug)]
pub struct SimActuator {
    axis: ActuatorAxis,
    state: Mutex<ActuatorState>,
    events: mpsc::Sender<RigEvent>,
}

impl SimActuator {
    /// Create an axis at position 0 reporting on `events`.
    pub fn new(axis: ActuatorAxis, events: mpsc::Sender<RigEvent>) -> Self {
        Self { axis, state: Mutex::new(ActuatorState::default()), events }
    }

    /// Current position.
    pub fn position(&self) -> f64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).position
    }

    /// Whether direction is reversed.
    pub fn inverted(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).invert
    }

    fn moved(&self, position: f64) {
        tracing::trace!(axis = %self.axis, position, "actuator moved");
        report(&self.events, RigEvent::ActuatorTurned { axis: self.axis, display_value: position });
    }
}

impl Actuator for SimActuator {
    fn turn_to(&self, target: f64) -> Result<(), DeviceError> {
        if !target.is_finite() {
            return Err(DeviceError::Actuator(format!("{}: target {target} is not finite", self.axis)));
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner).position = target;
        self.moved(target);
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn turn_by(&self, steps: i64) -> Result<(), DeviceError> {
        let position = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let direction = if state.invert { -1.0 } else { 1.0 };
            state.position += steps as f64 * DEGREES_PER_STEP * direction;
            state.position
        };
        self.moved(position);
        Ok(())
    }

    fn set_home(&self) -> Result<(), DeviceError> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).position = 0.0;
        Ok(())
    }

    fn set_invert(&self, invert: bool) -> Result<(), DeviceError> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).invert = invert;
        Ok(())
    }
}

/// Simulated camera that emits a preview frame every `interval`.
#[derive(Debug)]
pub struct SimCamera<E: Environment> {
    env: E,
    interval: Duration,
    params: Mutex<BTreeMap<CameraParam, f64>>,
    preview: Mutex<Option<CancellationToken>>,
    events: mpsc::Sender<RigEvent>,
}

impl<E: Environment> SimCamera<E> {
    /// Create a camera with preview off.
    pub fn new(env: E, interval: Duration, events: mpsc::Sender<RigEvent>) -> Self {
        Self {
            env,
            interval,
            params: Mutex::new(BTreeMap::new()),
            preview: Mutex::new(None),
            events,
        }
    }

    /// Last value applied to `param`.
    pub fn param(&self, param: CameraParam) -> Option<f64> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner).get(&param).copied()
    }

    /// Whether preview frames are being produced.
    pub fn previewing(&self) -> bool {
        self.preview.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl<E: Environment> Camera for SimCamera<E> {
    fn set(&self, param: CameraParam, value: f64) -> Result<(), DeviceError> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner).insert(param, value);
        Ok(())
    }

    fn start_preview(&self) -> Result<(), DeviceError> {
        let mut preview = self.preview.lock().unwrap_or_else(PoisonError::into_inner);
        if preview.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeviceError::Camera(format!("preview needs a runtime: {e}")))?;

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let env = self.env.clone();
        let interval = self.interval;
        let events = self.events.clone();

        runtime.spawn(async move {
            let mut frame = 0u64;
            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => break,
                    () = env.sleep(interval) => {},
                }
                frame += 1;
                report(&events, RigEvent::PreviewReady { frame: format!("preview-{frame:06}.jpg") });
            }
        });

        *preview = Some(cancel);
        Ok(())
    }

    fn stop_preview(&self) -> Result<(), DeviceError> {
        if let Some(cancel) = self.preview.lock().unwrap_or_else(PoisonError::into_inner).take() {
            cancel.cancel();
        }
        Ok(())
    }
}

/// Simulated GPIO light lines.
#[derive(Debug, Default)]
pub struct SimLights {
    line1: AtomicBool,
    line2: AtomicBool,
}

impl SimLights {
    /// Create with both lines low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `(line1, line2)` state.
    pub fn lines(&self) -> (bool, bool) {
        (self.line1.load(Ordering::SeqCst), self.line2.load(Ordering::SeqCst))
    }
}

impl LightOutputs for SimLights {
    fn write(&self, line: LightLine, high: bool) -> Result<(), DeviceError> {
        let target = match line {
            LightLine::Line1 => &self.line1,
            LightLine::Line2 => &self.line2,
        };
        target.store(high, Ordering::SeqCst);
        Ok(())
    }
}

/// Simulated scan procedure.
///
/// Walks every rotor stop and turntable image with `step_delay` per image,
/// then creates the project directory and catalog record.
#[derive(Debug)]
pub struct SimScanEngine<C: Catalog, E: Environment> {
    catalog: C,
    env: E,
    step_delay: Duration,
}

impl<C: Catalog, E: Environment> SimScanEngine<C, E> {
    /// Create an engine recording projects in `catalog`.
    pub fn new(catalog: C, env: E, step_delay: Duration) -> Self {
        Self { catalog, env, step_delay }
    }

    async fn record(&self, job: &ScanJob) -> Result<ProjectId, DeviceError> {
        let scan_failed = |e: crate::catalog::CatalogError| DeviceError::Scan(e.to_string());

        let mut id = ProjectId::new(self.env.wall_clock_secs());
        while self.catalog.get(id).map_err(scan_failed)?.is_some() {
            id = ProjectId::new(id.get() + 1);
        }

        let dir = job.plan.projects_folder.join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DeviceError::Filesystem(format!("{}: {e}", dir.display())))?;

        let record = ProjectRecord::new(id)
            .with_field("id", id.to_string())
            .with_field("created", self.env.wall_clock_secs().to_string())
            .with_field("images", job.plan.total_images().to_string())
            .with_field("rotorAngles", job.plan.rotor_angles_per_scan.to_string());
        self.catalog.insert(&record).map_err(scan_failed)?;

        Ok(id)
    }
}

#[async_trait]
impl<C: Catalog, E: Environment> ScanEngine for SimScanEngine<C, E> {
    async fn run(&self, job: ScanJob) -> Result<ScanOutcome, DeviceError> {
        let total = job.plan.total_images();
        let mut captured = 0u64;

        for stop in 0..job.plan.rotor_angles_per_scan {
            let angle = job.plan.rotor_angle(stop);
            job.notifier
                .broadcast(&Notification::slider_value(SliderControl::Rotor, SliderValue::Single(angle)));

            for _ in 0..job.plan.images_per_revision {
                tokio::select! {
                    biased;
                    () = job.cancel.cancelled() => {
                        job.notifier.broadcast(&Notification::info("currentAction", "Aborted"));
                        return Ok(ScanOutcome::Aborted);
                    },
                    () = self.env.sleep(self.step_delay) => {},
                }

                captured += 1;
                job.notifier.broadcast(&Notification::info(
                    "currentAction",
                    format!("Capturing image {captured} of {total}"),
                ));
            }
        }

        let project_id = self.record(&job).await?;
        job.notifier.broadcast(&Notification::info("currentAction", "Idle"));

        Ok(ScanOutcome::Completed { project_id })
    }
}

/// Simulated archive transfer that hands out a token for existing archives.
#[derive(Debug, Clone)]
pub struct SimArchiveTransfer<E: Environment> {
    env: E,
}

impl<E: Environment> SimArchiveTransfer<E> {
    /// Create a transfer service.
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

#[async_trait]
impl<E: Environment> ArchiveTransfer for SimArchiveTransfer<E> {
    async fn open(&self, archive: &Path) -> Result<TransferHandle, DeviceError> {
        tokio::fs::metadata(archive)
            .await
            .map_err(|e| DeviceError::Transfer(format!("{}: {e}", archive.display())))?;

        let name = archive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(TransferHandle::new(format!("transfer/{:016x}/{name}", self.env.random_u64())))
    }
}
