//! Gateway driver.
//!
//! Ties together the connection registry, the scan session controller, the
//! slider dispatcher, the project catalog and the rig configuration. Pure
//! state machine: events in, actions out. Hardware commands, scan runs,
//! archive transfers and directory removals leave as actions and, where they
//! complete asynchronously, come back as events.
//!
//! Every command is answered exactly once, either from the handler itself or
//! from the completion event of the work it started.

use std::{net::SocketAddr, path::PathBuf};

use scanrig_proto::{
    Command, CommandFailure, CropArea, InteractionType, Notification, ProjectId, Reply,
    ServerMessage, SliderControl, SliderValue, TransferHandle,
};

use crate::{
    catalog::Catalog,
    config::{ConfigError, ConfigStore, ScanPlan},
    devices::{ActuatorAxis, DeviceError, RigCommand, RigEvent, ScanOutcome},
    registry::{ConnectionRegistry, SessionInfo},
    server_error::ServerError,
    session::{ScanTicket, SessionController, SessionPhase},
    slider::{self, SliderEffect},
};

/// Status key for the current rig activity.
const CURRENT_ACTION: &str = "currentAction";

/// Archive served by `proxy`, relative to the project directory.
const PROJECT_ARCHIVE: &str = "images.zip";

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 1_000 }
    }
}

/// Events that the driver processes.
///
/// These are produced by the runtime: connection handling, the device event
/// pump, and completions of long-running work.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
        /// Peer address, for diagnostics
        remote_addr: SocketAddr,
    },

    /// A command was received from a connection
    CommandReceived {
        /// Connection that sent the command
        session_id: u64,
        /// Correlates the reply
        request_id: u32,
        /// The command
        command: Command,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// An actuator finished moving
    ActuatorTurned {
        /// Axis that moved
        axis: ActuatorAxis,
        /// Position to display
        display_value: f64,
    },

    /// The camera produced a preview frame
    PreviewReady {
        /// Frame reference
        frame: String,
    },

    /// A scan run ended
    ScanFinished {
        /// Run that ended
        scan_id: u64,
        /// How it ended
        result: Result<ScanOutcome, DeviceError>,
    },

    /// An archive transfer opened or failed
    TransferFinished {
        /// Session that asked for it
        session_id: u64,
        /// Request to answer
        request_id: u32,
        /// Transfer descriptor or failure
        result: Result<TransferHandle, DeviceError>,
    },

    /// A project directory was removed or failed to be
    ProjectFilesRemoved {
        /// Session that asked for it
        session_id: u64,
        /// Request to answer
        request_id: u32,
        /// Project being deleted
        project_id: ProjectId,
        /// Removal outcome
        result: Result<(), DeviceError>,
    },
}

impl From<RigEvent> for ServerEvent {
    fn from(event: RigEvent) -> Self {
        match event {
            RigEvent::ActuatorTurned { axis, display_value } => {
                Self::ActuatorTurned { axis, display_value }
            },
            RigEvent::PreviewReady { frame } => Self::PreviewReady { frame },
        }
    }
}

/// Actions that the driver produces.
///
/// These are executed by the runtime.
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a message to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Message to send
        message: ServerMessage,
    },

    /// Send a notification to every connected session
    Broadcast {
        /// Notification to send
        notification: Notification,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Submit a hardware command
    Device(RigCommand),

    /// Run the scan procedure in the background
    RunScan {
        /// Run id and cancellation
        ticket: ScanTicket,
        /// Parameters captured at start
        plan: ScanPlan,
    },

    /// Open an archive transfer in the background
    OpenTransfer {
        /// Session to answer
        session_id: u64,
        /// Request to answer
        request_id: u32,
        /// Archive to serve
        archive: PathBuf,
    },

    /// Remove a project directory in the background
    RemoveProjectFiles {
        /// Session to answer
        session_id: u64,
        /// Request to answer
        request_id: u32,
        /// Project being deleted
        project_id: ProjectId,
        /// Directory to remove
        dir: PathBuf,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

fn log(level: LogLevel, message: impl Into<String>) -> ServerAction {
    ServerAction::Log { level, message: message.into() }
}

fn broadcast(notification: Notification) -> ServerAction {
    ServerAction::Broadcast { notification }
}

fn notify(session_id: u64, notification: Notification) -> ServerAction {
    ServerAction::SendToSession { session_id, message: ServerMessage::Notify(notification) }
}

fn reply(session_id: u64, request_id: u32, reply: Reply) -> ServerAction {
    ServerAction::SendToSession { session_id, message: ServerMessage::ok(request_id, reply) }
}

/// Settings writes are best effort: a failure is logged and the live value
/// still goes out.
fn persisted(what: &str, result: Result<(), ConfigError>) -> Option<ServerAction> {
    result.err().map(|e| log(LogLevel::Error, format!("failed to persist {what}: {e}")))
}

fn fail(session_id: u64, request_id: u32, failure: CommandFailure) -> ServerAction {
    ServerAction::SendToSession { session_id, message: ServerMessage::failed(request_id, failure) }
}

/// Action-based gateway driver.
///
/// Orchestrates connection bookkeeping, command handling and the single scan
/// session.
pub struct ServerDriver<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    /// Connected sessions
    registry: ConnectionRegistry,
    /// Single-flight scan state
    session: SessionController,
    /// Project catalog
    catalog: C,
    /// Rig settings
    settings: G,
    /// Driver configuration
    config: DriverConfig,
}

impl<C, G> ServerDriver<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    /// Create a new driver.
    pub fn new(catalog: C, settings: G, config: DriverConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            session: SessionController::new(),
            catalog,
            settings,
            config,
        }
    }

    /// Process an event and return actions to execute.
    ///
    /// This is the main entry point for the driver.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` for runtime inconsistencies (unknown or
    /// duplicate session). Command failures are replies, not errors.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, ServerError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id, remote_addr } => {
                self.handle_connection_accepted(session_id, remote_addr)
            },
            ServerEvent::CommandReceived { session_id, request_id, command } => {
                self.handle_command(session_id, request_id, command)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
            ServerEvent::ActuatorTurned { axis, display_value } => {
                Ok(self.handle_actuator_turned(axis, display_value))
            },
            ServerEvent::PreviewReady { frame } => {
                Ok(vec![broadcast(Notification::UpdateCameraPreview { frame })])
            },
            ServerEvent::ScanFinished { scan_id, result } => {
                Ok(self.handle_scan_finished(scan_id, result))
            },
            ServerEvent::TransferFinished { session_id, request_id, result } => {
                Ok(Self::handle_transfer_finished(session_id, request_id, result))
            },
            ServerEvent::ProjectFilesRemoved { session_id, request_id, project_id, result } => {
                Ok(self.handle_project_files_removed(session_id, request_id, project_id, result))
            },
        }
    }

    /// Number of connected sessions.
    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Connected sessions.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Whether a scan session holds the rig.
    pub fn scanning(&self) -> bool {
        self.session.scanning()
    }

    /// Current scan session phase.
    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Project catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Rig settings store.
    pub fn settings(&self) -> &G {
        &self.settings
    }

    /// Handle a new connection being accepted.
    ///
    /// Registers the session and queues its initial sync: read-only mode if a
    /// scan is running, every slider's configuration, version, crop area and
    /// rotor direction. Nothing here is broadcast.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
        remote_addr: SocketAddr,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if self.registry.has_session(session_id) {
            return Err(ServerError::SessionAlreadyExists(session_id));
        }

        if self.registry.session_count() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::CloseConnection {
                    session_id,
                    reason: "max connections exceeded".to_string(),
                },
                log(LogLevel::Warn, format!("rejected {remote_addr}: max connections exceeded")),
            ]);
        }

        let scanning = self.session.scanning();
        let info =
            if scanning { SessionInfo::read_only(remote_addr) } else { SessionInfo::new(remote_addr) };
        self.registry.register_session(session_id, info);

        let settings = self.settings.snapshot();
        let mut actions = vec![log(
            LogLevel::Info,
            format!("client connected from {remote_addr}, session_id={session_id}"),
        )];

        if scanning {
            actions.push(notify(session_id, Notification::DisableControls));
        }

        actions.push(ServerAction::Device(RigCommand::StartPreview));

        for control in SliderControl::ALL {
            actions.push(notify(session_id, Notification::InitSlider {
                control,
                options: settings.slider(control),
            }));
        }

        actions.push(notify(session_id, Notification::info("info-version", settings.version)));
        actions.push(notify(session_id, Notification::ImgArea { rect: settings.crop }));
        actions.push(notify(session_id, Notification::Invert { flag: settings.rotor_invert }));

        Ok(actions)
    }

    /// Handle a connection closing.
    ///
    /// Stops the camera preview once nobody is watching. In-flight work the
    /// session started keeps running.
    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        let Some(info) = self.registry.unregister_session(session_id) else {
            return vec![log(
                LogLevel::Debug,
                format!("close for unregistered session {session_id}: {reason}"),
            )];
        };

        let mut actions = vec![log(
            LogLevel::Info,
            format!("client disconnected from {}: {reason}", info.remote_addr),
        )];

        if self.registry.session_count() == 0 {
            actions.push(ServerAction::Device(RigCommand::StopPreview));
        }

        actions
    }

    /// Handle a command from a connected session.
    fn handle_command(
        &mut self,
        session_id: u64,
        request_id: u32,
        command: Command,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if !self.registry.has_session(session_id) {
            return Err(ServerError::SessionNotFound(session_id));
        }

        let actions = match command {
            Command::Proxy { project_id } => self.handle_proxy(session_id, request_id, &project_id),
            Command::ImgArea { rect } => self.handle_img_area(session_id, request_id, rect),
            Command::GetProjects { page, per_page } => {
                self.handle_get_projects(session_id, request_id, page, per_page)
            },
            Command::Start => self.handle_start(session_id, request_id),
            Command::Abort => self.handle_abort(session_id, request_id),
            Command::Delete { project_id } => {
                self.handle_delete(session_id, request_id, &project_id)
            },
            Command::RotorCalibrate { steps } => vec![
                ServerAction::Device(RigCommand::StepActuator { axis: ActuatorAxis::Rotor, steps }),
                reply(session_id, request_id, Reply::Ack),
            ],
            Command::RotorCalibrateDirection { invert } => {
                self.handle_rotor_direction(session_id, request_id, invert)
            },
            Command::RotorCalibrateSetHome => vec![
                ServerAction::Device(RigCommand::SetActuatorHome { axis: ActuatorAxis::Rotor }),
                reply(session_id, request_id, Reply::Ack),
            ],
            Command::TurntableCalibrateSetHome => vec![
                ServerAction::Device(RigCommand::SetActuatorHome {
                    axis: ActuatorAxis::Turntable,
                }),
                reply(session_id, request_id, Reply::Ack),
            ],
            Command::Slider { interaction, name, value } => {
                self.handle_slider(session_id, request_id, interaction, name, value)
            },
        };

        Ok(actions)
    }

    fn handle_proxy(&self, session_id: u64, request_id: u32, project_id: &str) -> Vec<ServerAction> {
        let Ok(project_id) = project_id.parse::<ProjectId>() else {
            return vec![
                log(LogLevel::Warn, format!("proxy: rejected project id {project_id:?}")),
                fail(session_id, request_id, CommandFailure::Validation("Invalid project id".into())),
            ];
        };

        let archive = self.settings.snapshot().project_dir(project_id).join(PROJECT_ARCHIVE);
        vec![ServerAction::OpenTransfer { session_id, request_id, archive }]
    }

    fn handle_transfer_finished(
        session_id: u64,
        request_id: u32,
        result: Result<TransferHandle, DeviceError>,
    ) -> Vec<ServerAction> {
        match result {
            Ok(handle) => vec![reply(session_id, request_id, Reply::Transfer { handle })],
            Err(e) => vec![
                log(LogLevel::Warn, format!("proxy for session {session_id} failed: {e}")),
                fail(
                    session_id,
                    request_id,
                    CommandFailure::Transfer("Proxy connection failed".into()),
                ),
            ],
        }
    }

    fn handle_img_area(&self, session_id: u64, request_id: u32, rect: CropArea) -> Vec<ServerAction> {
        let mut actions = vec![log(LogLevel::Debug, format!("crop area set to {rect:?}"))];
        actions.extend(persisted("crop area", self.settings.set_crop_area(rect)));
        actions.push(broadcast(Notification::ImgArea { rect }));
        actions.push(reply(session_id, request_id, Reply::Ack));
        actions
    }

    fn handle_get_projects(
        &self,
        session_id: u64,
        request_id: u32,
        page: u32,
        per_page: u32,
    ) -> Vec<ServerAction> {
        let lookup = || -> Result<(Vec<_>, usize), crate::catalog::CatalogError> {
            let ids = self.catalog.list(page, per_page)?;
            let listed = ids.len();

            let mut records = Vec::with_capacity(listed);
            for id in ids {
                if let Some(record) = self.catalog.get(id)? {
                    records.push(record);
                }
            }

            Ok((records, listed))
        };

        match lookup() {
            Ok((records, listed)) => {
                let mut actions = Vec::with_capacity(2);
                if records.len() < listed {
                    actions.push(log(
                        LogLevel::Debug,
                        format!("skipped {} dangling project ids", listed - records.len()),
                    ));
                }
                actions.push(reply(session_id, request_id, Reply::Projects { records }));
                actions
            },
            Err(e) => vec![
                log(LogLevel::Error, format!("project listing failed: {e}")),
                fail(session_id, request_id, CommandFailure::Catalog("Could not load projects".into())),
            ],
        }
    }

    /// Start a scan unless one already holds the rig.
    ///
    /// The check and the transition happen under the same `&mut self`, so two
    /// connections can never both start.
    fn handle_start(&mut self, session_id: u64, request_id: u32) -> Vec<ServerAction> {
        match self.session.start() {
            Ok(ticket) => {
                let plan = self.settings.snapshot().scan_plan();
                vec![
                    log(
                        LogLevel::Info,
                        format!("scan {} started by session {session_id}", ticket.scan_id),
                    ),
                    ServerAction::RunScan { ticket, plan },
                    reply(session_id, request_id, Reply::ScanStarted { accepted: true }),
                ]
            },
            Err(e) => vec![
                log(LogLevel::Info, format!("start from session {session_id} ignored: {e}")),
                reply(session_id, request_id, Reply::ScanStarted { accepted: false }),
            ],
        }
    }

    fn handle_abort(&mut self, session_id: u64, request_id: u32) -> Vec<ServerAction> {
        let signalled = self.session.abort();
        let message = if signalled {
            format!("abort requested by session {session_id}")
        } else {
            format!("abort from session {session_id} with no running scan")
        };

        vec![
            log(LogLevel::Info, message),
            broadcast(Notification::info(CURRENT_ACTION, "Aborting...")),
            reply(session_id, request_id, Reply::Ack),
        ]
    }

    fn handle_scan_finished(
        &mut self,
        scan_id: u64,
        result: Result<ScanOutcome, DeviceError>,
    ) -> Vec<ServerAction> {
        if !self.session.finish(scan_id) {
            return vec![log(LogLevel::Warn, format!("completion for stale scan {scan_id} ignored"))];
        }

        match result {
            Ok(ScanOutcome::Completed { project_id }) => vec![log(
                LogLevel::Info,
                format!("scan {scan_id} completed, project {project_id}"),
            )],
            Ok(ScanOutcome::Aborted) => {
                vec![log(LogLevel::Info, format!("scan {scan_id} aborted"))]
            },
            Err(e) => vec![
                log(LogLevel::Error, format!("scan {scan_id} failed: {e}")),
                broadcast(Notification::info(CURRENT_ACTION, "Scan failed")),
            ],
        }
    }

    /// Validate the id, then remove the directory. The catalog entry goes
    /// once the directory is gone.
    fn handle_delete(&self, session_id: u64, request_id: u32, project_id: &str) -> Vec<ServerAction> {
        let Ok(project_id) = project_id.parse::<ProjectId>() else {
            return vec![
                log(LogLevel::Warn, format!("delete: rejected project id {project_id:?}")),
                fail(session_id, request_id, CommandFailure::Validation("Invalid project id".into())),
            ];
        };

        let dir = self.settings.snapshot().project_dir(project_id);
        vec![ServerAction::RemoveProjectFiles { session_id, request_id, project_id, dir }]
    }

    fn handle_project_files_removed(
        &self,
        session_id: u64,
        request_id: u32,
        project_id: ProjectId,
        result: Result<(), DeviceError>,
    ) -> Vec<ServerAction> {
        if let Err(e) = result {
            return vec![
                log(LogLevel::Warn, format!("delete of project {project_id} failed: {e}")),
                fail(
                    session_id,
                    request_id,
                    CommandFailure::Filesystem(format!("Could not delete project: {e}")),
                ),
            ];
        }

        match self.catalog.delete(project_id) {
            Ok(_) => vec![
                log(LogLevel::Info, format!("project {project_id} deleted")),
                reply(session_id, request_id, Reply::Deleted),
            ],
            Err(e) => vec![
                log(LogLevel::Error, format!("catalog delete of project {project_id} failed: {e}")),
                fail(
                    session_id,
                    request_id,
                    CommandFailure::Catalog("Could not delete project".into()),
                ),
            ],
        }
    }

    fn handle_rotor_direction(
        &self,
        session_id: u64,
        request_id: u32,
        invert: bool,
    ) -> Vec<ServerAction> {
        let mut actions = vec![ServerAction::Device(RigCommand::SetActuatorInvert {
            axis: ActuatorAxis::Rotor,
            invert,
        })];
        actions.extend(persisted("rotor direction", self.settings.set_rotor_invert(invert)));
        actions.push(broadcast(Notification::Invert { flag: invert }));
        actions.push(reply(session_id, request_id, Reply::Ack));
        actions
    }

    /// Echo the value to every client, then apply it.
    ///
    /// The echo happens even for names with no backing control so every UI
    /// tracks the drag.
    fn handle_slider(
        &self,
        session_id: u64,
        request_id: u32,
        interaction: InteractionType,
        name: String,
        value: SliderValue,
    ) -> Vec<ServerAction> {
        let Some(control) = SliderControl::from_name(&name) else {
            let unknown = format!("unknown slider {name}");
            return vec![
                broadcast(Notification::SetSliderValue { name, value }),
                log(LogLevel::Error, unknown),
                reply(session_id, request_id, Reply::Ack),
            ];
        };

        let mut actions = vec![broadcast(Notification::SetSliderValue { name, value })];

        match slider::dispatch(control, interaction, value) {
            Ok(Some(effect)) => actions.extend(self.apply_slider(effect)),
            Ok(None) => {},
            Err(e) => {
                actions.push(log(LogLevel::Warn, e.to_string()));
                actions.push(fail(session_id, request_id, CommandFailure::Validation(e.to_string())));
                return actions;
            },
        }

        actions.push(reply(session_id, request_id, Reply::Ack));
        actions
    }

    fn apply_slider(&self, effect: SliderEffect) -> Vec<ServerAction> {
        match effect {
            SliderEffect::MoveActuator { axis, target } => {
                vec![ServerAction::Device(RigCommand::MoveActuator { axis, target })]
            },
            SliderEffect::SetCamera { param, value } => {
                vec![ServerAction::Device(RigCommand::SetCamera { param, value })]
            },
            SliderEffect::SetLights { level, value } => {
                let (line1, line2) = level.lines();
                let mut actions: Vec<_> =
                    persisted("light", self.settings.set_slider_value(SliderControl::Light, value))
                        .into_iter()
                        .collect();
                actions.push(ServerAction::Device(RigCommand::WriteLights { line1, line2 }));
                actions
            },
            SliderEffect::Persist { control, value } => {
                persisted(control.as_str(), self.settings.set_slider_value(control, value))
                    .into_iter()
                    .collect()
            },
        }
    }

    /// Broadcast the actuator's new position and remember it as the slider
    /// value.
    fn handle_actuator_turned(&self, axis: ActuatorAxis, display_value: f64) -> Vec<ServerAction> {
        let control = match axis {
            ActuatorAxis::Rotor => SliderControl::Rotor,
            ActuatorAxis::Turntable => SliderControl::Turntable,
        };
        let value = SliderValue::Single(display_value);

        let mut actions = vec![broadcast(Notification::slider_value(control, value))];
        actions.extend(persisted(control.as_str(), self.settings.set_slider_value(control, value)));
        actions
    }
}

impl<C, G> std::fmt::Debug for ServerDriver<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("sessions", &self.registry.session_count())
            .field("phase", &self.session.phase())
            .finish_non_exhaustive()
    }
}
