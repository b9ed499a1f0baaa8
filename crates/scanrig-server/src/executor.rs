//! Action executor.
//!
//! Runs driver actions against the notifier and the rig. Actions execute while
//! the driver lock is still held, so outbound messages and hardware commands
//! leave in the order the driver produced them across all sessions.
//! Long-running work is spawned and feeds its completion back in as a new
//! event once the lock is free.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;

use crate::{
    Notifier,
    catalog::Catalog,
    config::ConfigStore,
    devices::{Rig, RigEvent, ScanJob},
    driver::{LogLevel, ServerAction, ServerDriver, ServerEvent},
    server_error::ServerError,
};

/// Shared handle that feeds events to the driver and executes the results.
///
/// Clone is cheap; clones drive the same driver.
pub struct Executor<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    driver: Arc<Mutex<ServerDriver<C, G>>>,
    rig: Rig,
    notifier: Notifier,
    tasks: TaskTracker,
}

impl<C, G> Clone for Executor<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            rig: self.rig.clone(),
            notifier: self.notifier.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

impl<C, G> Executor<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    /// Create an executor owning `driver`.
    pub fn new(driver: ServerDriver<C, G>, rig: Rig, notifier: Notifier) -> Self {
        Self { driver: Arc::new(Mutex::new(driver)), rig, notifier, tasks: TaskTracker::new() }
    }

    /// Outbound queues of every session.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Process one event and execute the resulting actions.
    ///
    /// # Errors
    ///
    /// Propagates driver errors; no action is executed in that case.
    pub async fn submit(&self, event: ServerEvent) -> Result<(), ServerError> {
        let mut driver = self.driver.lock().await;
        let actions = driver.process_event(event)?;

        self.execute(actions);
        drop(driver);
        Ok(())
    }

    /// Feed device reports into the driver until every device sender is
    /// dropped.
    pub async fn pump(&self, mut events: mpsc::Receiver<RigEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.submit(event.into()).await {
                tracing::warn!("rig event rejected: {}", e);
            }
        }
    }

    /// Run `inspect` against the driver under its lock.
    pub async fn with_driver<R>(&self, inspect: impl FnOnce(&ServerDriver<C, G>) -> R) -> R {
        let driver = self.driver.lock().await;
        inspect(&driver)
    }

    /// Wait until no spawned work (scans, transfers, removals) is in flight,
    /// including work spawned by completions of earlier work.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Must be called with the driver lock held. Spawned tasks only take the
    /// lock again after this returns.
    fn execute(&self, actions: Vec<ServerAction>) {
        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, message } => {
                    self.notifier.unicast(session_id, message);
                },

                ServerAction::Broadcast { notification } => {
                    self.notifier.broadcast(&notification);
                },

                ServerAction::CloseConnection { session_id, reason } => {
                    tracing::info!("Closing connection {}: {}", session_id, reason);
                    // The session's writer task sees its queue close and shuts
                    // the connection down.
                    self.notifier.detach(session_id);
                },

                ServerAction::Device(command) => {
                    if let Err(e) = self.rig.apply(&command) {
                        tracing::warn!(?command, "device command failed: {}", e);
                    }
                },

                ServerAction::RunScan { ticket, plan } => {
                    let this = self.clone();
                    let scanner = Arc::clone(&self.rig.scanner);
                    let job = ScanJob {
                        scan_id: ticket.scan_id,
                        plan,
                        cancel: ticket.cancel,
                        notifier: self.notifier.clone(),
                    };

                    self.tasks.spawn(async move {
                        let result = scanner.run(job).await;
                        this.complete(ServerEvent::ScanFinished { scan_id: ticket.scan_id, result })
                            .await;
                    });
                },

                ServerAction::OpenTransfer { session_id, request_id, archive } => {
                    let this = self.clone();
                    let transfer = Arc::clone(&self.rig.transfer);

                    self.tasks.spawn(async move {
                        let result = transfer.open(&archive).await;
                        this.complete(ServerEvent::TransferFinished {
                            session_id,
                            request_id,
                            result,
                        })
                        .await;
                    });
                },

                ServerAction::RemoveProjectFiles { session_id, request_id, project_id, dir } => {
                    let this = self.clone();
                    let files = Arc::clone(&self.rig.files);

                    self.tasks.spawn(async move {
                        let result = files.remove_all(&dir).await;
                        this.complete(ServerEvent::ProjectFilesRemoved {
                            session_id,
                            request_id,
                            project_id,
                            result,
                        })
                        .await;
                    });
                },

                ServerAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }

    async fn complete(&self, event: ServerEvent) {
        if let Err(e) = self.submit(event).await {
            tracing::error!("completion rejected: {}", e);
        }
    }
}
