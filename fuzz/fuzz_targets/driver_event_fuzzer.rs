//! Fuzz target for the gateway driver state machine
//!
//! Drives `ServerDriver` with arbitrary connects, disconnects, commands and
//! scan completions.
//!
//! # Invariants
//!
//! - At most one scan runs at a time
//! - `scanning()` matches the scan the fuzzer believes is outstanding
//! - Commands from connected sessions never error, unknown sessions always do
//! - Every synchronous command gets exactly one reply
//! - NEVER panic

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use scanrig_proto::{Command, CropArea, ProjectId, ServerMessage, SliderValue};
use scanrig_server::{
    DriverConfig, ServerAction, ServerDriver, ServerEvent,
    catalog::MemoryCatalog,
    config::MemoryConfig,
    devices::ScanOutcome,
};

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Connect { session: u8 },
    Close { session: u8 },
    Command { session: u8, command: FuzzCommand },
    FinishScan { completed: bool },
    FinishStale { scan_id: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzCommand {
    Start,
    Abort,
    ImgArea { x: f64, y: f64, width: f64, height: f64 },
    GetProjects { page: u32, per_page: u8 },
    Slider { slide: bool, name: u8, value: f64, range: Option<f64> },
    RotorCalibrate { steps: i64 },
    RotorDirection { invert: bool },
    SetHome { rotor: bool },
}

const SLIDERS: [&str; 12] = [
    "rotor",
    "turntable",
    "shutter",
    "brightness",
    "contrast",
    "saturation",
    "light",
    "imagesPerRevision",
    "rotorAnglesPerScan",
    "rotorAngleRangeToScan",
    "unknown",
    "",
];

impl FuzzCommand {
    fn into_command(self) -> Command {
        match self {
            Self::Start => Command::Start,
            Self::Abort => Command::Abort,
            Self::ImgArea { x, y, width, height } => {
                Command::ImgArea { rect: CropArea { x, y, width, height } }
            }
            Self::GetProjects { page, per_page } => {
                Command::GetProjects { page, per_page: u32::from(per_page) }
            }
            Self::Slider { slide, name, value, range } => Command::Slider {
                interaction: if slide { "slide".into() } else { "commit".into() },
                name: SLIDERS[usize::from(name) % SLIDERS.len()].to_string(),
                value: match range {
                    Some(high) => SliderValue::Range([value, high]),
                    None => SliderValue::Single(value),
                },
            },
            Self::RotorCalibrate { steps } => Command::RotorCalibrate { steps },
            Self::RotorDirection { invert } => Command::RotorCalibrateDirection { invert },
            Self::SetHome { rotor: true } => Command::RotorCalibrateSetHome,
            Self::SetHome { rotor: false } => Command::TurntableCalibrateSetHome,
        }
    }
}

fn replies(actions: &[ServerAction], session: u64, request: u32) -> usize {
    actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::Reply { request_id, .. },
                } if *session_id == session && *request_id == request
            )
        })
        .count()
}

fuzz_target!(|ops: Vec<Op>| {
    let mut driver = ServerDriver::new(
        MemoryCatalog::new(),
        MemoryConfig::default(),
        DriverConfig { max_connections: 8 },
    );
    let mut connected = HashSet::new();
    let mut running: Option<u64> = None;
    let mut request_id = 0u32;
    let addr = "127.0.0.1:4000".parse().expect("static address");

    for op in ops.into_iter().take(256) {
        let actions = match op {
            Op::Connect { session } => {
                let session = u64::from(session);
                let result = driver.process_event(ServerEvent::ConnectionAccepted {
                    session_id: session,
                    remote_addr: addr,
                });
                if connected.contains(&session) {
                    assert!(result.is_err());
                    continue;
                }
                let actions = result.expect("new session accepted");
                if driver.registry().has_session(session) {
                    connected.insert(session);
                }
                actions
            }
            Op::Close { session } => {
                let session = u64::from(session);
                connected.remove(&session);
                driver
                    .process_event(ServerEvent::ConnectionClosed {
                        session_id: session,
                        reason: "fuzz".into(),
                    })
                    .expect("close never errors")
            }
            Op::Command { session, command } => {
                let session = u64::from(session);
                request_id = request_id.wrapping_add(1);
                let result = driver.process_event(ServerEvent::CommandReceived {
                    session_id: session,
                    request_id,
                    command: command.into_command(),
                });
                if !connected.contains(&session) {
                    assert!(result.is_err());
                    continue;
                }
                let actions = result.expect("connected session");
                assert_eq!(replies(&actions, session, request_id), 1);
                actions
            }
            Op::FinishScan { completed } => {
                let Some(scan_id) = running.take() else { continue };
                let result = if completed {
                    Ok(ScanOutcome::Completed { project_id: ProjectId::new(scan_id) })
                } else {
                    Ok(ScanOutcome::Aborted)
                };
                driver
                    .process_event(ServerEvent::ScanFinished { scan_id, result })
                    .expect("finish never errors")
            }
            Op::FinishStale { scan_id } => {
                let scan_id = u64::from(scan_id);
                if running == Some(scan_id) {
                    continue;
                }
                driver
                    .process_event(ServerEvent::ScanFinished {
                        scan_id,
                        result: Ok(ScanOutcome::Aborted),
                    })
                    .expect("stale finish never errors")
            }
        };

        for action in &actions {
            if let ServerAction::RunScan { ticket, .. } = action {
                assert!(running.is_none(), "second scan started while one was running");
                running = Some(ticket.scan_id);
            }
        }

        assert_eq!(driver.scanning(), running.is_some());
        assert_eq!(driver.session_count(), connected.len());
    }
});
