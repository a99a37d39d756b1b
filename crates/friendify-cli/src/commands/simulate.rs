//! Multi-device proximity simulation
//!
//! Device 0 stands still at the origin. Every other device starts on a
//! circle around it, faces it, and walks toward it a little each tick. All
//! devices discover each other over a [`MemoryNetwork`] and range through a
//! shared [`SimulatedSpace`]; after each tick every device's view is printed.

use anyhow::{bail, Result};
use clap::Args;
use friendify_app::{Inbox, OrchestratorHandle, PeerSummary, SessionOrchestrator};
use friendify_core::{
    Classification, Direction, EventSink, FriendifyConfig, PeerId, SessionState, Vector3,
};
use friendify_ranging::{Pose, SimulatedSpace};
use friendify_transport::{DiscoveryPolicy, MemoryNetwork, PeerTransport, TransportEvent};
use serde::Serialize;
use std::f32::consts::TAU;
use std::time::Duration;
use tracing::{debug, info};

/// Closest a walker gets to the stationary device, in meters
const MIN_DISTANCE_M: f32 = 0.15;

/// Simulation parameters
#[derive(Args, Debug, Clone)]
pub struct SimulateCommand {
    /// Number of devices, including the stationary one
    #[arg(short = 'n', long, default_value = "2")]
    pub devices: u8,

    /// Number of ticks to run
    #[arg(short, long, default_value = "20")]
    pub ticks: u32,

    /// Meters each walker moves per tick
    #[arg(long, default_value = "0.25")]
    pub step: f32,

    /// Starting distance of the walkers in meters
    #[arg(long, default_value = "4.0")]
    pub start_distance: f32,

    /// Milliseconds between ticks
    #[arg(long, default_value = "50")]
    pub tick_ms: u64,

    /// Print one JSON document per tick instead of text
    #[arg(long)]
    pub json: bool,
}

struct Device {
    id: PeerId,
    name: String,
    handle: OrchestratorHandle,
}

/// One device's view after a tick
#[derive(Debug, Serialize)]
struct DeviceReport {
    name: String,
    state: SessionState,
    position_shared: bool,
    focus: Classification,
    peers: Vec<PeerSummary>,
}

/// Every device's view after a tick
#[derive(Debug, Serialize)]
struct TickReport {
    tick: u32,
    devices: Vec<DeviceReport>,
}

/// Run the simulation
pub async fn handle_simulate_command(cmd: SimulateCommand, config: &FriendifyConfig) -> Result<()> {
    if cmd.devices < 2 {
        bail!("a simulation needs at least 2 devices, got {}", cmd.devices);
    }
    if !(cmd.step > 0.0 && cmd.start_distance > MIN_DISTANCE_M) {
        bail!("step must be positive and start distance above {MIN_DISTANCE_M} m");
    }

    let network = MemoryNetwork::new();
    let space = SimulatedSpace::new();
    let walkers = usize::from(cmd.devices) - 1;

    let mut devices = Vec::with_capacity(usize::from(cmd.devices));
    for index in 0..cmd.devices {
        let device = spawn_device(&network, &space, config, index, walkers)?;
        space.set_pose(device.id, starting_pose(index, walkers, cmd.start_distance));
        devices.push(device);
    }
    info!(devices = devices.len(), ticks = cmd.ticks, "Simulation started");

    for device in &devices {
        device.handle.connect();
    }

    let tick_interval = Duration::from_millis(cmd.tick_ms);
    for tick in 1..=cmd.ticks {
        for device in devices.iter().skip(1) {
            walk(&space, device.id, cmd.step);
        }
        let emitted = space.emit_samples();
        tokio::time::sleep(tick_interval).await;

        let report = TickReport {
            tick,
            devices: devices.iter().map(device_report).collect(),
        };
        debug!(tick, emitted, "Tick complete");
        if cmd.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_text(&report);
        }
    }

    for device in devices {
        device.handle.shutdown().await;
    }
    info!("Simulation finished");
    Ok(())
}

fn spawn_device(
    network: &MemoryNetwork,
    space: &SimulatedSpace,
    base: &FriendifyConfig,
    index: u8,
    max_peers: usize,
) -> Result<Device> {
    let id = PeerId::new();
    let name = format!("{} {index}", base.device.display_name);
    let config = base
        .clone()
        .with_display_name(name.clone())
        .with_max_peers(max_peers);

    let (inbox, rx) = Inbox::new();
    let engine = space.engine(id, inbox.ranging_sink());

    let network = network.clone();
    let advertised = name.clone();
    let policy = DiscoveryPolicy::from_config(&config.transport);
    let factory = move |sink: EventSink<TransportEvent>| -> Box<dyn PeerTransport> {
        Box::new(network.join_as(id, advertised.clone(), policy.clone(), sink))
    };

    let orchestrator = SessionOrchestrator::new(&config, factory, Box::new(engine), inbox)?;
    Ok(Device {
        id,
        name,
        handle: orchestrator.spawn(rx),
    })
}

/// Device 0 at the origin; walkers evenly spaced on a circle, facing it
fn starting_pose(index: u8, walkers: usize, radius: f32) -> Pose {
    if index == 0 {
        return Pose::default();
    }
    let angle = TAU * f32::from(index - 1) / walkers as f32;
    Pose {
        position: Vector3::new(radius * angle.sin(), 0.0, radius * angle.cos()),
        yaw: -angle,
    }
}

/// Move `device` `step` meters toward the origin, keeping its heading
fn walk(space: &SimulatedSpace, device: PeerId, step: f32) {
    let Some(pose) = space.pose(device) else {
        return;
    };
    let distance = pose.position.length();
    if distance <= MIN_DISTANCE_M {
        return;
    }
    let next = (distance - step).max(MIN_DISTANCE_M);
    space.set_pose(
        device,
        Pose {
            position: pose.position * (next / distance),
            yaw: pose.yaw,
        },
    );
}

fn device_report(device: &Device) -> DeviceReport {
    let snapshot = device.handle.view().snapshot();
    DeviceReport {
        name: device.name.clone(),
        state: snapshot.state,
        position_shared: snapshot.position_shared,
        focus: snapshot.focus,
        peers: snapshot.peers,
    }
}

fn print_text(report: &TickReport) {
    println!("tick {}", report.tick);
    for device in &report.devices {
        let orientation = device.focus.orientation;
        println!(
            "  {} [{}] focus: {}, angle {:+.2} rad, {} {}{}",
            device.name,
            device.state,
            device.focus.state,
            orientation.rotation_angle,
            indicator(orientation.azimuth),
            indicator(orientation.elevation),
            if device.position_shared { ", position shared" } else { "" },
        );
        for peer in &device.peers {
            let distance = peer
                .distance
                .map(|d| format!("{d:.2} m"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    {:<20} {:>8}  {}",
                peer.display_name, distance, peer.classification.state
            );
        }
    }
}

fn indicator(direction: Option<Direction>) -> String {
    direction.map_or_else(|| "-".to_string(), |d| d.to_string())
}
