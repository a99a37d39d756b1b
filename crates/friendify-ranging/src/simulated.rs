//! Simulated ranging
//!
//! [`SimulatedSpace`] places devices in a shared 3D world. Each device gets a
//! [`SimulatedRangingEngine`] whose handles range against whichever device
//! issued the credential they run with. [`SimulatedSpace::emit_samples`]
//! produces one measurement per running handle; faults can be injected to
//! exercise the recovery paths.
//!
//! Device frames follow the usual handset convention: `-z` is straight ahead,
//! `+x` is right and `+y` is up. A device's yaw rotates its frame about the
//! vertical axis.

use crate::engine::{
    HandleId, RangingCapability, RangingEngine, RangingEvent, RangingHandle, RemovalReason,
    RunConfiguration,
};
use crate::error::{RangingError, RangingResult};
use friendify_core::{DiscoveryToken, EventSink, PeerId, RangingSample, Vector3};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::f32::consts::FRAC_PI_3;
use std::sync::Arc;
use tracing::debug;

/// Default field of view within which direction is measured, in radians
pub const DEFAULT_FIELD_OF_VIEW: f32 = 2.0 * FRAC_PI_3;

/// Default maximum range, in meters
pub const DEFAULT_MAX_RANGE_M: f32 = 9.0;

/// Position and heading of a device
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World position in meters
    pub position: Vector3,
    /// Rotation about the vertical axis in radians; positive turns right
    pub yaw: f32,
}

impl Pose {
    /// Pose facing `-z` at `position`
    pub fn at(position: Vector3) -> Self {
        Self { position, yaw: 0.0 }
    }

    fn to_local(&self, world: Vector3) -> Vector3 {
        let (sin, cos) = self.yaw.sin_cos();
        Vector3::new(
            world.x * cos + world.z * sin,
            world.y,
            -world.x * sin + world.z * cos,
        )
    }
}

/// Lifecycle fault to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Engine pauses
    Suspend,
    /// Engine may resume
    EndSuspension,
    /// Peer lapses
    Timeout,
    /// Session dies
    Invalidate,
    /// Peer ended its session
    PeerEnded,
}

#[derive(Debug)]
struct HandleState {
    owner: PeerId,
    local: DiscoveryToken,
    run: Option<RunConfiguration>,
}

struct SpaceState {
    field_of_view: f32,
    max_range_m: f32,
    next_handle: u64,
    poses: BTreeMap<PeerId, Pose>,
    sinks: HashMap<PeerId, EventSink<RangingEvent>>,
    handles: BTreeMap<HandleId, HandleState>,
}

impl SpaceState {
    fn credential_owner(&self, credential: &DiscoveryToken) -> Option<PeerId> {
        self.handles
            .values()
            .find(|h| &h.local == credential)
            .map(|h| h.owner)
    }

    fn measure(&self, observer: PeerId, target: PeerId) -> Option<RangingSample> {
        let from = self.poses.get(&observer)?;
        let to = self.poses.get(&target)?;
        let delta = to.position - from.position;
        let distance = delta.length();
        if distance > self.max_range_m {
            return None;
        }

        let local = from.to_local(delta).normalized();
        // Angle between the peer and straight ahead
        let off_axis = (-local.z).clamp(-1.0, 1.0).acos();
        let direction = (off_axis <= self.field_of_view / 2.0).then_some(local);
        Some(RangingSample {
            distance: Some(distance),
            direction,
        })
    }
}

/// Shared world for simulated engines
#[derive(Clone)]
pub struct SimulatedSpace {
    state: Arc<Mutex<SpaceState>>,
}

impl Default for SimulatedSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedSpace")
            .field("devices", &state.poses.len())
            .field("handles", &state.handles.len())
            .finish()
    }
}

impl SimulatedSpace {
    /// Empty space with default field of view and range
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SpaceState {
                field_of_view: DEFAULT_FIELD_OF_VIEW,
                max_range_m: DEFAULT_MAX_RANGE_M,
                next_handle: 0,
                poses: BTreeMap::new(),
                sinks: HashMap::new(),
                handles: BTreeMap::new(),
            })),
        }
    }

    /// Set the field of view in radians
    pub fn with_field_of_view(self, radians: f32) -> Self {
        self.state.lock().field_of_view = radians;
        self
    }

    /// Set the maximum range in meters
    pub fn with_max_range(self, meters: f32) -> Self {
        self.state.lock().max_range_m = meters;
        self
    }

    /// Engine for `device`, reporting into `sink`
    pub fn engine(
        &self,
        device: PeerId,
        sink: EventSink<RangingEvent>,
    ) -> SimulatedRangingEngine {
        let mut state = self.state.lock();
        state.poses.entry(device).or_default();
        state.sinks.insert(device, sink);
        SimulatedRangingEngine {
            space: self.clone(),
            device,
            capability: RangingCapability::Supported,
        }
    }

    /// Move `device`
    pub fn set_pose(&self, device: PeerId, pose: Pose) {
        self.state.lock().poses.insert(device, pose);
    }

    /// Move `device`, keeping its heading
    pub fn place(&self, device: PeerId, position: Vector3) {
        let mut state = self.state.lock();
        let pose = state.poses.entry(device).or_default();
        pose.position = position;
    }

    /// Current pose of `device`
    pub fn pose(&self, device: PeerId) -> Option<Pose> {
        self.state.lock().poses.get(&device).copied()
    }

    /// Live handles owned by `device`
    pub fn handles(&self, device: PeerId) -> Vec<HandleId> {
        self.state
            .lock()
            .handles
            .iter()
            .filter(|(_, h)| h.owner == device)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether `handle` has a run
    pub fn is_running(&self, handle: HandleId) -> bool {
        self.state
            .lock()
            .handles
            .get(&handle)
            .map(|h| h.run.is_some())
            .unwrap_or(false)
    }

    /// Emit one measurement for every running handle whose peer is in range.
    /// Returns how many were emitted.
    pub fn emit_samples(&self) -> usize {
        let state = self.state.lock();
        let mut emitted = 0;
        for (id, handle) in &state.handles {
            let Some(run) = &handle.run else { continue };
            let Some(target) = state.credential_owner(&run.peer_credential) else {
                continue;
            };
            let Some(sample) = state.measure(handle.owner, target) else {
                continue;
            };
            let Some(sink) = state.sinks.get(&handle.owner) else {
                continue;
            };
            sink.emit(RangingEvent::SamplesUpdated {
                handle: *id,
                credential: run.peer_credential.clone(),
                sample,
            });
            emitted += 1;
        }
        emitted
    }

    /// Inject `fault` into every handle owned by `device`. Returns how many
    /// handles were affected.
    pub fn inject(&self, device: PeerId, fault: Fault) -> usize {
        let mut state = self.state.lock();
        let affected: Vec<HandleId> = state
            .handles
            .iter()
            .filter(|(_, h)| h.owner == device)
            .map(|(id, _)| *id)
            .collect();

        for handle in &affected {
            let event = match fault {
                Fault::Suspend => RangingEvent::Suspended(*handle),
                Fault::EndSuspension => RangingEvent::SuspensionEnded(*handle),
                Fault::Timeout => RangingEvent::Removed {
                    handle: *handle,
                    reason: RemovalReason::Timeout,
                },
                Fault::PeerEnded => RangingEvent::Removed {
                    handle: *handle,
                    reason: RemovalReason::PeerEnded,
                },
                Fault::Invalidate => RangingEvent::Invalidated {
                    handle: *handle,
                    reason: "simulated invalidation".to_string(),
                },
            };
            // A lapsed or dead session stops measuring until it is run again
            if matches!(fault, Fault::Timeout | Fault::Invalidate | Fault::PeerEnded) {
                if let Some(entry) = state.handles.get_mut(handle) {
                    entry.run = None;
                }
            }
            if let Some(sink) = state.sinks.get(&device) {
                sink.emit(event);
            }
        }
        debug!(device = %device, ?fault, handles = affected.len(), "Injected ranging fault");
        affected.len()
    }
}

/// Ranging engine for one simulated device
#[derive(Debug)]
pub struct SimulatedRangingEngine {
    space: SimulatedSpace,
    device: PeerId,
    capability: RangingCapability,
}

impl SimulatedRangingEngine {
    /// Pretend the device has a different capability
    pub fn with_capability(mut self, capability: RangingCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Device this engine measures from
    pub fn device(&self) -> PeerId {
        self.device
    }
}

impl RangingEngine for SimulatedRangingEngine {
    fn capability(&self) -> RangingCapability {
        self.capability
    }

    fn create_handle(&mut self) -> RangingResult<RangingHandle> {
        match self.capability {
            RangingCapability::Supported => {}
            RangingCapability::AccessRequired => return Err(RangingError::AccessRequired),
            RangingCapability::Unsupported => return Err(RangingError::Unsupported),
        }

        let mut state = self.space.state.lock();
        state.next_handle += 1;
        let id = HandleId(state.next_handle);
        let local = DiscoveryToken::random();
        state.handles.insert(
            id,
            HandleState {
                owner: self.device,
                local: local.clone(),
                run: None,
            },
        );
        Ok(RangingHandle {
            id,
            local_credential: local,
        })
    }

    fn run(&mut self, handle: HandleId, config: &RunConfiguration) -> RangingResult<()> {
        let mut state = self.space.state.lock();
        match state.handles.get_mut(&handle) {
            Some(entry) if entry.owner == self.device => {
                entry.run = Some(config.clone());
                Ok(())
            }
            _ => Err(RangingError::UnknownHandle(handle)),
        }
    }

    fn invalidate(&mut self, handle: HandleId) {
        let mut state = self.space.state.lock();
        if state
            .handles
            .get(&handle)
            .map(|h| h.owner == self.device)
            .unwrap_or(false)
        {
            state.handles.remove(&handle);
        }
    }
}

impl Drop for SimulatedRangingEngine {
    fn drop(&mut self) {
        let mut state = self.space.state.lock();
        let device = self.device;
        state.handles.retain(|_, h| h.owner != device);
        state.sinks.remove(&device);
    }
}
