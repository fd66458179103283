//! AI behavior modules: the general AI layer, the supply-gathering layer,
//! and the worker (dozer) specialization.
//!
//! The three layers compose through explicit `"Base"` sub-scopes: the
//! worker's persisted aggregate wraps the supply layer's, which wraps the
//! general layer's. Each layer owns its state machines and scalar fields in
//! a fixed order that is part of the wire format.

use crate::frame::LogicFrame;
use crate::id::ObjectId;
use crate::math::Vec3;
use crate::persist::{Persist, PersistError, Persister};
use crate::state::{State, StateId, StateMachine};
use crate::template::WorkerAiTemplate;

// ---------------------------------------------------------------------------
// General AI layer
// ---------------------------------------------------------------------------

/// States of the general AI task machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AiState {
    /// No current task.
    Idle,
    /// Moving toward a position, optionally tracking a goal object.
    MoveToward {
        goal_position: Vec3,
        goal_object: ObjectId,
    },
    /// Leaving a container object (transport, building).
    ExitContainer { container: ObjectId },
}

impl AiState {
    pub const IDLE: StateId = StateId(0);
    pub const MOVE_TOWARD: StateId = StateId(1);
    pub const EXIT_CONTAINER: StateId = StateId(2);
}

impl State for AiState {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        match self {
            AiState::Idle => {
                p.persist_version(1)?;
                Ok(())
            }
            AiState::MoveToward {
                goal_position,
                goal_object,
            } => {
                p.persist_version(1)?;
                p.persist_vec3(goal_position)?;
                p.persist_object_id(goal_object)
            }
            AiState::ExitContainer { container } => {
                p.persist_version(1)?;
                p.persist_object_id(container)
            }
        }
    }
}

fn ai_state_machine() -> StateMachine<AiState> {
    StateMachine::new(
        1,
        vec![
            (AiState::IDLE, AiState::Idle),
            (
                AiState::MOVE_TOWARD,
                AiState::MoveToward {
                    goal_position: Vec3::ZERO,
                    goal_object: ObjectId::NULL,
                },
            ),
            (
                AiState::EXIT_CONTAINER,
                AiState::ExitContainer {
                    container: ObjectId::NULL,
                },
            ),
        ],
        AiState::IDLE,
    )
}

/// The general AI layer every AI-capable object carries: one task machine.
#[derive(Debug, Clone, PartialEq)]
pub struct AiModule {
    pub state_machine: StateMachine<AiState>,
}

impl AiModule {
    pub fn new() -> Self {
        Self {
            state_machine: ai_state_machine(),
        }
    }
}

impl Default for AiModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for AiModule {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;
        p.persist_object("StateMachine", &mut self.state_machine)
    }
}

// ---------------------------------------------------------------------------
// Supply-gathering layer
// ---------------------------------------------------------------------------

/// Where a supply gatherer is in its collect/deliver loop. Persisted as a
/// raw u32; unknown values are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyGatherState {
    Default = 0,
    SearchingForSource = 1,
    ApproachingSource = 2,
    GatheringSupplies = 3,
    PickingUpSupplies = 4,
    SearchingForTarget = 5,
    ApproachingTarget = 6,
    DeliveringSupplies = 7,
}

impl SupplyGatherState {
    fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Default,
            1 => Self::SearchingForSource,
            2 => Self::ApproachingSource,
            3 => Self::GatheringSupplies,
            4 => Self::PickingUpSupplies,
            5 => Self::SearchingForTarget,
            6 => Self::ApproachingTarget,
            7 => Self::DeliveringSupplies,
            _ => return None,
        })
    }
}

fn persist_gather_state(
    p: &mut Persister<'_>,
    value: &mut SupplyGatherState,
) -> Result<(), PersistError> {
    let mut raw = *value as u32;
    p.persist_u32(&mut raw)?;
    match SupplyGatherState::from_raw(raw) {
        Some(state) => {
            *value = state;
            Ok(())
        }
        None => Err(PersistError::OutOfRange {
            scope: p.scope_path(),
            what: "supply gather state",
            value: raw,
        }),
    }
}

/// The supply-gathering layer: tracks the warehouse/depot pair the
/// gatherer is shuttling between and how far through the loop it is.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyAiModule {
    pub base: AiModule,
    pub gather_state: SupplyGatherState,
    pub gather_state_to_resume: SupplyGatherState,
    pub current_supply_target: ObjectId,
    pub current_supply_source: ObjectId,
    pub wait_until: LogicFrame,
    pub boxes_carried: u32,
}

impl SupplyAiModule {
    pub fn new() -> Self {
        Self {
            base: AiModule::new(),
            gather_state: SupplyGatherState::Default,
            gather_state_to_resume: SupplyGatherState::Default,
            current_supply_target: ObjectId::NULL,
            current_supply_source: ObjectId::NULL,
            wait_until: LogicFrame(0),
            boxes_carried: 0,
        }
    }
}

impl Default for SupplyAiModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for SupplyAiModule {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.base.persist(p)?;
        p.end_object()?;

        persist_gather_state(p, &mut self.gather_state)?;
        persist_gather_state(p, &mut self.gather_state_to_resume)?;
        p.persist_object_id(&mut self.current_supply_target)?;
        p.persist_object_id(&mut self.current_supply_source)?;
        p.persist_frame(&mut self.wait_until)?;
        p.persist_u32(&mut self.boxes_carried)
    }
}

// ---------------------------------------------------------------------------
// Dozer task block
// ---------------------------------------------------------------------------

/// States of the dozer construction-task machine.
#[derive(Debug, Clone, PartialEq)]
pub enum DozerTaskState {
    /// Actively working a construction/repair action.
    TaskActive {
        action_frames: i32,
        frames_remaining: i32,
        action_started: bool,
    },
    /// Stalled waiting for the site to clear. Most of this state's layout
    /// is unrecovered; the widths and the embedded constant are pinned by
    /// fixture.
    TaskStalled {
        reserved_head: [u8; 4],
        reserved_tail: [u8; 1],
    },
}

impl DozerTaskState {
    pub const ACTIVE: StateId = StateId(0);
    pub const STALLED: StateId = StateId(1);

    /// The constant embedded in the stalled state's payload. A different
    /// value means the stream desynced somewhere before this point.
    const STALLED_SENTINEL: i32 = 1;
}

impl State for DozerTaskState {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        match self {
            DozerTaskState::TaskActive {
                action_frames,
                frames_remaining,
                action_started,
            } => {
                p.persist_version(1)?;
                p.persist_i32(action_frames)?;
                p.persist_i32(frames_remaining)?;
                p.persist_bool(action_started)
            }
            DozerTaskState::TaskStalled {
                reserved_head,
                reserved_tail,
            } => {
                p.persist_version(1)?;
                p.persist_reserved(reserved_head)?;

                let mut sentinel = Self::STALLED_SENTINEL;
                p.persist_i32(&mut sentinel)?;
                if sentinel != Self::STALLED_SENTINEL {
                    return Err(PersistError::IdentityMismatch {
                        scope: p.scope_path(),
                        expected: Self::STALLED_SENTINEL.to_string(),
                        found: sentinel.to_string(),
                    });
                }

                p.persist_reserved(reserved_tail)
            }
        }
    }
}

fn dozer_task_machine() -> StateMachine<DozerTaskState> {
    StateMachine::new(
        1,
        vec![
            (
                DozerTaskState::ACTIVE,
                DozerTaskState::TaskActive {
                    action_frames: 0,
                    frames_remaining: 0,
                    action_started: false,
                },
            ),
            (
                DozerTaskState::STALLED,
                DozerTaskState::TaskStalled {
                    reserved_head: [0; 4],
                    reserved_tail: [0; 1],
                },
            ),
        ],
        DozerTaskState::ACTIVE,
    )
}

/// The dozer construction-task block a worker carries: the task machine
/// plus the building under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DozerTask {
    pub state_machine: StateMachine<DozerTaskState>,
    pub build_target: ObjectId,
}

impl DozerTask {
    pub fn new() -> Self {
        Self {
            state_machine: dozer_task_machine(),
            build_target: ObjectId::NULL,
        }
    }
}

impl Default for DozerTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for DozerTask {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;
        p.persist_object("StateMachine", &mut self.state_machine)?;
        p.persist_object_id(&mut self.build_target)
    }
}

// ---------------------------------------------------------------------------
// Supply dock machine
// ---------------------------------------------------------------------------

/// States of the warehouse-dock machine. The first two are pure markers;
/// the last three carry a version tag reserved for future fields. The
/// asymmetry matches what real saves contain and is preserved as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum SupplyDockState {
    Searching,
    Approaching,
    Queued,
    Docking,
    Leaving,
}

impl SupplyDockState {
    pub const SEARCHING: StateId = StateId(0);
    pub const APPROACHING: StateId = StateId(1);
    pub const QUEUED: StateId = StateId(2);
    pub const DOCKING: StateId = StateId(3);
    pub const LEAVING: StateId = StateId(4);
}

impl State for SupplyDockState {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        match self {
            SupplyDockState::Searching | SupplyDockState::Approaching => Ok(()),
            SupplyDockState::Queued | SupplyDockState::Docking | SupplyDockState::Leaving => {
                p.persist_version(1)?;
                Ok(())
            }
        }
    }
}

/// The worker's warehouse-dock machine, wrapped in its own version scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyDockMachine {
    pub machine: StateMachine<SupplyDockState>,
}

impl SupplyDockMachine {
    pub fn new() -> Self {
        Self {
            machine: StateMachine::new(
                1,
                vec![
                    (SupplyDockState::SEARCHING, SupplyDockState::Searching),
                    (SupplyDockState::APPROACHING, SupplyDockState::Approaching),
                    (SupplyDockState::QUEUED, SupplyDockState::Queued),
                    (SupplyDockState::DOCKING, SupplyDockState::Docking),
                    (SupplyDockState::LEAVING, SupplyDockState::Leaving),
                ],
                SupplyDockState::SEARCHING,
            ),
        }
    }
}

impl Default for SupplyDockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for SupplyDockMachine {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.machine.persist(p)?;
        p.end_object()
    }
}

// ---------------------------------------------------------------------------
// Escort machine
// ---------------------------------------------------------------------------

/// States of the worker's escort machine. Both states persist nothing at
/// all -- not even a version tag -- unlike the dock machine's versioned
/// states. The difference is what real saves contain; it is never
/// normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum EscortState {
    Detached,
    Following,
}

impl EscortState {
    pub const DETACHED: StateId = StateId(0);
    pub const FOLLOWING: StateId = StateId(1);
}

impl State for EscortState {
    fn persist(&mut self, _p: &mut Persister<'_>) -> Result<(), PersistError> {
        Ok(())
    }
}

/// The worker's escort machine, wrapped in its own version scope.
#[derive(Debug, Clone, PartialEq)]
pub struct EscortMachine {
    pub machine: StateMachine<EscortState>,
}

impl EscortMachine {
    pub fn new() -> Self {
        Self {
            machine: StateMachine::new(
                1,
                vec![
                    (EscortState::DETACHED, EscortState::Detached),
                    (EscortState::FOLLOWING, EscortState::Following),
                ],
                EscortState::DETACHED,
            ),
        }
    }
}

impl Default for EscortMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for EscortMachine {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.machine.persist(p)?;
        p.end_object()
    }
}

// ---------------------------------------------------------------------------
// Worker specialization
// ---------------------------------------------------------------------------

/// The worker AI module: the supply layer plus dozer construction, dock
/// queueing, repair and escort state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAiModule {
    pub base: SupplyAiModule,
    pub dozer: DozerTask,
    pub dock_machine: SupplyDockMachine,
    pub repair_target: ObjectId,
    pub repair_ticks: i32,
    reserved: [u8; 1],
    pub escort_machine: EscortMachine,

    /// From the template; not persisted.
    pub bored_time: crate::frame::LogicFrameSpan,
}

impl WorkerAiModule {
    pub fn new(template: &WorkerAiTemplate) -> Self {
        Self {
            base: SupplyAiModule::new(),
            dozer: DozerTask::new(),
            dock_machine: SupplyDockMachine::new(),
            repair_target: ObjectId::NULL,
            repair_ticks: 0,
            reserved: [0; 1],
            escort_machine: EscortMachine::new(),
            bored_time: template.bored_time,
        }
    }
}

impl Persist for WorkerAiModule {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.base.persist(p)?;
        p.end_object()?;

        self.dozer.persist(p)?;

        p.persist_object("SupplyDock", &mut self.dock_machine)?;
        p.persist_object_id(&mut self.repair_target)?;
        p.persist_i32(&mut self.repair_ticks)?;

        p.persist_reserved(&mut self.reserved)?;

        p.persist_object("Escort", &mut self.escort_machine)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
