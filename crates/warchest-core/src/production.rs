//! The production-exit module: the queue of finished units waiting to step
//! out of a factory, the exit pacing timer, and the rally point they walk to.

use crate::frame::LogicFrameSpan;
use crate::id::ObjectId;
use crate::math::Vec3;
use crate::module::UpdateBase;
use crate::persist::{Persist, PersistError, Persister};
use crate::template::ProductionExitTemplate;

// ---------------------------------------------------------------------------
// RallyPointManager
// ---------------------------------------------------------------------------

/// The player-set rally point for a production structure, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RallyPointManager {
    pub rally_point: Option<Vec3>,
}

impl Persist for RallyPointManager {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        let mut has_rally_point = self.rally_point.is_some();
        p.persist_bool(&mut has_rally_point)?;
        if has_rally_point {
            let point = self.rally_point.get_or_insert(Vec3::ZERO);
            p.persist_vec3(point)?;
        } else {
            self.rally_point = None;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QueueProductionExit
// ---------------------------------------------------------------------------

/// Exit handling for factories that release finished units one at a time
/// through a single door.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueProductionExit {
    pub base: UpdateBase,
    /// Frames left before the next queued unit may step out.
    pub exit_delay_remaining: LogicFrameSpan,
    /// Finished units waiting to exit, in production order.
    pub exit_queue: Vec<ObjectId>,
    pub rally_point_manager: RallyPointManager,
    reserved: [u8; 8],

    /// From the template; not persisted.
    pub unit_create_point: Vec3,
}

impl QueueProductionExit {
    pub fn new(template: &ProductionExitTemplate) -> Self {
        Self {
            base: UpdateBase::default(),
            exit_delay_remaining: LogicFrameSpan(0),
            exit_queue: Vec::new(),
            rally_point_manager: RallyPointManager {
                rally_point: template.natural_rally_point,
            },
            reserved: [0; 8],
            unit_create_point: template.unit_create_point,
        }
    }
}

impl Persist for QueueProductionExit {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.base.persist(p)?;
        p.end_object()?;

        p.persist_frame_span(&mut self.exit_delay_remaining)?;

        let mut count = self.exit_queue.len() as u32;
        p.persist_u32(&mut count)?;
        if p.is_reading() {
            self.exit_queue.clear();
            self.exit_queue.resize(count as usize, ObjectId::NULL);
        }
        for id in &mut self.exit_queue {
            p.persist_object_id(id)?;
        }

        p.persist_object("RallyPointManager", &mut self.rally_point_manager)?;

        p.persist_reserved(&mut self.reserved)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
