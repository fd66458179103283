//! Shared layering for behavior modules.
//!
//! A specialized module's wire layout extends a general one's by explicit
//! composition: the specialized persist routine opens a `"Base"` sub-scope
//! and calls the general layer's persist routine inside it, so the layered
//! layout is visible as data rather than as a class hierarchy.

use crate::frame::LogicFrame;
use crate::persist::{Persist, PersistError, Persister};

/// The state every periodically-updated module shares: the frame at which
/// the module next wants to run. Persisted as its own versioned aggregate
/// inside the owning module's `"Base"` scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBase {
    pub next_update_frame: LogicFrame,
}

impl Persist for UpdateBase {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;
        p.persist_frame(&mut self.next_update_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_base_round_trip() {
        let mut base = UpdateBase {
            next_update_frame: LogicFrame(900),
        };

        let mut p = Persister::writer();
        base.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;
        assert_eq!(bytes.len(), 1 + 4);

        let mut restored = UpdateBase::default();
        let mut p = Persister::reader(&bytes);
        restored.persist(&mut p).unwrap();
        assert_eq!(restored, base);
    }
}
