//! The attribute-modifier aura module: a periodic area effect that tracks
//! which nearby objects it is currently buffing.

use crate::frame::LogicFrame;
use crate::id::ObjectId;
use crate::module::UpdateBase;
use crate::persist::{Persist, PersistError, Persister};
use crate::template::AuraTemplate;

/// Aura runtime state. The affected-object list holds handles, not
/// references, so a save never has to order aura carriers after their
/// targets.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModifierAura {
    pub base: UpdateBase,
    pub active: bool,
    pub last_refresh_frame: LogicFrame,
    pub affected: Vec<ObjectId>,
}

impl AttributeModifierAura {
    pub fn new(template: &AuraTemplate) -> Self {
        Self {
            base: UpdateBase::default(),
            active: template.starts_active,
            last_refresh_frame: LogicFrame(0),
            affected: Vec::new(),
        }
    }
}

impl Persist for AttributeModifierAura {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        p.begin_object("Base");
        self.base.persist(p)?;
        p.end_object()?;

        p.persist_bool(&mut self.active)?;
        p.persist_frame(&mut self.last_refresh_frame)?;

        let mut count = self.affected.len() as u32;
        p.persist_u32(&mut count)?;
        if p.is_reading() {
            self.affected.clear();
            self.affected.resize(count as usize, ObjectId::NULL);
        }
        for id in &mut self.affected {
            p.persist_object_id(id)?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::LogicFrameSpan;

    fn banner_template() -> AuraTemplate {
        AuraTemplate {
            starts_active: true,
            refresh_delay: LogicFrameSpan(60),
            range: 150.0,
        }
    }

    #[test]
    fn aura_round_trip() {
        let mut aura = AttributeModifierAura::new(&banner_template());
        aura.base.next_update_frame = LogicFrame(360);
        aura.last_refresh_frame = LogicFrame(300);
        aura.affected = vec![ObjectId(2), ObjectId(3)];

        let mut p = Persister::writer();
        aura.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;

        let mut restored = AttributeModifierAura::new(&banner_template());
        let mut p = Persister::reader(&bytes);
        restored.persist(&mut p).unwrap();
        let out = p.finish().unwrap();

        assert_eq!(restored, aura);
        assert_eq!(out.pending.len(), 2);
    }

    #[test]
    fn inactive_aura_with_no_targets() {
        let mut aura = AttributeModifierAura::new(&banner_template());
        aura.active = false;

        let mut p = Persister::writer();
        aura.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;
        // aura version + base (version + frame) + flag + frame + count
        assert_eq!(bytes.len(), 1 + 5 + 1 + 4 + 4);

        let mut restored = AttributeModifierAura::new(&banner_template());
        let mut p = Persister::reader(&bytes);
        restored.persist(&mut p).unwrap();
        assert!(!restored.active);
        assert!(restored.affected.is_empty());
    }
}
