//! Simulated entities and the arena that owns them.
//!
//! Objects reference each other only through [`ObjectId`] handles; the
//! arena maps handles to storage slots and is the directory deferred
//! handle resolution consults after a load. Handles are assigned
//! monotonically and never reused within a session, which is why the
//! assignment counter itself is part of the saved state.

use crate::ai::WorkerAiModule;
use crate::aura::AttributeModifierAura;
use crate::handle::ObjectLookup;
use crate::id::{ObjectId, ObjectKey, WeaponSlot};
use crate::persist::{Persist, PersistError, Persister};
use crate::production::QueueProductionExit;
use crate::template::{ObjectTemplate, TemplateError, TemplateSet};
use crate::weapon::Weapon;
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// GameObject
// ---------------------------------------------------------------------------

/// One simulated entity: a stable handle, the name of the template it was
/// built from, and its behavior modules. Module presence is decided by the
/// template at construction; only module *state* is ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub id: ObjectId,
    pub template_name: String,
    pub worker_ai: Option<WorkerAiModule>,
    pub weapons: [Option<Weapon>; 3],
    pub production_exit: Option<QueueProductionExit>,
    pub aura: Option<AttributeModifierAura>,
}

impl GameObject {
    /// Build a fresh object from its template. Weapon references were
    /// validated when the template set was built, but a template handed in
    /// from elsewhere may still dangle.
    pub fn from_template(
        id: ObjectId,
        template: &ObjectTemplate,
        templates: &TemplateSet,
    ) -> Result<Self, TemplateError> {
        let mut weapons: [Option<Weapon>; 3] = [None, None, None];
        for slot_template in &template.weapons {
            let weapon_template = templates.weapon(&slot_template.weapon).ok_or_else(|| {
                TemplateError::UnknownWeaponRef {
                    object: template.name.clone(),
                    weapon: slot_template.weapon.clone(),
                }
            })?;
            weapons[slot_template.slot.index()] =
                Some(Weapon::new(slot_template.slot, weapon_template));
        }

        Ok(Self {
            id,
            template_name: template.name.clone(),
            worker_ai: template.worker_ai.as_ref().map(WorkerAiModule::new),
            weapons,
            production_exit: template
                .production_exit
                .as_ref()
                .map(QueueProductionExit::new),
            aura: template.aura.as_ref().map(AttributeModifierAura::new),
        })
    }
}

impl Persist for GameObject {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;

        if let Some(worker_ai) = &mut self.worker_ai {
            p.persist_object("WorkerAi", worker_ai)?;
        }

        // The weapon set varies at runtime, so each slot carries a
        // presence flag. The other modules are template-determined and
        // written unconditionally.
        for slot in WeaponSlot::ALL {
            let has_weapon = self.weapons[slot.index()].is_some();
            let mut flag = has_weapon;
            p.persist_bool(&mut flag)?;
            if flag != has_weapon {
                return Err(PersistError::IdentityMismatch {
                    scope: p.scope_path(),
                    expected: format!("slot {:?} weapon present = {has_weapon}", slot),
                    found: format!("present = {flag}"),
                });
            }
            if let Some(weapon) = &mut self.weapons[slot.index()] {
                p.persist_object(format!("Weapon[{}]", slot.index()), weapon)?;
            }
        }

        if let Some(production_exit) = &mut self.production_exit {
            p.persist_object("ProductionExit", production_exit)?;
        }

        if let Some(aura) = &mut self.aura {
            p.persist_object("Aura", aura)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GameObjectArena
// ---------------------------------------------------------------------------

/// Entity storage: slotmap-backed objects plus a handle index. Iteration
/// is in ascending handle order, which is also the save-stream order.
#[derive(Debug)]
pub struct GameObjectArena {
    objects: SlotMap<ObjectKey, GameObject>,
    by_id: BTreeMap<ObjectId, ObjectKey>,
    next_id: u32,
}

impl Default for GameObjectArena {
    fn default() -> Self {
        Self::new()
    }
}

impl GameObjectArena {
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
            by_id: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Spawn a fresh object from a template, assigning the next handle.
    pub fn spawn(
        &mut self,
        template: &ObjectTemplate,
        templates: &TemplateSet,
    ) -> Result<ObjectId, TemplateError> {
        let id = ObjectId(self.next_id);
        let object = GameObject::from_template(id, template, templates)?;
        self.next_id += 1;
        let key = self.objects.insert(object);
        self.by_id.insert(id, key);
        Ok(id)
    }

    /// Insert an object reconstructed from a save stream under its saved
    /// handle. Duplicate handles are a corruption error.
    pub fn insert_loaded(&mut self, object: GameObject) -> Result<(), PersistError> {
        let id = object.id;
        if self.by_id.contains_key(&id) {
            return Err(PersistError::DuplicateObjectId(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        let key = self.objects.insert(object);
        self.by_id.insert(id, key);
        Ok(())
    }

    /// The handle the next spawn will receive. Saved so that a reloaded
    /// session keeps the no-reuse guarantee even when the highest-numbered
    /// objects died before the save.
    pub fn next_object_id(&self) -> u32 {
        self.next_id
    }

    /// Raise the assignment counter to at least `next_id`. Never lowers it.
    pub fn bump_next_object_id(&mut self, next_id: u32) {
        self.next_id = self.next_id.max(next_id);
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.by_id.get(&id).and_then(|key| self.objects.get(*key))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.by_id
            .get(&id)
            .and_then(|key| self.objects.get_mut(*key))
    }

    /// Remove an object. Its handle is never reassigned.
    pub fn despawn(&mut self, id: ObjectId) -> Option<GameObject> {
        let key = self.by_id.remove(&id)?;
        self.objects.remove(key)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Objects in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.by_id.values().filter_map(|key| self.objects.get(*key))
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.by_id.keys().copied()
    }
}

impl ObjectLookup for GameObjectArena {
    fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }
}

impl PartialEq for GameObjectArena {
    fn eq(&self, other: &Self) -> bool {
        self.next_id == other.next_id
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::WeaponTemplate;

    fn templates() -> TemplateSet {
        let mut set = TemplateSet::new();
        set.add_weapon(WeaponTemplate {
            name: "WorkerPistol".to_string(),
            clip_size: 6,
            attack_range: 90.0,
            pre_attack: Default::default(),
            clip_reload_time: Default::default(),
        })
        .unwrap();
        set.add_object(
            serde_json::from_str(
                r#"{ "name": "GLAWorker",
                     "worker_ai": {},
                     "weapons": [ { "slot": "primary", "weapon": "WorkerPistol" } ] }"#,
            )
            .unwrap(),
        )
        .unwrap();
        set
    }

    #[test]
    fn spawn_assigns_monotonic_handles() {
        let set = templates();
        let template = set.object("GLAWorker").unwrap().clone();
        let mut arena = GameObjectArena::new();

        let a = arena.spawn(&template, &set).unwrap();
        let b = arena.spawn(&template, &set).unwrap();
        assert_eq!(a, ObjectId(1));
        assert_eq!(b, ObjectId(2));
        assert_eq!(arena.len(), 2);
        assert!(arena.contains(a));
    }

    #[test]
    fn despawned_handles_are_not_reused() {
        let set = templates();
        let template = set.object("GLAWorker").unwrap().clone();
        let mut arena = GameObjectArena::new();

        let a = arena.spawn(&template, &set).unwrap();
        arena.despawn(a);
        let b = arena.spawn(&template, &set).unwrap();
        assert_ne!(a, b);
        assert!(!arena.contains(a));
    }

    #[test]
    fn insert_loaded_rejects_duplicates() {
        let set = templates();
        let template = set.object("GLAWorker").unwrap().clone();
        let object = GameObject::from_template(ObjectId(7), &template, &set).unwrap();

        let mut arena = GameObjectArena::new();
        arena.insert_loaded(object.clone()).unwrap();
        assert_eq!(arena.next_object_id(), 8);

        let err = arena.insert_loaded(object).unwrap_err();
        assert!(matches!(
            err,
            PersistError::DuplicateObjectId(ObjectId(7))
        ));
    }

    #[test]
    fn iteration_is_in_ascending_handle_order() {
        let set = templates();
        let template = set.object("GLAWorker").unwrap().clone();
        let mut arena = GameObjectArena::new();

        for id in [9, 3, 6] {
            let object = GameObject::from_template(ObjectId(id), &template, &set).unwrap();
            arena.insert_loaded(object).unwrap();
        }

        let ids: Vec<ObjectId> = arena.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![ObjectId(3), ObjectId(6), ObjectId(9)]);
    }

    #[test]
    fn object_aggregate_round_trip() {
        let set = templates();
        let template = set.object("GLAWorker").unwrap().clone();
        let mut object = GameObject::from_template(ObjectId(1), &template, &set).unwrap();

        if let Some(weapon) = &mut object.weapons[0] {
            weapon.current_target = ObjectId(2);
            weapon.rounds_in_clip = 3;
        }

        let mut p = Persister::writer();
        object.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;

        let mut restored = GameObject::from_template(ObjectId(1), &template, &set).unwrap();
        let mut p = Persister::reader(&bytes);
        restored.persist(&mut p).unwrap();
        assert_eq!(restored, object);
    }
}
