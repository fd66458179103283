//! Declarative object templates loaded from JSON.
//!
//! Templates carry the static, per-module-kind configuration (clip sizes,
//! ranges, timing constants) that modules read once at construction. Only
//! an object's *mutable* state is ever persisted; its template is looked up
//! again by name at load time through the [`TemplateSet`] resolver.

use crate::frame::LogicFrameSpan;
use crate::id::WeaponSlot;
use crate::math::Vec3;
use serde::Deserialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while building a template set.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("duplicate template name: {0}")]
    DuplicateTemplate(String),
    #[error("object template {object:?} references unknown weapon template {weapon:?}")]
    UnknownWeaponRef { object: String, weapon: String },
}

// ---------------------------------------------------------------------------
// Per-module templates
// ---------------------------------------------------------------------------

/// Weapon configuration. The template name doubles as the defensive
/// identity re-read in the weapon's persisted aggregate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeaponTemplate {
    pub name: String,
    pub clip_size: u32,
    pub attack_range: f32,
    #[serde(default)]
    pub pre_attack: LogicFrameSpan,
    #[serde(default)]
    pub clip_reload_time: LogicFrameSpan,
}

/// A weapon assignment on an object template: which slot, which weapon.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeaponSlotTemplate {
    pub slot: WeaponSlot,
    pub weapon: String,
}

/// Worker AI configuration (supply gathering, construction, repair).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerAiTemplate {
    #[serde(default)]
    pub bored_time: LogicFrameSpan,
    #[serde(default)]
    pub upgraded_supply_boost: u32,
    #[serde(default)]
    pub repair_percent_per_second: f32,
    #[serde(default)]
    pub supply_warehouse_scan_distance: f32,
}

/// Production exit configuration: where produced units appear and where
/// they initially rally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductionExitTemplate {
    pub unit_create_point: Vec3,
    #[serde(default)]
    pub natural_rally_point: Option<Vec3>,
    #[serde(default)]
    pub exit_delay: LogicFrameSpan,
    #[serde(default)]
    pub initial_burst: u32,
}

/// Attribute-modifier aura configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuraTemplate {
    #[serde(default)]
    pub starts_active: bool,
    #[serde(default)]
    pub refresh_delay: LogicFrameSpan,
    pub range: f32,
}

// ---------------------------------------------------------------------------
// Object template
// ---------------------------------------------------------------------------

/// The full declarative definition of one object kind: which behavior
/// modules it carries and their static configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectTemplate {
    pub name: String,
    #[serde(default)]
    pub worker_ai: Option<WorkerAiTemplate>,
    #[serde(default)]
    pub weapons: Vec<WeaponSlotTemplate>,
    #[serde(default)]
    pub production_exit: Option<ProductionExitTemplate>,
    #[serde(default)]
    pub aura: Option<AuraTemplate>,
}

/// Top-level template file structure.
#[derive(Debug, Deserialize)]
struct TemplateData {
    #[serde(default)]
    weapons: Vec<WeaponTemplate>,
    #[serde(default)]
    objects: Vec<ObjectTemplate>,
}

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// The configuration resolver consulted when reconstructing entities from a
/// save stream. Frozen after loading; never itself persisted.
#[derive(Debug, Default)]
pub struct TemplateSet {
    objects: HashMap<String, ObjectTemplate>,
    weapons: HashMap<String, WeaponTemplate>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a template set from a JSON string. Weapon references are
    /// checked eagerly so a bad content file fails at startup, not at the
    /// first save.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let data: TemplateData = serde_json::from_str(json)?;
        let mut set = TemplateSet::new();
        for weapon in data.weapons {
            set.add_weapon(weapon)?;
        }
        for object in data.objects {
            set.add_object(object)?;
        }
        Ok(set)
    }

    pub fn add_weapon(&mut self, weapon: WeaponTemplate) -> Result<(), TemplateError> {
        if self.weapons.contains_key(&weapon.name) {
            return Err(TemplateError::DuplicateTemplate(weapon.name));
        }
        self.weapons.insert(weapon.name.clone(), weapon);
        Ok(())
    }

    pub fn add_object(&mut self, object: ObjectTemplate) -> Result<(), TemplateError> {
        if self.objects.contains_key(&object.name) {
            return Err(TemplateError::DuplicateTemplate(object.name));
        }
        for slot in &object.weapons {
            if !self.weapons.contains_key(&slot.weapon) {
                return Err(TemplateError::UnknownWeaponRef {
                    object: object.name.clone(),
                    weapon: slot.weapon.clone(),
                });
            }
        }
        self.objects.insert(object.name.clone(), object);
        Ok(())
    }

    pub fn object(&self, name: &str) -> Option<&ObjectTemplate> {
        self.objects.get(name)
    }

    pub fn weapon(&self, name: &str) -> Option<&WeaponTemplate> {
        self.weapons.get(name)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "weapons": [
            { "name": "WorkerPistol", "clip_size": 6, "attack_range": 90.0,
              "pre_attack": 4, "clip_reload_time": 30 }
        ],
        "objects": [
            {
                "name": "GLAWorker",
                "worker_ai": { "bored_time": 150, "upgraded_supply_boost": 10 },
                "weapons": [ { "slot": "primary", "weapon": "WorkerPistol" } ]
            },
            {
                "name": "Barracks",
                "production_exit": {
                    "unit_create_point": { "x": 12.0, "y": 0.0, "z": 0.0 },
                    "exit_delay": 30
                }
            }
        ]
    }"#;

    #[test]
    fn loads_templates_from_json() {
        let set = TemplateSet::from_json(SAMPLE).unwrap();
        assert_eq!(set.object_count(), 2);

        let worker = set.object("GLAWorker").unwrap();
        assert!(worker.worker_ai.is_some());
        assert_eq!(worker.weapons.len(), 1);
        assert_eq!(worker.weapons[0].slot, WeaponSlot::Primary);

        let pistol = set.weapon("WorkerPistol").unwrap();
        assert_eq!(pistol.clip_size, 6);
        assert_eq!(pistol.pre_attack, LogicFrameSpan(4));
    }

    #[test]
    fn unknown_weapon_reference_is_rejected() {
        let json = r#"{
            "objects": [
                { "name": "Tank",
                  "weapons": [ { "slot": "primary", "weapon": "Missing" } ] }
            ]
        }"#;
        let err = TemplateSet::from_json(json).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownWeaponRef { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let json = r#"{
            "objects": [ { "name": "Tank" }, { "name": "Tank" } ]
        }"#;
        let err = TemplateSet::from_json(json).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateTemplate(name) if name == "Tank"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = TemplateSet::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TemplateError::JsonParse(_)));
    }
}
