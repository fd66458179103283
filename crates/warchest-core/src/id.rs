use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a slot in the [`crate::object::GameObjectArena`] storage.
    /// Internal only -- never written to a save stream.
    pub struct ObjectKey;
}

/// Stable identity of a simulated entity, written to save streams as a raw
/// little-endian u32. Assigned monotonically at spawn and never reused
/// within a session; `ObjectId::NULL` (0) means "no object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The null reference. Always resolves to "no object" without deferral.
    pub const NULL: ObjectId = ObjectId(0);

    /// Whether this handle is the null reference.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Which weapon slot a weapon occupies on its owning object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSlot {
    Primary,
    Secondary,
    Tertiary,
}

impl WeaponSlot {
    /// All slots in persist order. This order is part of the wire format.
    pub const ALL: [WeaponSlot; 3] = [
        WeaponSlot::Primary,
        WeaponSlot::Secondary,
        WeaponSlot::Tertiary,
    ];

    /// Slot index into per-object weapon storage.
    pub fn index(self) -> usize {
        match self {
            WeaponSlot::Primary => 0,
            WeaponSlot::Secondary => 1,
            WeaponSlot::Tertiary => 2,
        }
    }
}
