//! The per-slot weapon module: clip/reload bookkeeping, firing frames,
//! the current target handle, and the fire-cycle state machine.
//!
//! The weapon aggregate is at layout version 3. Versions 1 and 2 end before
//! the two trailing flags; the reader branches on the stored version, the
//! writer always emits the current layout. The aggregate re-reads its
//! template name defensively -- a mismatch means the stream desynced
//! somewhere earlier (usually a wrong reserved-region width).

use crate::frame::{LogicFrame, LogicFrameSpan};
use crate::id::{ObjectId, WeaponSlot};
use crate::persist::{Persist, PersistError, Persister};
use crate::state::{State, StateId, StateMachine};
use crate::template::WeaponTemplate;

// ---------------------------------------------------------------------------
// Fire-cycle states
// ---------------------------------------------------------------------------

/// States of the weapon fire cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WeaponState {
    /// Holstered / no target.
    Inactive,
    /// Winding up before the first shot.
    PreAttack { frames_remaining: LogicFrameSpan },
    /// Mid-burst. Most of this state's payload is unrecovered; the widths
    /// and the embedded constant are pinned by fixture.
    Firing {
        reserved_head: [u8; 4],
        reserved_tail: [u8; 1],
    },
    /// Waiting out a clip reload.
    Reloading { reload_done_frame: LogicFrame },
}

impl WeaponState {
    pub const INACTIVE: StateId = StateId(0);
    pub const PRE_ATTACK: StateId = StateId(1);
    pub const FIRING: StateId = StateId(2);
    pub const RELOADING: StateId = StateId(3);

    const FIRING_SENTINEL: i32 = 1;
}

impl State for WeaponState {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        match self {
            WeaponState::Inactive => Ok(()),
            WeaponState::PreAttack { frames_remaining } => {
                p.persist_version(1)?;
                p.persist_frame_span(frames_remaining)
            }
            WeaponState::Firing {
                reserved_head,
                reserved_tail,
            } => {
                p.persist_version(1)?;
                p.persist_reserved(reserved_head)?;

                let mut sentinel = Self::FIRING_SENTINEL;
                p.persist_i32(&mut sentinel)?;
                if sentinel != Self::FIRING_SENTINEL {
                    return Err(PersistError::IdentityMismatch {
                        scope: p.scope_path(),
                        expected: Self::FIRING_SENTINEL.to_string(),
                        found: sentinel.to_string(),
                    });
                }

                p.persist_reserved(reserved_tail)
            }
            WeaponState::Reloading { reload_done_frame } => {
                p.persist_version(1)?;
                p.persist_frame(reload_done_frame)
            }
        }
    }
}

fn weapon_state_machine() -> StateMachine<WeaponState> {
    StateMachine::new(
        1,
        vec![
            (WeaponState::INACTIVE, WeaponState::Inactive),
            (
                WeaponState::PRE_ATTACK,
                WeaponState::PreAttack {
                    frames_remaining: LogicFrameSpan(0),
                },
            ),
            (
                WeaponState::FIRING,
                WeaponState::Firing {
                    reserved_head: [0; 4],
                    reserved_tail: [0; 1],
                },
            ),
            (
                WeaponState::RELOADING,
                WeaponState::Reloading {
                    reload_done_frame: LogicFrame(0),
                },
            ),
        ],
        WeaponState::INACTIVE,
    )
}

// ---------------------------------------------------------------------------
// Weapon
// ---------------------------------------------------------------------------

/// One weapon occupying one slot on its owning object.
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub slot: WeaponSlot,
    /// Template identity, re-read defensively from the stream.
    pub template_name: String,

    pub rounds_in_clip: u32,
    pub shots_fired: u32,
    pub barrel_index: u32,
    pub next_shot_frame: LogicFrame,
    reserved_a: [u8; 4],
    pub pre_attack_done_frame: LogicFrame,
    pub clip_reload_done_frame: LogicFrame,
    pub last_fire_frame: LogicFrame,
    pub current_target: ObjectId,
    reserved_b: [u8; 4],
    pub burst_shots_left: u32,
    pub continuous_fire_shots: u32,
    pub continuous_fire_expiry: u32,
    reserved_c: [u8; 2],
    pub leech_range_active: bool,
    pub pitch_limited: bool,

    pub state_machine: StateMachine<WeaponState>,
}

/// Current weapon aggregate layout version. Version 3 added the two
/// trailing flags.
const WEAPON_VERSION: u8 = 3;

impl Weapon {
    /// Construct a weapon for a slot with a full clip, per its template.
    pub fn new(slot: WeaponSlot, template: &WeaponTemplate) -> Self {
        Self {
            slot,
            template_name: template.name.clone(),
            rounds_in_clip: template.clip_size,
            shots_fired: 0,
            barrel_index: 0,
            next_shot_frame: LogicFrame(0),
            reserved_a: [0; 4],
            pre_attack_done_frame: LogicFrame(0),
            clip_reload_done_frame: LogicFrame(0),
            last_fire_frame: LogicFrame(0),
            current_target: ObjectId::NULL,
            reserved_b: [0; 4],
            burst_shots_left: 0,
            continuous_fire_shots: 0,
            continuous_fire_expiry: 0,
            reserved_c: [0; 2],
            leech_range_active: false,
            pitch_limited: false,
            state_machine: weapon_state_machine(),
        }
    }
}

impl Persist for Weapon {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        let version = p.persist_version(WEAPON_VERSION)?;

        let mut name = self.template_name.clone();
        p.persist_ascii_string(&mut name)?;
        if name != self.template_name {
            return Err(PersistError::IdentityMismatch {
                scope: p.scope_path(),
                expected: self.template_name.clone(),
                found: name,
            });
        }

        p.persist_u32(&mut self.rounds_in_clip)?;
        p.persist_u32(&mut self.shots_fired)?;
        p.persist_u32(&mut self.barrel_index)?;
        p.persist_frame(&mut self.next_shot_frame)?;

        p.persist_reserved(&mut self.reserved_a)?;

        p.persist_frame(&mut self.pre_attack_done_frame)?;
        p.persist_frame(&mut self.clip_reload_done_frame)?;
        p.persist_frame(&mut self.last_fire_frame)?;
        p.persist_object_id(&mut self.current_target)?;

        p.persist_reserved(&mut self.reserved_b)?;

        p.persist_u32(&mut self.burst_shots_left)?;
        p.persist_u32(&mut self.continuous_fire_shots)?;
        p.persist_u32(&mut self.continuous_fire_expiry)?;

        p.persist_reserved(&mut self.reserved_c)?;

        if version >= 3 {
            p.persist_bool(&mut self.leech_range_active)?;
            p.persist_bool(&mut self.pitch_limited)?;
        }

        p.persist_object("StateMachine", &mut self.state_machine)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pistol_template() -> WeaponTemplate {
        WeaponTemplate {
            name: "WorkerPistol".to_string(),
            clip_size: 6,
            attack_range: 90.0,
            pre_attack: LogicFrameSpan(4),
            clip_reload_time: LogicFrameSpan(30),
        }
    }

    fn firing_weapon() -> Weapon {
        let mut weapon = Weapon::new(WeaponSlot::Primary, &pistol_template());
        weapon.rounds_in_clip = 2;
        weapon.shots_fired = 4;
        weapon.barrel_index = 1;
        weapon.next_shot_frame = LogicFrame(1_205);
        weapon.last_fire_frame = LogicFrame(1_200);
        weapon.current_target = ObjectId(31);
        weapon.burst_shots_left = 1;
        weapon.leech_range_active = true;
        weapon.state_machine.set_current(WeaponState::FIRING);
        weapon
    }

    // -----------------------------------------------------------------------
    // Test 1: round-trip with an active fire cycle
    // -----------------------------------------------------------------------
    #[test]
    fn weapon_round_trip() {
        let mut weapon = firing_weapon();

        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;

        let mut restored = Weapon::new(WeaponSlot::Primary, &pistol_template());
        let mut p = Persister::reader(&bytes);
        restored.persist(&mut p).unwrap();
        let out = p.finish().unwrap();

        assert_eq!(out.trailing, 0);
        assert_eq!(restored, weapon);
        // The target handle went through the pending list.
        assert_eq!(out.pending.len(), 1);
        assert_eq!(out.pending.entries()[0].id, ObjectId(31));
    }

    // -----------------------------------------------------------------------
    // Test 2: template-name identity mismatch is fatal
    // -----------------------------------------------------------------------
    #[test]
    fn template_name_mismatch_is_fatal() {
        let mut weapon = firing_weapon();
        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let bytes = p.finish().unwrap().bytes;

        // Load into a weapon built from a different template.
        let mut other = pistol_template();
        other.name = "TankCannon00".to_string();
        let mut restored = Weapon::new(WeaponSlot::Primary, &other);
        let mut p = Persister::reader(&bytes);
        let err = restored.persist(&mut p).unwrap_err();
        match err {
            PersistError::IdentityMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "TankCannon00");
                assert_eq!(found, "WorkerPistol");
            }
            other => panic!("expected IdentityMismatch, got {other}"),
        }
    }

    // -----------------------------------------------------------------------
    // Test 3: the firing state's sentinel is checked deterministically
    // -----------------------------------------------------------------------
    #[test]
    fn firing_sentinel_mismatch_is_fatal() {
        let mut weapon = firing_weapon();
        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let mut bytes = p.finish().unwrap().bytes;

        // The sentinel is the 5th-from-last byte (i32 + 1 reserved tail
        // byte end the stream).
        let sentinel_offset = bytes.len() - 5;
        assert_eq!(bytes[sentinel_offset], 1);
        bytes[sentinel_offset] = 9;

        let mut restored = Weapon::new(WeaponSlot::Primary, &pistol_template());
        let mut p = Persister::reader(&bytes);
        let err = restored.persist(&mut p).unwrap_err();
        assert!(matches!(err, PersistError::IdentityMismatch { .. }));
    }

    // -----------------------------------------------------------------------
    // Test 4: a version-2 stream omits the trailing flags
    // -----------------------------------------------------------------------
    #[test]
    fn version_two_stream_has_no_trailing_flags() {
        // Build a v3 stream, then splice it down to the v2 layout: patch
        // the version byte and remove the two flag bytes before the state
        // machine block.
        let mut weapon = Weapon::new(WeaponSlot::Primary, &pistol_template());
        weapon.state_machine.set_current(WeaponState::RELOADING);
        *weapon.state_machine.current_state_mut() = WeaponState::Reloading {
            reload_done_frame: LogicFrame(2_000),
        };

        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let v3 = p.finish().unwrap().bytes;

        // State machine block: machine version (1) + id (4) + state
        // version (1) + frame (4) = 10 bytes; the flags are the two bytes
        // before it.
        let machine_len = 10;
        let flags_start = v3.len() - machine_len - 2;
        let mut v2 = v3.clone();
        v2.drain(flags_start..flags_start + 2);
        v2[0] = 2;

        let mut restored = Weapon::new(WeaponSlot::Primary, &pistol_template());
        restored.leech_range_active = true; // must survive untouched
        let mut p = Persister::reader(&v2);
        restored.persist(&mut p).unwrap();
        assert_eq!(p.finish().unwrap().trailing, 0);

        assert!(restored.leech_range_active);
        assert_eq!(
            restored.state_machine.current(),
            WeaponState::RELOADING
        );
        assert_eq!(
            restored.state_machine.current_state(),
            &WeaponState::Reloading {
                reload_done_frame: LogicFrame(2_000)
            }
        );
    }

    // -----------------------------------------------------------------------
    // Test 5: a stream above the supported version is rejected untouched
    // -----------------------------------------------------------------------
    #[test]
    fn future_weapon_version_is_fatal() {
        let mut weapon = firing_weapon();
        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let mut bytes = p.finish().unwrap().bytes;
        bytes[0] = WEAPON_VERSION + 1;

        let mut restored = Weapon::new(WeaponSlot::Primary, &pistol_template());
        let before = restored.clone();
        let mut p = Persister::reader(&bytes);
        let err = restored.persist(&mut p).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnsupportedVersion { found, max, .. }
                if found == WEAPON_VERSION + 1 && max == WEAPON_VERSION
        ));
        // Version gating happens before any field transfer.
        assert_eq!(restored, before);
    }

    // -----------------------------------------------------------------------
    // Test 6: reserved spans round-trip unchanged
    // -----------------------------------------------------------------------
    #[test]
    fn weapon_reserved_spans_survive_round_trip() {
        let mut weapon = Weapon::new(WeaponSlot::Secondary, &pistol_template());
        let mut p = Persister::writer();
        weapon.persist(&mut p).unwrap();
        let mut bytes = p.finish().unwrap().bytes;

        // reserved_a sits after version (1), name (2 + 12), and four u32
        // fields (16) = offset 31.
        let name_len = "WorkerPistol".len();
        let reserved_a = 1 + 2 + name_len + 16;
        bytes[reserved_a..reserved_a + 4].copy_from_slice(&[9, 8, 7, 6]);

        let mut loaded = Weapon::new(WeaponSlot::Secondary, &pistol_template());
        let mut p = Persister::reader(&bytes);
        loaded.persist(&mut p).unwrap();

        let mut p = Persister::writer();
        loaded.persist(&mut p).unwrap();
        assert_eq!(p.finish().unwrap().bytes, bytes);
    }
}
