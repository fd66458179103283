//! Whole-simulation save and load.
//!
//! A save walks every entity in ascending handle order while the
//! simulation is quiesced between ticks; load is the same walk in the same
//! fixed order, reconstructing each entity from its template before asking
//! it to read its own state. Either the whole load succeeds -- including
//! resolution of every deferred object handle -- and atomically yields a
//! new arena, or it fails and nothing is applied.
//!
//! Stream layout: magic u32, format version u32, the persisted
//! [`GameState`] aggregate, the handle-assignment counter, the entity
//! count, then each entity as `[handle u32][template name][object
//! aggregate]`.

use crate::frame::LogicFrame;
use crate::id::ObjectId;
use crate::object::{GameObject, GameObjectArena};
use crate::persist::{Persist, PersistError, Persister};
use crate::template::TemplateSet;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a warchest save stream.
pub const SAVE_MAGIC: u32 = u32::from_le_bytes(*b"WCHT");

/// Current save format version. Increment when breaking the outer framing;
/// per-aggregate versions cover everything inside it.
pub const SAVE_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Width of the scenario tag field on the wire.
const SCENARIO_TAG_WIDTH: usize = 8;

/// Top-level simulation state outside any one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    /// Short code of the scenario this session is playing, NUL-padded to
    /// a fixed width on the wire.
    pub scenario_tag: String,
    /// The logic frame the simulation was quiesced at.
    pub frame: LogicFrame,
}

impl Persist for GameState {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(1)?;
        p.persist_fixed_ascii(&mut self.scenario_tag, SCENARIO_TAG_WIDTH)?;
        p.persist_frame(&mut self.frame)
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the entity set and top-level state to a byte stream.
///
/// The pass takes the arena mutably because read and write share one
/// persist signature; in write mode no entity state is changed.
pub fn save(arena: &mut GameObjectArena, state: &mut GameState) -> Result<Vec<u8>, PersistError> {
    let mut p = Persister::writer();

    let mut magic = SAVE_MAGIC;
    p.persist_u32(&mut magic)?;
    let mut format = SAVE_FORMAT_VERSION;
    p.persist_u32(&mut format)?;

    p.persist_object("GameState", state)?;

    let mut next_id = arena.next_object_id();
    p.persist_u32(&mut next_id)?;

    let mut count = arena.len() as u32;
    p.persist_u32(&mut count)?;

    let ids: Vec<ObjectId> = arena.ids().collect();
    for (index, id) in ids.into_iter().enumerate() {
        let Some(object) = arena.get_mut(id) else {
            continue;
        };
        p.begin_object(format!("Object[{index}]"));

        let mut raw = id.0;
        p.persist_u32(&mut raw)?;
        let mut name = object.template_name.clone();
        p.persist_ascii_string(&mut name)?;
        object.persist(&mut p)?;

        p.end_object()?;
    }

    let out = p.finish()?;
    log::debug!(
        "saved {} objects at frame {} ({} bytes)",
        count,
        state.frame.0,
        out.bytes.len()
    );
    Ok(out.bytes)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Reconstruct an entity set from a byte stream.
///
/// Entities are rebuilt from their templates through the given resolver,
/// then read their own state. After the final entity, every deferred
/// object handle must resolve against the loaded set and the stream must
/// be fully consumed.
pub fn load(
    data: &[u8],
    templates: &TemplateSet,
) -> Result<(GameObjectArena, GameState), PersistError> {
    let mut p = Persister::reader(data);

    let mut magic = 0u32;
    p.persist_u32(&mut magic)?;
    if magic != SAVE_MAGIC {
        return Err(PersistError::InvalidMagic {
            expected: SAVE_MAGIC,
            found: magic,
        });
    }

    let mut format = 0u32;
    p.persist_u32(&mut format)?;
    if format == 0 || format > SAVE_FORMAT_VERSION {
        return Err(PersistError::UnsupportedFormat {
            found: format,
            max: SAVE_FORMAT_VERSION,
        });
    }

    let mut state = GameState::default();
    p.persist_object("GameState", &mut state)?;

    let mut next_id = 0u32;
    p.persist_u32(&mut next_id)?;

    let mut count = 0u32;
    p.persist_u32(&mut count)?;

    let mut arena = GameObjectArena::new();
    for index in 0..count {
        p.begin_object(format!("Object[{index}]"));

        let mut raw = 0u32;
        p.persist_u32(&mut raw)?;
        if raw == 0 {
            return Err(PersistError::OutOfRange {
                scope: p.scope_path(),
                what: "object id",
                value: raw,
            });
        }

        let mut name = String::new();
        p.persist_ascii_string(&mut name)?;
        let template = templates
            .object(&name)
            .ok_or_else(|| PersistError::UnknownTemplate(name.clone()))?;

        let mut object = GameObject::from_template(ObjectId(raw), template, templates)?;
        object.persist(&mut p)?;

        p.end_object()?;
        arena.insert_loaded(object)?;
    }

    let out = p.finish()?;
    if out.trailing > 0 {
        return Err(PersistError::TrailingBytes {
            trailing: out.trailing,
        });
    }

    log::debug!(
        "loaded {} objects at frame {}, resolving {} deferred handles",
        arena.len(),
        state.frame.0,
        out.pending.len()
    );
    out.pending.resolve_all(&arena)?;

    arena.bump_next_object_id(next_id);
    Ok((arena, state))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TemplateSet, WeaponTemplate};

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

    fn spawn_worker(arena: &mut GameObjectArena, set: &TemplateSet) -> ObjectId {
        let template = set.object("GLAWorker").unwrap().clone();
        arena.spawn(&template, set).unwrap()
    }

    // -----------------------------------------------------------------------
    // Test 1: header fixture
    // -----------------------------------------------------------------------
    #[test]
    fn empty_save_header_layout() {
        let mut arena = GameObjectArena::new();
        let mut state = GameState {
            scenario_tag: "SCN01".to_string(),
            frame: LogicFrame(0x0403_0201),
        };
        let bytes = save(&mut arena, &mut state).unwrap();

        // magic, format, game state (version + tag + frame), next id, count.
        assert_eq!(
            bytes,
            vec![
                b'W', b'C', b'H', b'T', // magic
                1, 0, 0, 0, // format version
                1, // game state version
                b'S', b'C', b'N', b'0', b'1', 0, 0, 0, // scenario tag
                0x01, 0x02, 0x03, 0x04, // frame
                1, 0, 0, 0, // next object id
                0, 0, 0, 0, // entity count
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Test 2: bad magic and future format are rejected
    // -----------------------------------------------------------------------
    #[test]
    fn bad_magic_is_rejected() {
        let set = templates();
        let mut data = save(&mut GameObjectArena::new(), &mut GameState::default()).unwrap();
        data[0] = b'X';
        let err = load(&data, &set).unwrap_err();
        assert!(matches!(err, PersistError::InvalidMagic { .. }));
    }

    #[test]
    fn future_format_version_is_rejected() {
        let set = templates();
        let mut data = save(&mut GameObjectArena::new(), &mut GameState::default()).unwrap();
        data[4] = (SAVE_FORMAT_VERSION + 1) as u8;
        let err = load(&data, &set).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnsupportedFormat { found, .. } if found == SAVE_FORMAT_VERSION + 1
        ));
    }

    // -----------------------------------------------------------------------
    // Test 3: round-trip preserves the arena and counter
    // -----------------------------------------------------------------------
    #[test]
    fn round_trip_preserves_arena() {
        let set = templates();
        let mut arena = GameObjectArena::new();
        let a = spawn_worker(&mut arena, &set);
        let b = spawn_worker(&mut arena, &set);

        // Cross-reference: a targets b, b targets a.
        if let Some(weapon) = &mut arena.get_mut(a).unwrap().weapons[0] {
            weapon.current_target = b;
        }
        if let Some(weapon) = &mut arena.get_mut(b).unwrap().weapons[0] {
            weapon.current_target = a;
        }
        // A dead third object leaves a gap in the id space.
        let c = spawn_worker(&mut arena, &set);
        arena.despawn(c);

        let mut state = GameState {
            scenario_tag: "TEST".to_string(),
            frame: LogicFrame(4_500),
        };
        let data = save(&mut arena, &mut state).unwrap();
        let (restored_arena, restored_state) = load(&data, &set).unwrap();

        assert_eq!(restored_arena, arena);
        assert_eq!(restored_state, state);
        assert_eq!(restored_arena.next_object_id(), 4);
    }

    // -----------------------------------------------------------------------
    // Test 4: unknown template name fails the load
    // -----------------------------------------------------------------------
    #[test]
    fn unknown_template_fails_load() {
        let set = templates();
        let mut arena = GameObjectArena::new();
        spawn_worker(&mut arena, &set);
        let data = save(&mut arena, &mut GameState::default()).unwrap();

        let empty = TemplateSet::new();
        let err = load(&data, &empty).unwrap_err();
        assert!(matches!(err, PersistError::UnknownTemplate(name) if name == "GLAWorker"));
    }

    // -----------------------------------------------------------------------
    // Test 5: trailing bytes are a corruption error
    // -----------------------------------------------------------------------
    #[test]
    fn trailing_bytes_fail_load() {
        let set = templates();
        let mut data = save(&mut GameObjectArena::new(), &mut GameState::default()).unwrap();
        data.push(0);
        let err = load(&data, &set).unwrap_err();
        assert!(matches!(err, PersistError::TrailingBytes { trailing: 1 }));
    }

    // -----------------------------------------------------------------------
    // Test 6: a dangling handle fails the load after the full walk
    // -----------------------------------------------------------------------
    #[test]
    fn dangling_handle_fails_load() {
        let set = templates();
        let mut arena = GameObjectArena::new();
        let a = spawn_worker(&mut arena, &set);
        let ghost = spawn_worker(&mut arena, &set);
        if let Some(weapon) = &mut arena.get_mut(a).unwrap().weapons[0] {
            weapon.current_target = ghost;
        }
        arena.despawn(ghost);

        let data = save(&mut arena, &mut GameState::default()).unwrap();
        let err = load(&data, &set).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnresolvedHandle { id, .. } if id == ghost
        ));
    }
}
