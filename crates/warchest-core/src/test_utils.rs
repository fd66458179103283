//! Shared test helpers for integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these
//! helpers are available in unit tests and integration tests (via the
//! `test-utils` feature).

use crate::id::ObjectId;
use crate::object::GameObjectArena;
use crate::save::GameState;
use crate::template::TemplateSet;

// ===========================================================================
// Template fixtures
// ===========================================================================

const TEMPLATE_JSON: &str = r#"{
    "weapons": [
        { "name": "WorkerPistol", "clip_size": 6, "attack_range": 90.0,
          "pre_attack": 4, "clip_reload_time": 30 },
        { "name": "GuardRifle", "clip_size": 30, "attack_range": 140.0,
          "clip_reload_time": 60 }
    ],
    "objects": [
        {
            "name": "GLAWorker",
            "worker_ai": { "bored_time": 150, "upgraded_supply_boost": 10,
                           "supply_warehouse_scan_distance": 700.0 },
            "weapons": [ { "slot": "primary", "weapon": "WorkerPistol" } ]
        },
        {
            "name": "Barracks",
            "production_exit": {
                "unit_create_point": { "x": 12.0, "y": 0.0, "z": 0.0 },
                "natural_rally_point": { "x": 30.0, "y": 0.0, "z": 0.0 },
                "exit_delay": 30
            }
        },
        {
            "name": "Guard",
            "weapons": [ { "slot": "primary", "weapon": "GuardRifle" },
                         { "slot": "secondary", "weapon": "WorkerPistol" } ]
        },
        {
            "name": "BannerCarrier",
            "aura": { "starts_active": true, "refresh_delay": 60, "range": 150.0 }
        }
    ]
}"#;

/// The standard template set used across tests.
pub fn sample_templates() -> TemplateSet {
    TemplateSet::from_json(TEMPLATE_JSON).expect("sample templates are valid")
}

// ===========================================================================
// Arena builders
// ===========================================================================

/// Spawn one object by template name.
pub fn spawn(arena: &mut GameObjectArena, templates: &TemplateSet, name: &str) -> ObjectId {
    let template = templates
        .object(name)
        .unwrap_or_else(|| panic!("unknown sample template {name:?}"))
        .clone();
    arena
        .spawn(&template, templates)
        .expect("sample template spawns cleanly")
}

/// A small battle scene: a barracks with two workers queued at its exit, a
/// guard targeting one worker, and a banner carrier buffing everyone.
/// Exercises cross references in both directions.
pub fn make_battle(templates: &TemplateSet) -> (GameObjectArena, GameState) {
    let mut arena = GameObjectArena::new();

    let barracks = spawn(&mut arena, templates, "Barracks");
    let worker_a = spawn(&mut arena, templates, "GLAWorker");
    let worker_b = spawn(&mut arena, templates, "GLAWorker");
    let guard = spawn(&mut arena, templates, "Guard");
    let banner = spawn(&mut arena, templates, "BannerCarrier");

    // Barracks (lowest handle) references the later-saved workers.
    let exit = arena
        .get_mut(barracks)
        .and_then(|o| o.production_exit.as_mut())
        .expect("barracks has a production exit");
    exit.exit_queue = vec![worker_a, worker_b];

    // Guard targets a worker; worker a gathers from worker b's position.
    if let Some(weapon) = arena
        .get_mut(guard)
        .and_then(|o| o.weapons[0].as_mut())
    {
        weapon.current_target = worker_a;
        weapon.rounds_in_clip = 17;
    }
    if let Some(worker_ai) = arena
        .get_mut(worker_a)
        .and_then(|o| o.worker_ai.as_mut())
    {
        worker_ai.base.current_supply_source = worker_b;
        worker_ai.base.boxes_carried = 2;
    }

    // The banner carrier buffs everything else.
    if let Some(aura) = arena.get_mut(banner).and_then(|o| o.aura.as_mut()) {
        aura.affected = vec![barracks, worker_a, worker_b, guard];
    }

    let state = GameState {
        scenario_tag: "SKIRMISH".to_string(),
        frame: crate::frame::LogicFrame(12_345),
    };
    (arena, state)
}
