//! Save/load example: freeze and thaw a small battle.
//!
//! Builds a scene with cross-referencing units, saves it to bytes,
//! reloads it through the template resolver, and verifies the restored
//! world is structurally identical.
//!
//! Run with: `cargo run -p warchest-core --example save_load`

use warchest_core::id::ObjectId;
use warchest_core::save::{load, save};
use warchest_core::test_utils::{make_battle, sample_templates};

fn main() {
    env_logger::init();

    // --- Step 1: Build the scene ---

    let templates = sample_templates();
    let (mut arena, mut state) = make_battle(&templates);
    println!(
        "Built {} objects, quiesced at frame {}",
        arena.len(),
        state.frame.0
    );

    // --- Step 2: Save ---

    let data = save(&mut arena, &mut state).expect("save should succeed");
    println!("Saved to {} bytes", data.len());

    // --- Step 3: Load ---

    let (restored, restored_state) = load(&data, &templates).expect("load should succeed");
    println!(
        "Loaded {} objects at frame {}",
        restored.len(),
        restored_state.frame.0
    );

    // --- Step 4: Verify ---

    assert_eq!(restored, arena);
    assert_eq!(restored_state, state);

    let barracks = restored
        .get(ObjectId(1))
        .expect("barracks survived the trip");
    let queue = &barracks
        .production_exit
        .as_ref()
        .expect("barracks has a production exit")
        .exit_queue;
    println!("Barracks exit queue still references {queue:?}");
    println!("Round trip OK");
}
