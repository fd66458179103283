//! Polymorphic behavior state and the machines that own it.
//!
//! Every behavior state machine in the simulation is a closed variant set:
//! the owning module registers the full set of legal state ids at
//! construction, and the set never changes at runtime. Adding a state
//! variant is a compile-time change to the registration set, not a runtime
//! extension point.
//!
//! Persistence of a machine writes its own version tag, then the current
//! state id, then delegates to exactly the state registered under that id.
//! Sibling states that are not current are never written. Each state's
//! persisted layout is versioned independently of the machine's own
//! version; some states legitimately persist nothing at all.

use crate::persist::{Persist, PersistError, Persister};
use std::collections::BTreeMap;

/// Numbered identity of one state within its machine. Persisted as a raw
/// u32; only ids registered at construction are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

/// One variant of a behavior state machine. Constructed once at module
/// construction and reused across activations, so persist implementations
/// must overwrite every field they own when reading.
pub trait State {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError>;
}

/// An ordered collection of numbered states plus a current-state cursor.
///
/// The cursor is mutated by simulation logic between ticks; persistence
/// only records which state is current and that state's own fields, and on
/// load makes the same state current with no transition side effects re-run.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine<S> {
    version: u8,
    states: BTreeMap<StateId, S>,
    current: StateId,
}

impl<S: State> StateMachine<S> {
    /// Register the machine's full, fixed set of legal states. `initial`
    /// must be one of the registered ids; a miss is a programming error in
    /// the registration set, not savegame content.
    pub fn new(version: u8, states: Vec<(StateId, S)>, initial: StateId) -> Self {
        let states: BTreeMap<StateId, S> = states.into_iter().collect();
        assert!(
            states.contains_key(&initial),
            "initial state {} is not registered",
            initial.0
        );
        Self {
            version,
            states,
            current: initial,
        }
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    /// Make a registered state current. Transition side effects are the
    /// caller's concern; this only moves the cursor.
    pub fn set_current(&mut self, id: StateId) {
        assert!(
            self.states.contains_key(&id),
            "state {} is not registered",
            id.0
        );
        self.current = id;
    }

    pub fn state(&self, id: StateId) -> Option<&S> {
        self.states.get(&id)
    }

    pub fn current_state(&self) -> &S {
        &self.states[&self.current]
    }

    pub fn current_state_mut(&mut self) -> &mut S {
        self.states
            .get_mut(&self.current)
            .unwrap_or_else(|| unreachable!("current state is always registered"))
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl<S: State> Persist for StateMachine<S> {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError> {
        p.persist_version(self.version)?;

        let mut raw = self.current.0;
        p.persist_u32(&mut raw)?;

        let id = StateId(raw);
        let Some(state) = self.states.get_mut(&id) else {
            return Err(PersistError::UnknownStateId {
                scope: p.scope_path(),
                id: raw,
            });
        };
        self.current = id;
        state.persist(p)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
