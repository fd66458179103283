//! Deferred object-handle resolution.
//!
//! Entities reference each other through [`ObjectId`] handles rather than
//! owned pointers, so a save stream never needs a topological traversal
//! order. The price is that a handle read from the stream may name an entity
//! that has not been loaded yet. Reading therefore never blocks: every
//! non-null handle is recorded as pending, and once the full entity set has
//! been materialized, [`HandleRegistry::resolve_all`] checks each pending
//! pair against the object directory. Any handle that never materialized is
//! a corruption error and fails the whole load.

use crate::id::ObjectId;
use crate::persist::PersistError;

/// A directory of live entities, keyed by stable handle. The arena is the
/// only implementor in this crate; tests substitute their own.
pub trait ObjectLookup {
    /// Whether an entity with this handle has been materialized.
    fn contains(&self, id: ObjectId) -> bool;
}

/// One recorded (holder, handle) pair awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHandle {
    /// Scope path of the aggregate that held the handle, for diagnostics.
    pub holder: String,
    pub id: ObjectId,
}

/// The pending-resolution list consulted after the entire entity set has
/// been loaded. Write passes leave it empty: serializing a live reference's
/// handle needs no bookkeeping.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    pending: Vec<PendingHandle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-null handle read from the stream. Null handles resolve
    /// to "no reference" without deferral and must not be recorded.
    pub fn record(&mut self, holder: String, id: ObjectId) {
        debug_assert!(!id.is_null());
        self.pending.push(PendingHandle { holder, id });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn entries(&self) -> &[PendingHandle] {
        &self.pending
    }

    /// Resolve every pending handle against the loaded entity set. The
    /// first handle with no materialized entity fails the load.
    pub fn resolve_all<L: ObjectLookup>(&self, directory: &L) -> Result<(), PersistError> {
        for entry in &self.pending {
            if !directory.contains(entry.id) {
                return Err(PersistError::UnresolvedHandle {
                    holder: entry.holder.clone(),
                    id: entry.id,
                });
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
