use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arbor_types::ObjectId;

/// The three observable states of an object: id only, body only, or both.
///
/// There is no variant for "neither", so an object can always produce an id
/// (by hashing its body) or a body (by fetching its id).
pub enum Slot<B> {
    Id(ObjectId),
    Body(Arc<B>),
    Both { id: ObjectId, body: Arc<B> },
}

impl<B> Clone for Slot<B> {
    fn clone(&self) -> Self {
        match self {
            Self::Id(id) => Self::Id(id.clone()),
            Self::Body(body) => Self::Body(Arc::clone(body)),
            Self::Both { id, body } => Self::Both {
                id: id.clone(),
                body: Arc::clone(body),
            },
        }
    }
}

/// Shared lazy state behind every object handle.
pub struct State<B> {
    slot: RwLock<Slot<B>>,
    stored: AtomicBool,
}

impl<B> State<B> {
    /// A stored object known only by id.
    pub fn with_id(id: ObjectId) -> Self {
        Self {
            slot: RwLock::new(Slot::Id(id)),
            stored: AtomicBool::new(true),
        }
    }

    /// An unstored object with an in-memory body.
    pub fn with_body(body: Arc<B>) -> Self {
        Self {
            slot: RwLock::new(Slot::Body(body)),
            stored: AtomicBool::new(false),
        }
    }

    pub fn slot(&self) -> Slot<B> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn id(&self) -> Option<ObjectId> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Id(id) | Slot::Both { id, .. } => Some(id.clone()),
            Slot::Body(_) => None,
        }
    }

    pub fn body(&self) -> Option<Arc<B>> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Body(body) | Slot::Both { body, .. } => Some(Arc::clone(body)),
            Slot::Id(_) => None,
        }
    }

    /// Cache an id and return the id now held. An existing id is never
    /// replaced.
    pub fn set_id(&self, id: ObjectId) -> ObjectId {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Id(existing) | Slot::Both { id: existing, .. } => existing.clone(),
            Slot::Body(body) => {
                let body = Arc::clone(body);
                *slot = Slot::Both {
                    id: id.clone(),
                    body,
                };
                id
            }
        }
    }

    /// Cache a fetched body next to the id.
    pub fn set_body(&self, body: Arc<B>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Slot::Id(id) = &*slot {
            let id = id.clone();
            *slot = Slot::Both { id, body };
        }
    }

    /// Drop the body of a stored object. Returns `true` if a body was dropped.
    pub fn unload(&self) -> bool {
        if !self.is_stored() {
            return false;
        }
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Slot::Both { id, .. } = &*slot {
            let id = id.clone();
            *slot = Slot::Id(id);
            return true;
        }
        false
    }

    pub fn is_stored(&self) -> bool {
        self.stored.load(Ordering::Acquire)
    }

    pub fn mark_stored(&self) {
        self.stored.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::ObjectKind;

    fn id(seed: u8) -> ObjectId {
        ObjectId::from_digest(ObjectKind::Blob, &[seed; 32])
    }

    #[test]
    fn body_then_id() {
        let state = State::with_body(Arc::new(5u32));
        assert!(state.id().is_none());
        assert!(!state.is_stored());
        assert_eq!(state.set_id(id(1)), id(1));
        assert_eq!(state.id(), Some(id(1)));
        assert_eq!(*state.body().unwrap(), 5);
    }

    #[test]
    fn id_never_changes() {
        let state = State::with_body(Arc::new(()));
        state.set_id(id(1));
        assert_eq!(state.set_id(id(2)), id(1));
        assert_eq!(state.id(), Some(id(1)));
    }

    #[test]
    fn unload_requires_stored() {
        let state = State::with_body(Arc::new(1u8));
        state.set_id(id(1));
        assert!(!state.unload());
        assert!(state.body().is_some());

        state.mark_stored();
        assert!(state.unload());
        assert!(state.body().is_none());
        assert_eq!(state.id(), Some(id(1)));
    }

    #[test]
    fn set_body_fills_id_only_state() {
        let state: State<u8> = State::with_id(id(3));
        assert!(state.is_stored());
        assert!(state.body().is_none());
        state.set_body(Arc::new(9));
        assert!(matches!(state.slot(), Slot::Both { .. }));
    }
}
