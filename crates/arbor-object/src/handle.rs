use std::fmt;
use std::sync::Arc;

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ObjectError, ObjectResult};
use crate::object::Object;
use crate::state::{Slot, State};

/// Per-kind canonical codec.
///
/// `to_data` replaces every embedded object with its id and fails with
/// [`ObjectError::MissingChildId`] if a child has none yet. `from_data`
/// rehydrates ids into id-only handles without fetching anything.
pub trait ObjectBody: Sized + Send + Sync + 'static {
    const KIND: ObjectKind;

    /// The canonical, serializable form.
    type Data: Serialize + DeserializeOwned;

    fn to_data(&self) -> ObjectResult<Self::Data>;

    fn from_data(data: Self::Data) -> ObjectResult<Self>;

    /// Immediate children embedded in this body.
    fn children(&self) -> Vec<Object>;

    fn into_object(handle: ObjectHandle<Self>) -> Object;
}

/// A typed, cheaply clonable reference to one object.
///
/// Clones share the same lazy state, so an id computed or a body loaded
/// through one clone is visible through all of them.
pub struct ObjectHandle<B> {
    state: Arc<State<B>>,
}

impl<B> Clone for ObjectHandle<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: ObjectBody> ObjectHandle<B> {
    /// Reference a stored object by id. Fails if the id's tag is not `B`'s.
    pub fn with_id(id: ObjectId) -> ObjectResult<Self> {
        let actual = id.kind();
        if actual != B::KIND {
            return Err(ObjectError::KindMismatch {
                id,
                expected: B::KIND,
                actual,
            });
        }
        Ok(Self {
            state: Arc::new(State::with_id(id)),
        })
    }

    /// Caller guarantees the tag matches `B::KIND`.
    pub(crate) fn from_known_id(id: ObjectId) -> Self {
        debug_assert_eq!(id.kind(), B::KIND);
        Self {
            state: Arc::new(State::with_id(id)),
        }
    }

    /// Wrap a new, unstored body.
    pub fn with_body(body: B) -> Self {
        Self {
            state: Arc::new(State::with_body(Arc::new(body))),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        B::KIND
    }

    /// The cached id, if one has been computed or assigned.
    pub fn try_id(&self) -> Option<ObjectId> {
        self.state.id()
    }

    /// Return the id, computing it from the body if necessary.
    ///
    /// Children without ids are identified first. Nothing is persisted.
    pub fn id(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        match self.state.slot() {
            Slot::Id(id) | Slot::Both { id, .. } => Ok(id),
            Slot::Body(body) => {
                for child in body.children() {
                    child.id(handle)?;
                }
                let bytes = encode_body(&*body)?;
                let id = handle.object_id(B::KIND, &bytes);
                Ok(self.state.set_id(id))
            }
        }
    }

    pub fn is_stored(&self) -> bool {
        self.state.is_stored()
    }

    /// The body if it is resident, without fetching.
    pub fn body(&self) -> Option<Arc<B>> {
        self.state.body()
    }

    /// Return the body, fetching and decoding it through `handle` if needed.
    pub async fn load(&self, handle: &dyn Handle) -> ObjectResult<Arc<B>> {
        let id = match self.state.slot() {
            Slot::Body(body) | Slot::Both { body, .. } => return Ok(body),
            Slot::Id(id) => id,
        };
        let actual = id.kind();
        if actual != B::KIND {
            return Err(ObjectError::KindMismatch {
                id,
                expected: B::KIND,
                actual,
            });
        }
        let bytes = handle
            .try_get_object(&id)
            .await?
            .ok_or_else(|| ObjectError::NotFound(id.clone()))?;
        let data: B::Data = serde_json::from_slice(&bytes)?;
        let body = Arc::new(B::from_data(data)?);
        self.state.set_body(Arc::clone(&body));
        tracing::debug!(id = %id, "loaded object");
        Ok(body)
    }

    /// Drop the resident body if the object is stored. Unstored bodies are
    /// kept because they cannot be fetched back.
    pub fn unload(&self) {
        if self.state.unload() {
            tracing::trace!(kind = %B::KIND, "unloaded object body");
        }
    }

    /// Immediate children, loading the body if needed.
    pub async fn children(&self, handle: &dyn Handle) -> ObjectResult<Vec<Object>> {
        Ok(self.load(handle).await?.children())
    }

    /// Store this object and everything unstored beneath it, returning its id.
    pub async fn store(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        crate::store::store_objects(vec![B::into_object(self.clone())], handle).await?;
        self.id(handle)
    }

    /// The canonical bytes of the resident body.
    pub(crate) fn encode(&self) -> ObjectResult<Bytes> {
        let Some(body) = self.state.body() else {
            return Err(ObjectError::InvalidValue(format!(
                "{} has no resident body to encode",
                B::KIND
            )));
        };
        encode_body(&*body)
    }

    /// The id for embedding in a parent's canonical data.
    pub(crate) fn require_id(&self) -> ObjectResult<ObjectId> {
        self.state
            .id()
            .ok_or(ObjectError::MissingChildId { kind: B::KIND })
    }

    pub(crate) fn set_id(&self, id: ObjectId) -> ObjectId {
        self.state.set_id(id)
    }

    pub(crate) fn mark_stored(&self) {
        self.state.mark_stored();
    }

    /// Identity of the shared state, for visited sets.
    pub(crate) fn ptr(&self) -> usize {
        Arc::as_ptr(&self.state) as *const () as usize
    }
}

pub(crate) fn encode_body<B: ObjectBody>(body: &B) -> ObjectResult<Bytes> {
    let data = body.to_data()?;
    Ok(Bytes::from(serde_json::to_vec(&data)?))
}

/// Same shared state, or both identified with equal ids.
impl<B> PartialEq for ObjectHandle<B> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.state, &other.state) {
            return true;
        }
        match (self.state.id(), other.state.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<B: ObjectBody> fmt::Debug for ObjectHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.id() {
            Some(id) => write!(f, "{}({})", B::KIND, id.short()),
            None => write!(f, "{}(<unidentified>)", B::KIND),
        }
    }
}
