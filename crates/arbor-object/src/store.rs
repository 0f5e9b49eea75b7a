use std::collections::HashSet;

use arbor_store::{Handle, PutItem};

use crate::error::ObjectResult;
use crate::object::Object;
use crate::resolve::{resolve, Unresolved};
use crate::value::Value;

/// Resolve `value`, then store every unstored object it reaches.
///
/// Returns the resolved value. Its objects all carry ids afterwards.
pub async fn store(value: impl Into<Unresolved>, handle: &dyn Handle) -> ObjectResult<Value> {
    let value = resolve(value.into()).await?;
    store_objects(value.objects(), handle).await?;
    Ok(value)
}

/// Unstored objects reachable from `roots`, each after all of its children.
///
/// Ids are not touched here. Stored objects are not expanded, since
/// everything beneath them is stored too.
fn unstored_post_order(roots: Vec<Object>) -> Vec<Object> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(Object, bool)> = roots.into_iter().rev().map(|o| (o, false)).collect();
    while let Some((object, expanded)) = stack.pop() {
        if expanded {
            order.push(object);
            continue;
        }
        if object.is_stored() || !visited.insert(object.ptr()) {
            continue;
        }
        let children = object.resident_children().unwrap_or_default();
        stack.push((object, true));
        stack.extend(children.into_iter().rev().map(|child| (child, false)));
    }
    order
}

/// Identify and persist everything unstored beneath `roots` in one batch.
///
/// Returns the number of distinct objects submitted.
pub(crate) async fn store_objects(roots: Vec<Object>, handle: &dyn Handle) -> ObjectResult<usize> {
    let order = unstored_post_order(roots);
    if order.is_empty() {
        return Ok(0);
    }

    let mut items = Vec::with_capacity(order.len());
    let mut ids = HashSet::new();
    for object in &order {
        let bytes = object.encode()?;
        let id = object.set_id(handle.object_id(object.kind(), &bytes));
        tracing::debug!(id = %id, size = bytes.len(), "encoded object");
        if ids.insert(id.clone()) {
            items.push(PutItem::new(id, bytes));
        }
    }

    let count = items.len();
    handle.put_object_batch(items).await?;
    for object in &order {
        object.mark_stored();
    }
    tracing::info!(objects = count, "stored object batch");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::directory::Directory;
    use crate::error::ObjectError;
    use crate::file::File;
    use crate::object::Artifact;
    use arbor_store::InMemoryHandle;
    use std::collections::BTreeMap;

    fn tree() -> (Blob, File, Directory) {
        let blob = Blob::leaf("hello");
        let file = File::with_contents(blob.clone(), false);
        let dir = Directory::with_entries(BTreeMap::from([(
            "hello.txt".to_string(),
            Artifact::from(file.clone()),
        )]))
        .unwrap();
        (blob, file, dir)
    }

    #[test]
    fn post_order_puts_children_first() {
        let (blob, file, dir) = tree();
        let order = unstored_post_order(vec![dir.clone().into()]);
        assert_eq!(
            order,
            vec![Object::Blob(blob), Object::File(file), Object::Directory(dir)]
        );
    }

    #[test]
    fn shared_children_appear_once() {
        let blob = Blob::leaf("shared");
        let a = File::with_contents(blob.clone(), false);
        let b = File::with_contents(blob.clone(), true);
        let order = unstored_post_order(vec![a.into(), b.into()]);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], Object::Blob(blob));
    }

    #[tokio::test]
    async fn store_submits_one_batch_and_marks_stored() {
        let handle = InMemoryHandle::new();
        let (blob, file, dir) = tree();
        let value = store(Value::from(Artifact::from(dir.clone())), &handle)
            .await
            .unwrap();
        assert_eq!(handle.batch_count(), 1);
        assert!(blob.is_stored() && file.is_stored() && dir.is_stored());
        assert_eq!(value.objects(), vec![Object::Directory(dir)]);
    }

    #[tokio::test]
    async fn stored_objects_are_skipped() {
        let handle = InMemoryHandle::new();
        let (_, _, dir) = tree();
        dir.store(&handle).await.unwrap();
        assert_eq!(store_objects(vec![dir.into()], &handle).await.unwrap(), 0);
        assert_eq!(handle.batch_count(), 1);
    }

    #[tokio::test]
    async fn equal_content_is_submitted_once_per_batch() {
        let handle = InMemoryHandle::new();
        let a = Blob::leaf("same");
        let b = Blob::leaf("same");
        let count = store_objects(vec![a.clone().into(), b.clone().into()], &handle)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(a.try_id(), b.try_id());
    }

    #[tokio::test]
    async fn parent_encoding_requires_child_ids() {
        let handle = InMemoryHandle::new();
        let file = File::with_contents(Blob::leaf("x"), false);
        let result = crate::handle::encode_body(&*file.body().unwrap());
        assert!(matches!(result, Err(ObjectError::MissingChildId { .. })));
        file.store(&handle).await.unwrap();
        assert!(crate::handle::encode_body(&*file.body().unwrap()).is_ok());
    }
}
