use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use futures::future::{try_join_all, BoxFuture, FutureExt};

use crate::error::ObjectResult;
use crate::value::Value;

/// A value that may still contain work to be done.
///
/// Arrays and maps of unresolved values are resolved element by element,
/// concurrently. `Pending` is a future already in flight; `Deferred` is a
/// thunk that produces one when resolution reaches it.
pub enum Unresolved {
    Value(Value),
    Array(Vec<Unresolved>),
    Map(BTreeMap<String, Unresolved>),
    Pending(BoxFuture<'static, ObjectResult<Unresolved>>),
    Deferred(Box<dyn FnOnce() -> BoxFuture<'static, ObjectResult<Unresolved>> + Send>),
}

impl Unresolved {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = ObjectResult<Unresolved>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ObjectResult<Unresolved>> + Send + 'static,
    {
        Self::Deferred(Box::new(move || f().boxed()))
    }
}

impl fmt::Debug for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Array(values) => f.debug_tuple("Array").field(values).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Pending(_) => f.write_str("Pending"),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl From<Value> for Unresolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<Unresolved>> for Unresolved {
    fn from(values: Vec<Unresolved>) -> Self {
        Self::Array(values)
    }
}

impl From<BTreeMap<String, Unresolved>> for Unresolved {
    fn from(map: BTreeMap<String, Unresolved>) -> Self {
        Self::Map(map)
    }
}

/// Await everything pending inside `value`.
///
/// Siblings are resolved concurrently and reassembled in their original
/// positions. The first error wins.
pub fn resolve(value: Unresolved) -> BoxFuture<'static, ObjectResult<Value>> {
    async move {
        match value {
            Unresolved::Value(value) => Ok(value),
            Unresolved::Array(values) => {
                let values = try_join_all(values.into_iter().map(resolve)).await?;
                Ok(Value::Array(values))
            }
            Unresolved::Map(map) => {
                let (keys, values): (Vec<_>, Vec<_>) = map.into_iter().unzip();
                let values = try_join_all(values.into_iter().map(resolve)).await?;
                Ok(Value::Map(keys.into_iter().zip(values).collect()))
            }
            Unresolved::Pending(future) => resolve(future.await?).await,
            Unresolved::Deferred(thunk) => resolve(thunk().await?).await,
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObjectError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn terminal_values_pass_through() {
        let value = Value::Array(vec![1i64.into(), "x".into()]);
        assert_eq!(resolve(value.clone().into()).await.unwrap(), value);
    }

    #[tokio::test]
    async fn nested_pending_values_resolve_in_place() {
        let input = Unresolved::Map(BTreeMap::from([
            (
                "slow".to_string(),
                Unresolved::pending(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Unresolved::Value("slow".into()))
                }),
            ),
            (
                "list".to_string(),
                Unresolved::Array(vec![
                    Unresolved::pending(async {
                        Ok(Unresolved::pending(async { Ok(Value::Int(1).into()) }))
                    }),
                    Unresolved::Value(Value::Int(2)),
                ]),
            ),
        ]));
        let value = resolve(input).await.unwrap();
        assert_eq!(
            value,
            Value::Map(BTreeMap::from([
                (
                    "list".to_string(),
                    Value::Array(vec![Value::Int(1), Value::Int(2)])
                ),
                ("slow".to_string(), "slow".into()),
            ]))
        );
    }

    #[tokio::test]
    async fn deferred_runs_only_when_reached() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let input = Unresolved::deferred(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(Unresolved::Value(true.into()))
        });
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(resolve(input).await.unwrap(), Value::Bool(true));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn siblings_run_concurrently() {
        let sleepy = || {
            Unresolved::pending(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Unresolved::Value(Value::Null))
            })
        };
        let start = tokio::time::Instant::now();
        resolve(Unresolved::Array(vec![sleepy(), sleepy(), sleepy()]))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn errors_propagate() {
        let input = Unresolved::Array(vec![
            Unresolved::Value(Value::Null),
            Unresolved::pending(async { Err(ObjectError::InvalidValue("nope".into())) }),
        ]);
        assert!(matches!(
            resolve(input).await,
            Err(ObjectError::InvalidValue(_))
        ));
    }
}
