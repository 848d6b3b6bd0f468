//! The per-call bundle passed between services.

use crate::claims::Token;
use crate::scope::{CallScope, CancelGuard, deadline_from_secs};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Context passed along every service-to-service call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    /// Token authorizing the call.
    #[serde(default)]
    pub token: Token,

    /// Absolute deadline as unix seconds. Zero or negative means no deadline.
    #[serde(default)]
    pub deadline: i64,

    /// Tracing identifier. Empty means none.
    #[serde(default)]
    pub tracing_id: String,

    /// Free-form data, shared by reference with any scope derived from this context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SharedData>,
}

impl CallContext {
    pub fn new(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline.timestamp();
        self
    }

    pub fn with_tracing_id(mut self, tracing_id: impl Into<String>) -> Self {
        self.tracing_id = tracing_id.into();
        self
    }

    pub fn with_data(mut self, data: SharedData) -> Self {
        self.data = Some(data);
        self
    }

    /// The deadline as a point in time, if one is set.
    ///
    /// Deadlines past chrono's range saturate at its maximum.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        deadline_from_secs(self.deadline)
    }

    /// Convert into a [`CallScope`] for use inside this service.
    ///
    /// The returned guard must be kept alive for the duration of the call.
    /// Dropping it cancels the scope and stops the deadline timer.
    pub fn to_scope(&self) -> (CallScope, CancelGuard) {
        CallScope::new(
            self.deadline,
            self.token.clone(),
            self.tracing_id.clone(),
            self.data.clone(),
        )
    }

    /// Rebuild a context from a scope, e.g. before calling another service.
    ///
    /// The deadline is truncated to whole seconds.
    pub fn from_scope(scope: &CallScope) -> Self {
        Self {
            token: scope.token().clone(),
            deadline: scope.deadline_secs(),
            tracing_id: scope.tracing_id().to_string(),
            data: scope.data(),
        }
    }
}

/// A string-keyed map shared between a [`CallContext`] and every scope derived from it.
///
/// Cloning aliases the same map. Equality compares contents.
#[derive(Clone, Default)]
pub struct SharedData {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl SharedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.lock().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.lock().clone()
    }

    /// Whether both handles point at the same underlying map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<HashMap<String, Value>> for SharedData {
    fn from(map: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SharedData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<HashMap<_, _>>()
            .into()
    }
}

impl PartialEq for SharedData {
    fn eq(&self, other: &Self) -> bool {
        // Same map: locking twice would deadlock
        if self.ptr_eq(other) {
            return true;
        }
        *self.inner.lock() == *other.inner.lock()
    }
}

impl fmt::Debug for SharedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.lock().iter()).finish()
    }
}

impl Serialize for SharedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.lock().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SharedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn populated() -> CallContext {
        CallContext::new("header.payload.signature")
            .with_deadline(Utc::now() + Duration::hours(1))
            .with_tracing_id("trace-1")
            .with_data([("tenant", json!("acme")), ("attempt", json!(2))].into_iter().collect())
    }

    #[test]
    fn test_round_trip_populated_context() {
        let ctx = populated();
        let (scope, _guard) = ctx.to_scope();
        assert_eq!(CallContext::from_scope(&scope), ctx);
    }

    #[test]
    fn test_round_trip_empty_context() {
        let ctx = CallContext::default();
        let (scope, _guard) = ctx.to_scope();

        let back = CallContext::from_scope(&scope);
        assert_eq!(back, ctx);
        assert!(back.token.is_empty());
        assert!(back.tracing_id.is_empty());
        assert!(back.data.is_none());
        assert_eq!(back.deadline, 0);
    }

    #[test]
    fn test_non_positive_deadline_round_trips_to_zero() {
        for deadline in [-100, -1, 0] {
            let ctx = CallContext {
                deadline,
                ..CallContext::new("t")
            };
            let (scope, _guard) = ctx.to_scope();
            assert!(scope.deadline().is_none());
            assert_eq!(CallContext::from_scope(&scope).deadline, 0);
        }
    }

    #[test]
    fn test_deadline_keeps_whole_seconds() {
        let at = DateTime::from_timestamp(4_102_444_800, 999_000_000).unwrap();
        let ctx = CallContext::new("t").with_deadline(at);
        assert_eq!(ctx.deadline, 4_102_444_800);

        let (scope, _guard) = ctx.to_scope();
        assert_eq!(CallContext::from_scope(&scope).deadline, 4_102_444_800);
    }

    #[test]
    fn test_deadline_beyond_chrono_range_round_trips() {
        for deadline in [10_000_000_000_000, i64::MAX] {
            let ctx = CallContext {
                deadline,
                ..CallContext::new("t")
            };
            assert_eq!(ctx.deadline_at(), Some(DateTime::<Utc>::MAX_UTC));

            let (scope, _guard) = ctx.to_scope();
            assert!(scope.deadline().is_some());
            assert_eq!(CallContext::from_scope(&scope), ctx);
        }
    }

    #[test]
    fn test_data_is_aliased_not_copied() {
        // Known sharp edge: writes through the scope are visible in the original context.
        let ctx = populated();
        let (scope, _guard) = ctx.to_scope();

        let same = scope.with_data_value("user", json!("alice"));
        assert_eq!(
            ctx.data.as_ref().unwrap().get("user"),
            Some(json!("alice"))
        );
        assert!(same.data().unwrap().ptr_eq(ctx.data.as_ref().unwrap()));
    }

    #[test]
    fn test_equality_on_identical_map_does_not_deadlock() {
        let data = SharedData::new();
        data.insert("k", 1);
        let alias = data.clone();
        assert_eq!(data, alias);
    }

    #[test]
    fn test_serde_round_trip() {
        let ctx = populated();
        let encoded = serde_json::to_string(&ctx).unwrap();
        let decoded: CallContext = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ctx);
        assert!(!decoded.data.unwrap().ptr_eq(ctx.data.as_ref().unwrap()));
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let ctx: CallContext = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(ctx, CallContext::new("abc"));
    }
}
