//! Runtime view of a single call: cancellation, deadline and attached values.

use crate::claims::Token;
use crate::context::SharedData;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a call scope is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The scope was cancelled explicitly, or its guard was dropped.
    #[error("call scope cancelled")]
    Cancelled,

    /// The scope's deadline passed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

/// A call in progress.
///
/// Produced by [`CallContext::to_scope`](crate::CallContext::to_scope). Cloning a scope is
/// cheap; all clones observe the same cancellation and the same data map.
#[derive(Debug, Clone)]
pub struct CallScope {
    cancel: CancellationToken,
    reason: Arc<OnceLock<ScopeError>>,
    deadline: Option<DateTime<Utc>>,
    deadline_secs: i64,
    token: Token,
    tracing_id: String,
    data: Option<SharedData>,
}

impl CallScope {
    pub(crate) fn new(
        deadline_secs: i64,
        token: Token,
        tracing_id: String,
        data: Option<SharedData>,
    ) -> (Self, CancelGuard) {
        Self::with_cancel(CancellationToken::new(), deadline_secs, token, tracing_id, data)
    }

    fn with_cancel(
        cancel: CancellationToken,
        deadline_secs: i64,
        token: Token,
        tracing_id: String,
        data: Option<SharedData>,
    ) -> (Self, CancelGuard) {
        let deadline_secs = deadline_secs.max(0);
        let deadline = deadline_from_secs(deadline_secs);
        let reason = Arc::new(OnceLock::new());
        let timer = deadline.and_then(|at| spawn_deadline_timer(&cancel, &reason, at));

        let guard = CancelGuard {
            cancel: cancel.clone(),
            reason: Arc::clone(&reason),
            deadline,
            timer,
        };
        let scope = Self {
            cancel,
            reason,
            deadline,
            deadline_secs,
            token,
            tracing_id,
            data,
        };
        (scope, guard)
    }

    /// A root scope with no values and no deadline that is never cancelled.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            deadline: None,
            deadline_secs: 0,
            token: Token::empty(),
            tracing_id: String::new(),
            data: None,
        }
    }

    /// Derive a child scope with its own guard.
    ///
    /// The child is cancelled when this scope is, shares its deadline and values,
    /// and shares the same data map.
    pub fn child(&self) -> (Self, CancelGuard) {
        Self::with_cancel(
            self.cancel.child_token(),
            self.deadline_secs,
            self.token.clone(),
            self.tracing_id.clone(),
            self.data.clone(),
        )
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn tracing_id(&self) -> &str {
        &self.tracing_id
    }

    /// Deadline as a point in time. Deadlines past chrono's range saturate at its maximum.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Deadline as unix seconds, exactly as it was given. Zero means none.
    pub fn deadline_secs(&self) -> i64 {
        self.deadline_secs
    }

    /// Time left until the deadline, if one is set. Negative once it has passed.
    pub fn remaining(&self) -> Option<chrono::Duration> {
        self.deadline.map(|at| at - Utc::now())
    }

    /// The data map attached to this scope, if any.
    pub fn data(&self) -> Option<SharedData> {
        self.data.clone()
    }

    /// Look up a single value in the data map.
    pub fn data_value(&self, key: &str) -> Option<Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    /// Attach a key/value pair to the scope's data map.
    ///
    /// If the scope already carries a map the value is inserted in place, so every
    /// holder of this scope lineage (and the originating context) sees it. Otherwise
    /// a new map is created for the returned scope only.
    pub fn with_data_value(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(data) = &self.data {
            data.insert(key, value);
            return self.clone();
        }

        let data = SharedData::new();
        data.insert(key, value);
        Self {
            data: Some(data),
            ..self.clone()
        }
    }

    /// Token for integrating with other cancellation-aware code.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Why the scope is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ScopeError> {
        if let Some(reason) = self.reason.get() {
            return Some(*reason);
        }
        if deadline_passed(self.deadline) {
            return Some(ScopeError::DeadlineExceeded);
        }
        if self.cancel.is_cancelled() {
            return Some(ScopeError::Cancelled);
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the scope is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let Some(at) = self.deadline else {
            self.cancel.cancelled().await;
            return;
        };

        let wait = (at - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

/// Releases a [`CallScope`] when dropped.
///
/// Dropping the guard cancels the scope and stops its deadline timer. Keep it alive
/// for exactly as long as the call runs.
#[must_use = "dropping the guard cancels the call scope"]
#[derive(Debug)]
pub struct CancelGuard {
    cancel: CancellationToken,
    reason: Arc<OnceLock<ScopeError>>,
    deadline: Option<DateTime<Utc>>,
    timer: Option<JoinHandle<()>>,
}

impl CancelGuard {
    /// Cancel the scope now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let reason = if deadline_passed(self.deadline) {
            ScopeError::DeadlineExceeded
        } else {
            ScopeError::Cancelled
        };
        let _ = self.reason.set(reason);
        self.cancel.cancel();

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Zero or negative means no deadline.
pub(crate) fn deadline_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Some(DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC))
}

fn deadline_passed(deadline: Option<DateTime<Utc>>) -> bool {
    deadline.is_some_and(|at| Utc::now() >= at)
}

/// Cancel the scope when the deadline passes. Needs a tokio runtime; without one the
/// deadline is still observed by `err`/`is_cancelled`.
fn spawn_deadline_timer(
    cancel: &CancellationToken,
    reason: &Arc<OnceLock<ScopeError>>,
    at: DateTime<Utc>,
) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let cancel = cancel.clone();
    let reason = Arc::clone(reason);
    let wait = (at - Utc::now()).to_std().unwrap_or_default();

    Some(handle.spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {
                let _ = reason.set(ScopeError::DeadlineExceeded);
                cancel.cancel();
                tracing::debug!(deadline = %at, "Call scope deadline exceeded");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use chrono::Duration;
    use serde_json::json;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_no_deadline_scope_only_ends_on_cancel() {
        let (scope, guard) = CallContext::new("t").to_scope();
        assert!(scope.deadline().is_none());
        assert!(!scope.is_cancelled());

        guard.cancel();
        assert_eq!(scope.err(), Some(ScopeError::Cancelled));
    }

    #[test]
    fn test_dropping_guard_cancels_scope() {
        let scope = {
            let (scope, _guard) = CallContext::new("t").to_scope();
            scope
        };
        assert!(scope.cancellation_token().is_cancelled());
        assert_eq!(scope.err(), Some(ScopeError::Cancelled));
    }

    #[test]
    fn test_past_deadline_is_observed_without_runtime() {
        let ctx = CallContext::new("t").with_deadline(Utc::now() - Duration::seconds(5));
        let (scope, _guard) = ctx.to_scope();
        assert_eq!(scope.err(), Some(ScopeError::DeadlineExceeded));
        assert!(scope.remaining().unwrap() < Duration::zero());
    }

    #[tokio::test]
    async fn test_deadline_cancels_token_automatically() {
        let ctx = CallContext::new("t").with_deadline(Utc::now() + Duration::seconds(2));
        let (scope, _guard) = ctx.to_scope();
        assert!(!scope.is_cancelled());

        tokio::time::timeout(StdDuration::from_secs(5), scope.cancellation_token().cancelled())
            .await
            .expect("deadline timer should cancel the token");
        assert_eq!(scope.err(), Some(ScopeError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancelled_future_completes_on_guard_drop() {
        let ctx = CallContext::new("t").with_deadline(Utc::now() + Duration::hours(1));
        let (scope, guard) = ctx.to_scope();

        let waiter = tokio::spawn({
            let scope = scope.clone();
            async move { scope.cancelled().await }
        });
        drop(guard);

        tokio::time::timeout(StdDuration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scope.err(), Some(ScopeError::Cancelled));
    }

    #[test]
    fn test_child_is_cancelled_with_parent() {
        let (parent, parent_guard) = CallContext::new("t").to_scope();
        let (child, _child_guard) = parent.child();

        drop(parent_guard);
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_touch_parent() {
        let (parent, _parent_guard) = CallContext::new("t").to_scope();
        let (child, child_guard) = parent.child();

        drop(child_guard);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_with_data_value_on_empty_scope_creates_map() {
        let scope = CallScope::background();
        let with = scope.with_data_value("key", json!("value"));

        assert!(scope.data().is_none());
        assert_eq!(with.data_value("key"), Some(json!("value")));
        assert_eq!(with.data().unwrap().len(), 1);
    }

    #[test]
    fn test_with_data_value_accumulates_in_one_map() {
        let first = CallScope::background().with_data_value("a", 1);
        let second = first.with_data_value("b", 2);
        let (child, _guard) = second.child();
        let third = child.with_data_value("c", 3);

        // All share one map rather than nesting
        let data = first.data().unwrap();
        assert_eq!(data.len(), 3);
        assert!(data.ptr_eq(&third.data().unwrap()));
        assert_eq!(first.data_value("c"), Some(json!(3)));
    }

    #[test]
    fn test_data_value_missing() {
        assert_eq!(CallScope::background().data_value("nope"), None);
        let scope = CallScope::background().with_data_value("a", 1);
        assert_eq!(scope.data_value("nope"), None);
    }

    #[test]
    fn test_deadline_beyond_chrono_range_saturates() {
        let ctx = CallContext {
            deadline: i64::MAX,
            ..CallContext::new("t")
        };
        let (scope, _guard) = ctx.to_scope();

        assert_eq!(scope.deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert_eq!(scope.deadline_secs(), i64::MAX);
        assert!(!scope.is_cancelled());
    }

    #[test]
    fn test_background_is_empty() {
        let scope = CallScope::background();
        assert!(scope.token().is_empty());
        assert!(scope.tracing_id().is_empty());
        assert!(scope.deadline().is_none());
        assert!(!scope.is_cancelled());
    }
}
