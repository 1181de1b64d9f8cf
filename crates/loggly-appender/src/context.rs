// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context property scopes.
//!
//! Three stores contribute properties to every formatted event:
//!
//! - [`GlobalContext`]: process wide, only the keys listed in
//!   `global_context_keys` are included.
//! - [`ThreadContext`]: per OS thread, every key is included.
//! - [`LogicalContext`]: flows with a tokio task, only the keys listed in
//!   `logical_thread_context_keys` are included. Outside a scope it is empty.
//!
//! The stores are read on the producing thread when an event is appended,
//! producing a [`ContextSnapshot`].

use std::cell::RefCell;
use std::future::Future;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::config::Config;
use crate::event::{PropertyMap, PropertyValue};

static GLOBAL: OnceLock<RwLock<PropertyMap>> = OnceLock::new();

thread_local! {
    static THREAD: RefCell<PropertyMap> = RefCell::new(PropertyMap::new());
}

tokio::task_local! {
    static LOGICAL: RefCell<PropertyMap>;
}

fn global() -> &'static RwLock<PropertyMap> {
    GLOBAL.get_or_init(|| RwLock::new(PropertyMap::new()))
}

/// Process wide properties.
pub struct GlobalContext;

impl GlobalContext {
    pub fn set(key: impl Into<String>, value: impl Into<PropertyValue>) {
        global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(key: &str) -> Option<PropertyValue> {
        global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn remove(key: &str) -> Option<PropertyValue> {
        global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn clear() {
        global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Properties of the current OS thread.
pub struct ThreadContext;

impl ThreadContext {
    pub fn set(key: impl Into<String>, value: impl Into<PropertyValue>) {
        THREAD.with(|map| {
            map.borrow_mut().insert(key.into(), value.into());
        });
    }

    #[must_use]
    pub fn get(key: &str) -> Option<PropertyValue> {
        THREAD.with(|map| map.borrow().get(key).cloned())
    }

    pub fn remove(key: &str) -> Option<PropertyValue> {
        THREAD.with(|map| map.borrow_mut().remove(key))
    }

    #[must_use]
    pub fn keys() -> Vec<String> {
        THREAD.with(|map| map.borrow().keys().cloned().collect())
    }

    pub fn clear() {
        THREAD.with(|map| map.borrow_mut().clear());
    }

    #[must_use]
    pub fn snapshot() -> PropertyMap {
        THREAD.with(|map| map.borrow().clone())
    }
}

/// Properties that follow a logical flow of execution across `.await` points.
pub struct LogicalContext;

impl LogicalContext {
    /// Runs `future` in a new logical scope.
    ///
    /// The scope starts with a copy of the enclosing scope's properties, so
    /// values set inside do not leak out.
    pub async fn scope<F>(future: F) -> F::Output
    where
        F: Future,
    {
        LOGICAL.scope(RefCell::new(Self::current()), future).await
    }

    /// Synchronous counterpart of [`LogicalContext::scope`].
    pub fn sync_scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        LOGICAL.sync_scope(RefCell::new(Self::current()), f)
    }

    /// Returns `false` when called outside a logical scope.
    pub fn set(key: impl Into<String>, value: impl Into<PropertyValue>) -> bool {
        let (key, value) = (key.into(), value.into());
        LOGICAL
            .try_with(|map| {
                map.borrow_mut().insert(key, value);
            })
            .is_ok()
    }

    #[must_use]
    pub fn get(key: &str) -> Option<PropertyValue> {
        LOGICAL
            .try_with(|map| map.borrow().get(key).cloned())
            .ok()
            .flatten()
    }

    pub fn remove(key: &str) -> Option<PropertyValue> {
        LOGICAL
            .try_with(|map| map.borrow_mut().remove(key))
            .ok()
            .flatten()
    }

    fn current() -> PropertyMap {
        LOGICAL
            .try_with(|map| map.borrow().clone())
            .unwrap_or_default()
    }
}

/// Context properties captured for one event.
///
/// Global and logical entries keep the order of the configured key lists,
/// thread entries are sorted by key.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub global: Vec<(String, PropertyValue)>,
    pub thread: Vec<(String, PropertyValue)>,
    pub logical: Vec<(String, PropertyValue)>,
}

impl ContextSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.thread.is_empty() && self.logical.is_empty()
    }
}

/// Where the appender reads context properties from.
pub trait ContextSource: Send + Sync {
    fn snapshot(&self, config: &Config) -> ContextSnapshot;
}

/// Reads the [`GlobalContext`], [`ThreadContext`] and [`LogicalContext`] stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedContext;

impl ContextSource for ScopedContext {
    fn snapshot(&self, config: &Config) -> ContextSnapshot {
        let global = config
            .global_context_keys
            .iter()
            .filter_map(|key| GlobalContext::get(key).map(|value| (key.clone(), value)))
            .collect();

        let mut thread: Vec<_> = ThreadContext::snapshot().into_iter().collect();
        thread.sort_by(|a, b| a.0.cmp(&b.0));

        let logical = config
            .logical_thread_context_keys
            .iter()
            .filter_map(|key| LogicalContext::get(key).map(|value| (key.clone(), value)))
            .collect();

        ContextSnapshot {
            global,
            thread,
            logical,
        }
    }
}

/// A source that returns nothing, for hosts without context scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextSource for NoContext {
    fn snapshot(&self, _config: &Config) -> ContextSnapshot {
        ContextSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn resolved(entries: &[(String, PropertyValue)]) -> Vec<(String, serde_json::Value)> {
        entries
            .iter()
            .filter_map(|(key, value)| value.resolve().map(|value| (key.clone(), value)))
            .collect()
    }

    #[test]
    #[serial]
    fn test_global_context_set_get_remove() {
        GlobalContext::clear();
        GlobalContext::set("app", "checkout");
        assert!(matches!(GlobalContext::get("app"), Some(PropertyValue::Value(_))));
        assert!(GlobalContext::remove("app").is_some());
        assert!(GlobalContext::get("app").is_none());
    }

    #[test]
    fn test_thread_context_is_per_thread() {
        ThreadContext::clear();
        ThreadContext::set("request", "r-1");

        let other = std::thread::spawn(|| ThreadContext::get("request").is_none())
            .join()
            .expect("join");
        assert!(other);
        assert_eq!(ThreadContext::keys(), vec!["request"]);
        ThreadContext::clear();
    }

    #[test]
    fn test_logical_context_outside_scope() {
        assert!(!LogicalContext::set("flow", "outside"));
        assert!(LogicalContext::get("flow").is_none());
    }

    #[tokio::test]
    async fn test_logical_context_flows_across_await() {
        let value = LogicalContext::scope(async {
            assert!(LogicalContext::set("flow", "f-1"));
            tokio::task::yield_now().await;
            LogicalContext::get("flow").and_then(|value| value.resolve())
        })
        .await;
        assert_eq!(value, Some(json!("f-1")));
        assert!(LogicalContext::get("flow").is_none());
    }

    #[test]
    fn test_nested_logical_scope_does_not_leak() {
        LogicalContext::sync_scope(|| {
            LogicalContext::set("outer", 1_i64);
            LogicalContext::sync_scope(|| {
                assert!(LogicalContext::get("outer").is_some());
                LogicalContext::set("inner", 2_i64);
            });
            assert!(LogicalContext::get("inner").is_none());
        });
    }

    #[test]
    #[serial]
    fn test_scoped_context_applies_allow_lists() {
        GlobalContext::clear();
        GlobalContext::set("listed", "yes");
        GlobalContext::set("unlisted", "no");
        ThreadContext::clear();
        ThreadContext::set("b", "thread-b");
        ThreadContext::set("a", "thread-a");

        let config = Config {
            global_context_keys: vec!["listed".to_string(), "missing".to_string()],
            logical_thread_context_keys: vec!["flow".to_string()],
            ..Default::default()
        };

        let snapshot = LogicalContext::sync_scope(|| {
            LogicalContext::set("flow", "f-1");
            LogicalContext::set("other", "ignored");
            ScopedContext.snapshot(&config)
        });

        assert_eq!(
            resolved(&snapshot.global),
            vec![("listed".to_string(), json!("yes"))]
        );
        assert_eq!(
            resolved(&snapshot.thread),
            vec![
                ("a".to_string(), json!("thread-a")),
                ("b".to_string(), json!("thread-b")),
            ]
        );
        assert_eq!(
            resolved(&snapshot.logical),
            vec![("flow".to_string(), json!("f-1"))]
        );

        GlobalContext::clear();
        ThreadContext::clear();
    }

    #[test]
    fn test_no_context_is_empty() {
        assert!(NoContext.snapshot(&Config::default()).is_empty());
    }
}
