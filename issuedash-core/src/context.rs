//! Shared state for one dashboard evaluation run.
//!
//! The context owns the issue tracker handle, the per-run query cache,
//! and the `userdata` value that setup/shutdown and widget scripts use
//! to pass state to each other. One context lives exactly as long as
//! one dashboard evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::expr::{Scope, Value};
use crate::github::IssueSearch;

/// Cached results for one resolved query string.
#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    /// The resolved query this entry was fetched for.
    pub query: String,
    /// Total matches reported by the tracker, refreshed on every fetch.
    pub total_count: u64,
    /// Every item fetched so far, in result order.
    pub items: Vec<serde_json::Value>,
}

/// State threaded through one evaluation run.
pub struct EvaluationContext {
    tracker: Arc<dyn IssueSearch>,
    querycache: HashMap<String, QueryCacheEntry>,
    userdata: Value,
}

impl EvaluationContext {
    pub fn new(tracker: Arc<dyn IssueSearch>) -> Self {
        Self {
            tracker,
            querycache: HashMap::new(),
            userdata: Value::Object(Default::default()),
        }
    }

    pub fn tracker(&self) -> Arc<dyn IssueSearch> {
        Arc::clone(&self.tracker)
    }

    pub fn cache_get(&self, query: &str) -> Option<&QueryCacheEntry> {
        self.querycache.get(query)
    }

    pub fn cache_put(&mut self, entry: QueryCacheEntry) {
        self.querycache.insert(entry.query.clone(), entry);
    }

    /// The names every scope carries: helpers plus the reserved
    /// `github` name, held back from user bindings.
    fn widget_scope(&mut self) -> Scope<'_> {
        let mut scope = Scope::new(&mut self.userdata);
        scope.insert_var("github", Value::Null);
        scope
    }

    /// Top-level scope, which alone also reserves `querycache`.
    pub fn base_scope(&mut self) -> Scope<'_> {
        let mut scope = self.widget_scope();
        scope.insert_var("querycache", Value::Null);
        scope
    }

    /// Scope with the widget's own result bound as `value`.
    pub fn valued_scope(&mut self, value: Value) -> Scope<'_> {
        let mut scope = self.widget_scope();
        scope.insert_var("value", value);
        scope
    }

    /// Scope with one query result item bound as `item`.
    pub fn itemed_scope(&mut self, item: &serde_json::Value) -> Scope<'_> {
        let mut scope = self.widget_scope();
        scope.insert_var("item", Value::from_json(item.clone()));
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::expr::run_script;
    use crate::github::{BoxFuture, SearchPage};

    struct NullTracker;

    impl IssueSearch for NullTracker {
        fn search<'a>(
            &'a self,
            _query: &'a str,
            _per_page: u32,
            _page: u32,
        ) -> BoxFuture<'a, Result<SearchPage>> {
            Box::pin(async {
                Ok(SearchPage {
                    total_count: 0,
                    items: vec![],
                })
            })
        }
    }

    #[test]
    fn test_reserved_names_resolve_to_null() {
        let mut ctx = EvaluationContext::new(Arc::new(NullTracker));
        let mut scope = ctx.base_scope();
        let value = run_script("return github", &mut scope).expect("run");
        assert_eq!(value, Value::Null);
        let value = run_script("return querycache", &mut scope).expect("run");
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_derived_scopes_do_not_carry_querycache() {
        let mut ctx = EvaluationContext::new(Arc::new(NullTracker));
        {
            let mut scope = ctx.valued_scope(Value::Number(1.0));
            assert_eq!(run_script("return github", &mut scope).expect("run"), Value::Null);
            assert!(run_script("return querycache", &mut scope).is_err());
        }
        let item = serde_json::json!({"number": 1});
        let mut scope = ctx.itemed_scope(&item);
        assert!(run_script("return querycache", &mut scope).is_err());
    }

    #[test]
    fn test_reserved_names_cannot_be_rebound() {
        let mut ctx = EvaluationContext::new(Arc::new(NullTracker));
        let mut scope = ctx.base_scope();
        assert!(scope.bind("date", Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_userdata_survives_across_scopes() {
        let mut ctx = EvaluationContext::new(Arc::new(NullTracker));
        {
            let mut scope = ctx.base_scope();
            run_script("userdata.seen = 1", &mut scope).expect("run");
        }
        {
            let mut scope = ctx.valued_scope(Value::Number(9.0));
            let value =
                run_script("return userdata.seen + value", &mut scope).expect("run");
            assert_eq!(value, Value::Number(10.0));
        }
    }

    #[test]
    fn test_cache_entries_keyed_by_query() {
        let mut ctx = EvaluationContext::new(Arc::new(NullTracker));
        ctx.cache_put(QueryCacheEntry {
            query: "is:open".to_string(),
            total_count: 3,
            items: vec![serde_json::json!({"number": 1})],
        });
        assert!(ctx.cache_get("is:open").is_some());
        assert!(ctx.cache_get("is:closed").is_none());
    }
}
