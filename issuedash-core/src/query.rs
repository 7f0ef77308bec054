//! Query execution and per-run result caching.
//!
//! Queries resolve their templates against the evaluation context, then
//! fetch pages of 100 until enough items are on hand. Results are cached
//! under the resolved query string, so two widgets over the same query
//! with different limits cost one round of fetching.

use crate::context::{EvaluationContext, QueryCacheEntry};
use crate::error::{Error, Result};
use crate::expr::render_template;

const FETCH_COUNT: usize = 100;

/// The kind of tracker entity a query searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Issue,
}

/// Results handed back to a widget.
#[derive(Debug, Clone)]
pub struct QueryResults {
    /// Total matches for the query, which may exceed `items.len()`.
    pub total_count: u64,
    /// At most the requested number of items, in result order.
    pub items: Vec<serde_json::Value>,
    /// Browser URL for the resolved query.
    pub url: String,
}

/// Resolve a query template and fetch up to `limit` items for it.
///
/// A cold cache always costs at least one fetch, even at limit 0, so the
/// caller still learns the query's total count.
pub async fn evaluate_query(
    qtype: QueryType,
    query: &str,
    limit: usize,
    ctx: &mut EvaluationContext,
) -> Result<QueryResults> {
    match qtype {
        QueryType::Issue => {}
    }

    let resolved = {
        let mut scope = ctx.base_scope();
        render_template(query, &mut scope)?
    };
    let url = query_to_url(&resolved);

    let mut total: i64 = i64::MAX;
    let mut items: Vec<serde_json::Value> = Vec::new();
    // -1 marks a cold cache and forces the first fetch
    let mut fetched: i64 = -1;
    let mut page: u32 = 0;
    let mut exhausted = false;

    if let Some(cached) = ctx.cache_get(&resolved) {
        total = cached.total_count as i64;
        items = cached.items.clone();
        fetched = items.len() as i64;
        page = (items.len() / FETCH_COUNT) as u32;
        // a short page meant the tracker had nothing further
        exhausted = items.len() % FETCH_COUNT != 0;
    }

    let tracker = ctx.tracker();
    while !exhausted && fetched < limit as i64 && fetched < total {
        page += 1;
        let result = tracker.search(&resolved, FETCH_COUNT as u32, page).await?;

        tracing::debug!(
            query = %resolved,
            page,
            page_items = result.items.len(),
            total_count = result.total_count,
            "fetched query page"
        );

        total = result.total_count.min(i64::MAX as u64) as i64;
        exhausted = result.items.len() < FETCH_COUNT;
        items.extend(result.items);
        fetched = items.len() as i64;
    }

    let total_count = if total == i64::MAX { 0 } else { total as u64 };
    ctx.cache_put(QueryCacheEntry {
        query: resolved,
        total_count,
        items: items.clone(),
    });

    items.truncate(limit);
    Ok(QueryResults {
        total_count,
        items,
        url,
    })
}

/// Translate an issue search query into the browser URL for it.
///
/// The last `repo:owner/name` term selects the repository issue list;
/// the remaining terms become the `q` parameter. Without a repository
/// term the query falls back to global search.
pub fn query_to_url(query: &str) -> String {
    let mut repo = None;
    let mut terms = Vec::new();
    for token in query.split_whitespace() {
        if let Some(name) = token.strip_prefix("repo:") {
            if let Some(previous) = repo.replace(name) {
                // earlier repo terms stay in the query text
                terms.push(format!("repo:{previous}"));
            }
        } else {
            terms.push(token.to_string());
        }
    }
    let encoded = urlencoding::encode(&terms.join(" ")).into_owned();
    match repo {
        Some(repo) => format!("https://github.com/{repo}/issues?q={encoded}"),
        None => format!("https://github.com/search?q={encoded}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::github::{BoxFuture, IssueSearch, SearchPage};

    /// Serves a fixed corpus in 100-item pages and counts fetches.
    struct FakeTracker {
        corpus: Vec<serde_json::Value>,
        fetches: AtomicUsize,
    }

    impl FakeTracker {
        fn with_items(count: usize) -> Self {
            Self {
                corpus: (0..count).map(|n| serde_json::json!({"number": n})).collect(),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl IssueSearch for FakeTracker {
        fn search<'a>(
            &'a self,
            _query: &'a str,
            per_page: u32,
            page: u32,
        ) -> BoxFuture<'a, Result<SearchPage>> {
            Box::pin(async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                let start = ((page - 1) * per_page) as usize;
                let end = (start + per_page as usize).min(self.corpus.len());
                let items = if start < self.corpus.len() {
                    self.corpus[start..end].to_vec()
                } else {
                    vec![]
                };
                Ok(SearchPage {
                    total_count: self.corpus.len() as u64,
                    items,
                })
            })
        }
    }

    #[test]
    fn test_query_to_url_extracts_repo() {
        assert_eq!(
            query_to_url("is:open repo:foo/bar label:bug"),
            "https://github.com/foo/bar/issues?q=is%3Aopen%20label%3Abug"
        );
    }

    #[test]
    fn test_query_to_url_last_repo_wins() {
        assert_eq!(
            query_to_url("repo:a/b is:open repo:c/d"),
            "https://github.com/c/d/issues?q=repo%3Aa%2Fb%20is%3Aopen"
        );
    }

    #[test]
    fn test_query_to_url_without_repo_is_global_search() {
        assert_eq!(
            query_to_url("is:open label:bug"),
            "https://github.com/search?q=is%3Aopen%20label%3Abug"
        );
    }

    #[tokio::test]
    async fn test_limit_caps_returned_items() {
        let tracker = Arc::new(FakeTracker::with_items(42));
        let mut ctx = EvaluationContext::new(tracker);
        let results = evaluate_query(QueryType::Issue, "is:open", 5, &mut ctx)
            .await
            .expect("query");
        assert_eq!(results.total_count, 42);
        assert_eq!(results.items.len(), 5);
        assert_eq!(results.items[0], serde_json::json!({"number": 0}));
    }

    #[tokio::test]
    async fn test_second_query_within_fetched_range_hits_cache() {
        let tracker = Arc::new(FakeTracker::with_items(42));
        let mut ctx = EvaluationContext::new(Arc::clone(&tracker) as Arc<dyn IssueSearch>);

        let first = evaluate_query(QueryType::Issue, "is:open", 5, &mut ctx)
            .await
            .expect("query");
        assert_eq!(first.items.len(), 5);
        assert_eq!(tracker.fetch_count(), 1);

        let second = evaluate_query(QueryType::Issue, "is:open", 50, &mut ctx)
            .await
            .expect("query");
        assert_eq!(second.items.len(), 42);
        assert_eq!(tracker.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_still_learns_total_count() {
        let tracker = Arc::new(FakeTracker::with_items(17));
        let mut ctx = EvaluationContext::new(Arc::clone(&tracker) as Arc<dyn IssueSearch>);

        let results = evaluate_query(QueryType::Issue, "is:open", 0, &mut ctx)
            .await
            .expect("query");
        assert_eq!(results.total_count, 17);
        assert!(results.items.is_empty());
        assert_eq!(tracker.fetch_count(), 1);

        // the count fetch warmed the cache too
        evaluate_query(QueryType::Issue, "is:open", 10, &mut ctx)
            .await
            .expect("query");
        assert_eq!(tracker.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_multi_page_fetch() {
        let tracker = Arc::new(FakeTracker::with_items(250));
        let mut ctx = EvaluationContext::new(Arc::clone(&tracker) as Arc<dyn IssueSearch>);

        let results = evaluate_query(QueryType::Issue, "is:open", 150, &mut ctx)
            .await
            .expect("query");
        assert_eq!(results.items.len(), 150);
        assert_eq!(tracker.fetch_count(), 2);

        // asking past the cached pages resumes where fetching stopped
        let results = evaluate_query(QueryType::Issue, "is:open", 250, &mut ctx)
            .await
            .expect("query");
        assert_eq!(results.items.len(), 250);
        assert_eq!(tracker.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_query_template_resolves_before_fetch() {
        let tracker = Arc::new(FakeTracker::with_items(1));
        let mut ctx = EvaluationContext::new(Arc::clone(&tracker) as Arc<dyn IssueSearch>);

        evaluate_query(QueryType::Issue, "created:>{{1000+500}}", 1, &mut ctx)
            .await
            .expect("query");
        assert!(ctx.cache_get("created:>1500").is_some());
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let tracker = Arc::new(FakeTracker::with_items(0));
        let mut ctx = EvaluationContext::new(Arc::clone(&tracker) as Arc<dyn IssueSearch>);

        let results = evaluate_query(QueryType::Issue, "is:open", 10, &mut ctx)
            .await
            .expect("query");
        assert_eq!(results.total_count, 0);
        assert!(results.items.is_empty());
        assert_eq!(tracker.fetch_count(), 1);

        // exhaustion is cached; no further fetches
        evaluate_query(QueryType::Issue, "is:open", 10, &mut ctx)
            .await
            .expect("query");
        assert_eq!(tracker.fetch_count(), 1);
    }
}
