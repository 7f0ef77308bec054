//! End to end: load a YAML definition, evaluate it against a canned
//! tracker, and render the result.

use std::sync::Arc;

use issuedash_core::render;
use issuedash_core::{Analytics, AnalyticsConfig, IssueSearch, Result, SearchPage};

struct CannedTracker {
    items: Vec<serde_json::Value>,
}

impl IssueSearch for CannedTracker {
    fn search<'a>(
        &'a self,
        _query: &'a str,
        per_page: u32,
        page: u32,
    ) -> issuedash_core::github::BoxFuture<'a, Result<SearchPage>> {
        Box::pin(async move {
            let start = ((page - 1) * per_page) as usize;
            let end = (start + per_page as usize).min(self.items.len());
            let items = if start < self.items.len() {
                self.items[start..end].to_vec()
            } else {
                vec![]
            };
            Ok(SearchPage {
                total_count: self.items.len() as u64,
                items,
            })
        })
    }
}

fn tracker() -> Arc<CannedTracker> {
    Arc::new(CannedTracker {
        items: vec![
            serde_json::json!({
                "number": 101,
                "title": "crash on startup",
                "html_url": "https://github.com/foo/bar/issues/101",
            }),
            serde_json::json!({
                "number": 102,
                "title": "typo in docs",
                "html_url": "https://github.com/foo/bar/issues/102",
            }),
        ],
    })
}

const DASHBOARD: &str = "\
title: 'Issues as of {{date()}}'
setup: 'userdata.threshold = 1'
output:
  format: markdown
sections:
  - title: Bug counts
    widgets:
      - type: number
        title: Open bugs
        issue_query: 'is:open label:bug repo:foo/bar'
        color: \"{{value > userdata.threshold ? 'red' : 'green'}}\"
      - type: number
        title: Target
        value: 10
  - title: Open bugs
    widgets:
      - type: table
        issue_query: 'is:open label:bug repo:foo/bar'
        limit: 5
";

#[tokio::test]
async fn test_yaml_to_markdown() {
    issuedash_core::logging::init_test();

    let config = AnalyticsConfig::from_yaml(DASHBOARD).expect("load");
    let evaluated = Analytics::evaluate(&config.analytics, tracker())
        .await
        .expect("evaluate");

    let markdown = render::render(&evaluated, &config.output).expect("render");

    // title template resolved to a real date
    let title = evaluated.title.as_deref().expect("title");
    assert!(title.starts_with("Issues as of 2"), "unexpected title {title:?}");

    // query number got the total count, its color template saw the
    // value and the setup script's state
    assert!(markdown.contains("| Open bugs | [\u{1f534} 2]("));
    assert!(markdown.contains("| Target | 10 |"));

    // the query table shows default fields with item links
    assert!(markdown.contains("| Issue | Title |"));
    assert!(markdown.contains("[101](https://github.com/foo/bar/issues/101)"));
    assert!(markdown.contains("[typo in docs](https://github.com/foo/bar/issues/102)"));

    // the query number and the query table shared one cache entry
    let url = "https://github.com/foo/bar/issues?q=is%3Aopen%20label%3Abug";
    assert!(markdown.contains(url));
}

#[tokio::test]
async fn test_html_output() {
    let config = AnalyticsConfig::from_json(
        r#"{
            "title": "D",
            "output": {"format": "html"},
            "sections": [
                {"widgets": [{"type": "string", "value": "hello {{1+1}}"}]}
            ]
        }"#,
    )
    .expect("load");
    let evaluated = Analytics::evaluate(&config.analytics, tracker())
        .await
        .expect("evaluate");
    let html = render::render(&evaluated, &config.output).expect("render");
    assert!(html.contains("<span class=\"value\">hello 2</span>"));
}
