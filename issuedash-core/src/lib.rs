//! # issuedash-core
//!
//! Core library for issuedash - a dashboard generator for issue
//! trackers.
//!
//! This library provides:
//! - A widget data model for dashboards (numbers, strings, graphs, tables)
//! - A `{{ }}` template and script language for computed values
//! - Query execution with per-run caching over the GitHub search API
//! - A date arithmetic mini-language for relative date expressions
//! - Markdown and HTML renderers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use issuedash_core::{Analytics, AnalyticsConfig, GithubSearchClient};
//!
//! # async fn run() -> issuedash_core::Result<()> {
//! let config = AnalyticsConfig::from_yaml(&std::fs::read_to_string("dashboard.yml")?)?;
//! let tracker = Arc::new(GithubSearchClient::new(std::env::var("GITHUB_TOKEN").ok().as_deref())?);
//! let evaluated = Analytics::evaluate(&config.analytics, tracker).await?;
//! issuedash_core::render::write(&evaluated, &config.output)?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{Analytics, Section};
pub use config::{AnalyticsConfig, Output};
pub use context::EvaluationContext;
pub use error::{Error, Result};
pub use github::{GithubSearchClient, IssueSearch, SearchPage};
pub use query::{QueryResults, QueryType};
pub use widget::Widget;

// Public modules
pub mod analytics;
pub mod config;
pub mod context;
pub mod dateparse;
pub mod error;
pub mod expr;
pub mod github;
pub mod logging;
pub mod query;
pub mod render;
pub mod widget;
