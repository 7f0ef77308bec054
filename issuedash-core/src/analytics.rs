//! Dashboard structure and top-level evaluation.
//!
//! Evaluation walks the configured tree in document order: the setup
//! script first, then every section's widgets, then the dashboard's own
//! title and description, then the shutdown script. Ordering is
//! observable through `userdata`, so it is part of the contract.

use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::Result;
use crate::expr::{render_template, run_script};
use crate::github::IssueSearch;
use crate::widget::Widget;

/// A titled group of widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: Option<String>,
    pub description: Option<String>,
    pub widgets: Vec<Widget>,
}

/// A dashboard definition, before or after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Analytics {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sections: Vec<Section>,
    pub setup: Option<String>,
    pub shutdown: Option<String>,
}

impl Section {
    async fn evaluate(&self, ctx: &mut EvaluationContext) -> Result<Section> {
        let mut widgets = Vec::with_capacity(self.widgets.len());
        for widget in &self.widgets {
            widgets.push(widget.evaluate(ctx).await?);
        }

        let title = resolve(&self.title, ctx)?;
        let description = resolve(&self.description, ctx)?;

        Ok(Section {
            title,
            description,
            widgets,
        })
    }
}

impl Analytics {
    /// Evaluate a dashboard definition against an issue tracker,
    /// producing a static tree ready for rendering.
    pub async fn evaluate(
        config: &Analytics,
        tracker: Arc<dyn IssueSearch>,
    ) -> Result<Analytics> {
        let mut ctx = EvaluationContext::new(tracker);

        if let Some(setup) = &config.setup {
            tracing::debug!("running setup script");
            let mut scope = ctx.base_scope();
            run_script(setup, &mut scope)?;
        }

        let mut sections = Vec::with_capacity(config.sections.len());
        for section in &config.sections {
            sections.push(section.evaluate(&mut ctx).await?);
        }

        let title = resolve(&config.title, &mut ctx)?;
        let description = resolve(&config.description, &mut ctx)?;

        if let Some(shutdown) = &config.shutdown {
            tracing::debug!("running shutdown script");
            let mut scope = ctx.base_scope();
            run_script(shutdown, &mut scope)?;
        }

        Ok(Analytics {
            title,
            description,
            sections,
            setup: None,
            shutdown: None,
        })
    }
}

fn resolve(template: &Option<String>, ctx: &mut EvaluationContext) -> Result<Option<String>> {
    match template {
        Some(template) => {
            let mut scope = ctx.base_scope();
            Ok(Some(render_template(template, &mut scope)?))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{BoxFuture, SearchPage};
    use crate::widget::{NumberValue, NumberWidget, ScriptNumberWidget};

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

    fn script_number(script: &str) -> Widget {
        Widget::ScriptNumber(ScriptNumberWidget {
            title: None,
            url: None,
            script: script.to_string(),
            color: None,
        })
    }

    #[tokio::test]
    async fn test_sections_evaluate_in_order() {
        let config = Analytics {
            title: Some("Totals: {{userdata.count}}".to_string()),
            description: None,
            sections: vec![
                Section {
                    title: None,
                    description: None,
                    widgets: vec![script_number(
                        "userdata.count = userdata.count + 1; return userdata.count",
                    )],
                },
                Section {
                    title: Some("after {{userdata.count}} widgets".to_string()),
                    description: None,
                    widgets: vec![script_number(
                        "userdata.count = userdata.count + 1; return userdata.count",
                    )],
                },
            ],
            setup: Some("userdata.count = 0".to_string()),
            shutdown: None,
        };

        let result = Analytics::evaluate(&config, Arc::new(NullTracker))
            .await
            .expect("evaluate");

        match &result.sections[0].widgets[0] {
            Widget::Number(NumberWidget { value: NumberValue::Literal(n), .. }) => {
                assert_eq!(*n, 1.0);
            }
            other => panic!("expected number widget, got {other:?}"),
        }
        match &result.sections[1].widgets[0] {
            Widget::Number(NumberWidget { value: NumberValue::Literal(n), .. }) => {
                assert_eq!(*n, 2.0);
            }
            other => panic!("expected number widget, got {other:?}"),
        }
        // section titles resolve after that section's widgets
        assert_eq!(result.sections[1].title.as_deref(), Some("after 2 widgets"));
        // the dashboard title resolves after every section
        assert_eq!(result.title.as_deref(), Some("Totals: 2"));
        assert!(result.setup.is_none());
        assert!(result.shutdown.is_none());
    }

    #[tokio::test]
    async fn test_setup_state_visible_to_widgets() {
        let config = Analytics {
            title: None,
            description: None,
            sections: vec![Section {
                title: None,
                description: None,
                widgets: vec![script_number("return userdata.base * 2")],
            }],
            setup: Some("userdata.base = 21".to_string()),
            shutdown: Some("userdata.base = 0".to_string()),
        };

        let result = Analytics::evaluate(&config, Arc::new(NullTracker))
            .await
            .expect("evaluate");
        match &result.sections[0].widgets[0] {
            Widget::Number(NumberWidget { value: NumberValue::Literal(n), .. }) => {
                assert_eq!(*n, 42.0);
            }
            other => panic!("expected number widget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_script_error_aborts_evaluation() {
        let config = Analytics {
            title: None,
            description: None,
            sections: vec![],
            setup: Some("nosuchname + 1".to_string()),
            shutdown: None,
        };
        assert!(Analytics::evaluate(&config, Arc::new(NullTracker)).await.is_err());
    }
}
