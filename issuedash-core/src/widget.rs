//! The widget data model and its evaluation.
//!
//! A dashboard is a tree of widgets. Evaluation maps each widget to its
//! static form: query widgets collapse to number or table widgets,
//! script widgets to number or string widgets, and every template in a
//! title, url, color or align field is resolved. The evaluated tree
//! contains only literal values and is what the renderers consume.

use crate::context::EvaluationContext;
use crate::error::{Error, Result};
use crate::expr::{coerce_number, render_template, run_script, Value};
use crate::github::BoxFuture;
use crate::query::{evaluate_query, QueryType};

/// A widget, either as configured or as evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Number(NumberWidget),
    QueryNumber(QueryNumberWidget),
    ScriptNumber(ScriptNumberWidget),
    String(StringWidget),
    ScriptString(ScriptStringWidget),
    Graph(GraphWidget),
    Table(TableWidget),
    QueryTable(QueryTableWidget),
}

/// A numeric value: either already a number, or a template that
/// resolves to one.
#[derive(Debug, Clone, PartialEq)]
pub enum NumberValue {
    Literal(f64),
    Template(String),
}

/// Displays a single numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub value: NumberValue,
    pub color: Option<String>,
}

/// Runs an issue query and displays its total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryNumberWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub query_type: QueryType,
    pub query: String,
    pub color: Option<String>,
}

/// Runs a script and displays its result as a number.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptNumberWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub script: String,
    pub color: Option<String>,
}

/// Displays a single string value.
#[derive(Debug, Clone, PartialEq)]
pub struct StringWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub value: String,
    pub align: Option<String>,
    pub color: Option<String>,
}

/// Runs a script and displays its result as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStringWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub script: String,
    pub align: Option<String>,
    pub color: Option<String>,
}

/// Displays several numeric values against each other, usually as a
/// bar graph. The elements must evaluate to number widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub elements: Vec<Widget>,
}

/// A table of widgets. Headers and cells must evaluate to number or
/// string widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub headers: Vec<Widget>,
    pub elements: Vec<Vec<Widget>>,
}

/// Runs an issue query and displays one row per result item.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTableWidget {
    pub title: Option<String>,
    pub url: Option<String>,
    pub query_type: QueryType,
    pub query: String,
    pub limit: usize,
    pub fields: Vec<Field>,
}

/// One column of a query table.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Shorthand: an item property name, doubling as the header.
    Property(String),
    Spec {
        title: Option<String>,
        /// Item property read raw into the cell.
        property: Option<String>,
        /// Template evaluated per item with `item` bound; takes
        /// precedence over `property`.
        value: Option<String>,
    },
}

impl QueryTableWidget {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn default_fields(query_type: QueryType) -> Vec<Field> {
        match query_type {
            QueryType::Issue => vec![
                Field::Spec {
                    title: Some("Issue".to_string()),
                    property: Some("number".to_string()),
                    value: None,
                },
                Field::Spec {
                    title: Some("Title".to_string()),
                    property: Some("title".to_string()),
                    value: None,
                },
            ],
        }
    }

    fn headers(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| match field {
                Field::Property(name) => name.clone(),
                Field::Spec { title, property, value } => title
                    .clone()
                    .or_else(|| value.clone())
                    .or_else(|| property.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn row(&self, item: &serde_json::Value, ctx: &mut EvaluationContext) -> Result<Vec<String>> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let cell = match field {
                Field::Spec { value: Some(template), .. } => {
                    let mut scope = ctx.itemed_scope(item);
                    render_template(template, &mut scope)?
                }
                Field::Spec { property, .. } => {
                    let name = property.as_deref().unwrap_or_default();
                    property_string(item, name)
                }
                Field::Property(name) => property_string(item, name),
            };
            values.push(cell);
        }
        Ok(values)
    }
}

fn property_string(item: &serde_json::Value, name: &str) -> String {
    match item.get(name) {
        Some(value) => Value::from_json(value.clone()).to_display_string(),
        None => String::new(),
    }
}

impl Widget {
    pub fn kind(&self) -> &'static str {
        match self {
            Widget::Number(_) => "number",
            Widget::QueryNumber(_) => "query number",
            Widget::ScriptNumber(_) => "script number",
            Widget::String(_) => "string",
            Widget::ScriptString(_) => "script string",
            Widget::Graph(_) => "graph",
            Widget::Table(_) => "table",
            Widget::QueryTable(_) => "query table",
        }
    }

    /// Evaluate this widget to its static form.
    pub fn evaluate<'a>(
        &'a self,
        ctx: &'a mut EvaluationContext,
    ) -> BoxFuture<'a, Result<Widget>> {
        Box::pin(async move {
            match self {
                Widget::Number(w) => evaluate_number(w, ctx).await,
                Widget::QueryNumber(w) => evaluate_query_number(w, ctx).await,
                Widget::ScriptNumber(w) => evaluate_script_number(w, ctx).await,
                Widget::String(w) => evaluate_string(w, ctx),
                Widget::ScriptString(w) => evaluate_script_string(w, ctx).await,
                Widget::Graph(w) => evaluate_graph(w, ctx).await,
                Widget::Table(w) => evaluate_table(w, ctx).await,
                Widget::QueryTable(w) => evaluate_query_table(w, ctx).await,
            }
        })
    }
}

/// Resolve an optional template against the base scope.
fn eval_template(ctx: &mut EvaluationContext, template: Option<&str>) -> Result<Option<String>> {
    match template {
        Some(template) => {
            let mut scope = ctx.base_scope();
            Ok(Some(render_template(template, &mut scope)?))
        }
        None => Ok(None),
    }
}

/// Resolve an optional template with the widget's result bound as
/// `value`.
fn eval_metadata(
    ctx: &mut EvaluationContext,
    template: Option<&str>,
    value: &Value,
) -> Result<Option<String>> {
    match template {
        Some(template) => {
            let mut scope = ctx.valued_scope(value.clone());
            Ok(Some(render_template(template, &mut scope)?))
        }
        None => Ok(None),
    }
}

/// Convert a script override field: absent and null both mean "not
/// overridden".
fn opt_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.to_display_string()),
    }
}

/// Coercion for script number results: only an all-digit string counts
/// as a number, anything else is NaN.
fn script_number(result: &Value) -> f64 {
    if let Value::Number(n) = result {
        return *n;
    }
    let text = result.to_display_string();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

async fn evaluate_number(w: &NumberWidget, ctx: &mut EvaluationContext) -> Result<Widget> {
    let value = match &w.value {
        NumberValue::Literal(n) => *n,
        NumberValue::Template(template) => {
            let rendered = {
                let mut scope = ctx.base_scope();
                render_template(template, &mut scope)?
            };
            coerce_number(&rendered)
        }
    };

    let bound = Value::Number(value);
    let title = eval_metadata(ctx, w.title.as_deref(), &bound)?;
    let url = eval_metadata(ctx, w.url.as_deref(), &bound)?;
    let color = eval_metadata(ctx, w.color.as_deref(), &bound)?;

    Ok(Widget::Number(NumberWidget {
        title,
        url,
        value: NumberValue::Literal(value),
        color,
    }))
}

async fn evaluate_query_number(
    w: &QueryNumberWidget,
    ctx: &mut EvaluationContext,
) -> Result<Widget> {
    let results = evaluate_query(w.query_type, &w.query, 0, ctx).await?;
    let value = results.total_count as f64;
    let bound = Value::Number(value);

    let url = match &w.url {
        Some(template) => eval_metadata(ctx, Some(template), &bound)?,
        None => Some(results.url),
    };
    let title = eval_metadata(ctx, w.title.as_deref(), &bound)?;
    let color = eval_metadata(ctx, w.color.as_deref(), &bound)?;

    Ok(Widget::Number(NumberWidget {
        title,
        url,
        value: NumberValue::Literal(value),
        color,
    }))
}

async fn evaluate_script_number(
    w: &ScriptNumberWidget,
    ctx: &mut EvaluationContext,
) -> Result<Widget> {
    let mut result = {
        let mut scope = ctx.base_scope();
        run_script(&w.script, &mut scope)?
    };

    let mut title = None;
    let mut url = None;
    let mut color = None;
    if let Value::Object(map) = &result {
        if map.get("value").is_some_and(Value::is_truthy) {
            title = opt_string(map.get("title"));
            url = opt_string(map.get("url"));
            color = opt_string(map.get("color"));
            result = map.get("value").cloned().unwrap_or(Value::Null);
        }
    }

    let value = script_number(&result);
    let bound = Value::Number(value);
    if title.is_none() {
        title = eval_metadata(ctx, w.title.as_deref(), &bound)?;
    }
    if url.is_none() {
        url = eval_metadata(ctx, w.url.as_deref(), &bound)?;
    }
    if color.is_none() {
        color = eval_metadata(ctx, w.color.as_deref(), &bound)?;
    }

    Ok(Widget::Number(NumberWidget {
        title,
        url,
        value: NumberValue::Literal(value),
        color,
    }))
}

fn evaluate_string(w: &StringWidget, ctx: &mut EvaluationContext) -> Result<Widget> {
    let value = {
        let mut scope = ctx.base_scope();
        render_template(&w.value, &mut scope)?
    };

    let bound = Value::Str(value.clone());
    let title = eval_metadata(ctx, w.title.as_deref(), &bound)?;
    let url = eval_metadata(ctx, w.url.as_deref(), &bound)?;
    let align = eval_metadata(ctx, w.align.as_deref(), &bound)?;
    let color = eval_metadata(ctx, w.color.as_deref(), &bound)?;

    Ok(Widget::String(StringWidget {
        title,
        url,
        value,
        align,
        color,
    }))
}

async fn evaluate_script_string(
    w: &ScriptStringWidget,
    ctx: &mut EvaluationContext,
) -> Result<Widget> {
    let mut result = {
        let mut scope = ctx.base_scope();
        run_script(&w.script, &mut scope)?
    };

    let mut title = None;
    let mut url = None;
    let mut align = None;
    let mut color = None;
    if let Value::Object(map) = &result {
        if map.get("value").is_some_and(Value::is_truthy) {
            title = opt_string(map.get("title"));
            url = opt_string(map.get("url"));
            align = opt_string(map.get("align"));
            color = opt_string(map.get("color"));
            result = map.get("value").cloned().unwrap_or(Value::Null);
        }
    }

    let value = result.to_display_string();
    let bound = Value::Str(value.clone());
    if title.is_none() {
        title = eval_metadata(ctx, w.title.as_deref(), &bound)?;
    }
    if url.is_none() {
        url = eval_metadata(ctx, w.url.as_deref(), &bound)?;
    }
    if align.is_none() {
        align = eval_metadata(ctx, w.align.as_deref(), &bound)?;
    }
    if color.is_none() {
        color = eval_metadata(ctx, w.color.as_deref(), &bound)?;
    }

    Ok(Widget::String(StringWidget {
        title,
        url,
        value,
        align,
        color,
    }))
}

async fn evaluate_graph(w: &GraphWidget, ctx: &mut EvaluationContext) -> Result<Widget> {
    let mut elements = Vec::with_capacity(w.elements.len());
    for element in &w.elements {
        let result = element.evaluate(ctx).await?;
        if !matches!(result, Widget::Number(_)) {
            return Err(Error::Config(format!(
                "graph widget elements must be number widgets, got a {} widget",
                result.kind()
            )));
        }
        elements.push(result);
    }

    let title = eval_template(ctx, w.title.as_deref())?;
    let url = eval_template(ctx, w.url.as_deref())?;

    Ok(Widget::Graph(GraphWidget {
        title,
        url,
        elements,
    }))
}

async fn evaluate_table(w: &TableWidget, ctx: &mut EvaluationContext) -> Result<Widget> {
    let mut headers = Vec::with_capacity(w.headers.len());
    for header in &w.headers {
        headers.push(table_cell(header.evaluate(ctx).await?)?);
    }

    let mut elements = Vec::with_capacity(w.elements.len());
    for row in &w.elements {
        let mut cells = Vec::with_capacity(row.len());
        for cell in row {
            cells.push(table_cell(cell.evaluate(ctx).await?)?);
        }
        elements.push(cells);
    }

    let title = eval_template(ctx, w.title.as_deref())?;
    let url = eval_template(ctx, w.url.as_deref())?;

    Ok(Widget::Table(TableWidget {
        title,
        url,
        headers,
        elements,
    }))
}

fn table_cell(widget: Widget) -> Result<Widget> {
    if !matches!(widget, Widget::Number(_) | Widget::String(_)) {
        return Err(Error::Config(format!(
            "table widget elements must be string or number widgets, got a {} widget",
            widget.kind()
        )));
    }
    Ok(widget)
}

async fn evaluate_query_table(
    w: &QueryTableWidget,
    ctx: &mut EvaluationContext,
) -> Result<Widget> {
    let results = evaluate_query(w.query_type, &w.query, w.limit, ctx).await?;

    let headers = w
        .headers()
        .into_iter()
        .map(|header| {
            Widget::String(StringWidget {
                title: None,
                url: None,
                value: header,
                align: None,
                color: None,
            })
        })
        .collect();

    let mut elements = Vec::with_capacity(results.items.len());
    for item in &results.items {
        let item_url = item
            .get("html_url")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let row = w
            .row(item, ctx)?
            .into_iter()
            .map(|value| {
                Widget::String(StringWidget {
                    title: None,
                    url: item_url.clone(),
                    value,
                    align: None,
                    color: None,
                })
            })
            .collect();
        elements.push(row);
    }

    let title = eval_template(ctx, w.title.as_deref())?;
    let url = match &w.url {
        Some(template) => eval_template(ctx, Some(template))?,
        None => Some(results.url),
    };

    Ok(Widget::Table(TableWidget {
        title,
        url,
        headers,
        elements,
    }))
}
