//! Dashboard configuration loading.
//!
//! Configurations are YAML or JSON documents. Loading is strict: every
//! key is consumed as it is recognized, and any key left over at the
//! end of a block is a configuration error naming the offending keys.
//! Widgets dispatch on their `type` key, then on which of the
//! type-specific keys (`value`, `script`, `issue_query`, `elements`)
//! is present, exactly one of which must be.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::analytics::{Analytics, Section};
use crate::error::{Error, Result};
use crate::query::QueryType;
use crate::widget::{
    Field, GraphWidget, NumberValue, NumberWidget, QueryNumberWidget, QueryTableWidget,
    ScriptNumberWidget, ScriptStringWidget, StringWidget, TableWidget, Widget,
};

/// Where the rendered dashboard goes.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Renderer name, e.g. `markdown` or `html`.
    pub format: String,
    /// Output file; callers without one write to standard output.
    pub filename: Option<String>,
    /// Renderer-specific settings, passed through uninterpreted.
    pub extra: BTreeMap<String, String>,
}

/// A loaded dashboard configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    pub analytics: Analytics,
    pub output: Output,
}

impl AnalyticsConfig {
    pub fn from_yaml(input: &str) -> Result<Self> {
        let value: Json = serde_yaml::from_str(input)?;
        Self::load(value)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let value: Json = serde_json::from_str(input)?;
        Self::load(value)
    }

    fn load(value: Json) -> Result<Self> {
        let mut config = Block::new(value, None)?;
        let title = config.take_string("title")?;
        let description = config.take_string("description")?;
        let setup = config.take_string("setup")?;
        let shutdown = config.take_string("shutdown")?;
        let output_config = config.take_required("output")?;
        let section_config = config.take("sections");

        let mut sections = Vec::new();
        if let Some(section_config) = section_config {
            let Json::Array(section_config) = section_config else {
                return Err(config.error("'sections' is not an array"));
            };
            for section in section_config {
                sections.push(load_section(section)?);
            }
        }

        let output = load_output(output_config)?;
        config.ensure_empty()?;

        Ok(AnalyticsConfig {
            analytics: Analytics {
                title,
                description,
                sections,
                setup,
                shutdown,
            },
            output,
        })
    }
}

fn load_output(value: Json) -> Result<Output> {
    let mut config = Block::new(value, Some("output"))?;
    let format = config
        .take_string("format")?
        .ok_or_else(|| Error::Config("config: 'output.format' is not defined".to_string()))?;
    let filename = config.take_string("filename")?;

    let mut extra = BTreeMap::new();
    for (key, value) in config.map {
        extra.insert(key, scalar_string(&value));
    }

    Ok(Output {
        format,
        filename,
        extra,
    })
}

fn load_section(value: Json) -> Result<Section> {
    let mut config = Block::new(value, Some("section"))?;
    let title = config.take_string("title")?;
    let description = config.take_string("description")?;
    let widget_config = config.take("widgets");

    let mut widgets = Vec::new();
    if let Some(widget_config) = widget_config {
        let Json::Array(widget_config) = widget_config else {
            return Err(config.error("'widgets' is not an array"));
        };
        for widget in widget_config {
            widgets.push(load_widget(widget)?);
        }
    }

    config.ensure_empty()?;
    Ok(Section {
        title,
        description,
        widgets,
    })
}

fn load_widget(value: Json) -> Result<Widget> {
    let mut config = Block::new(value, Some("widget"))?;
    let widget_type = config.take_required("type")?;
    let widget_type = match &widget_type {
        Json::String(s) => s.clone(),
        other => scalar_string(other),
    };

    match widget_type.as_str() {
        "number" => load_number_widget(config),
        "string" => load_string_widget_block(config),
        "graph" => load_graph_widget(config),
        "table" => load_table_widget(config),
        other => Err(Error::Config(format!("config: widget: invalid type '{other}'"))),
    }
}

fn load_number_widget(mut config: Block) -> Result<Widget> {
    config.name = Some("number widget");
    config.one_of(&["issue_query", "value", "script"])?;
    let title = config.take_string("title")?;
    let url = config.take_string("url")?;
    let color = config.take_string("color")?;
    let value = config.take("value");
    let script = config.take_string("script")?;
    let query = config.take_string("issue_query")?;

    let widget = if let Some(query) = query {
        Widget::QueryNumber(QueryNumberWidget {
            title,
            url,
            query_type: QueryType::Issue,
            query,
            color,
        })
    } else if let Some(script) = script {
        Widget::ScriptNumber(ScriptNumberWidget {
            title,
            url,
            script,
            color,
        })
    } else {
        let value = match value {
            Some(Json::Number(n)) => NumberValue::Literal(n.as_f64().unwrap_or(f64::NAN)),
            Some(Json::String(s)) => NumberValue::Template(s),
            Some(other) => {
                return Err(config.error(&format!(
                    "'value' must be a number or a string, got {}",
                    json_kind(&other)
                )));
            }
            None => return Err(config.error("expected one of: 'issue_query', 'value' or 'script'")),
        };
        Widget::Number(NumberWidget {
            title,
            url,
            value,
            color,
        })
    };

    config.ensure_empty()?;
    Ok(widget)
}

/// String widgets may be spelled as a bare string, shorthand for
/// `{ value: ... }`.
fn load_string_widget(value: Json) -> Result<Widget> {
    let value = match value {
        Json::String(s) => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), Json::String(s));
            Json::Object(map)
        }
        other => other,
    };
    load_string_widget_block(Block::new(value, Some("string widget"))?)
}

fn load_string_widget_block(mut config: Block) -> Result<Widget> {
    config.name = Some("string widget");
    config.one_of(&["value", "script"])?;
    let title = config.take_string("title")?;
    let url = config.take_string("url")?;
    let color = config.take_string("color")?;
    let align = config.take_string("align")?;
    let value = config.take_string("value")?;
    let script = config.take_string("script")?;

    let widget = if let Some(script) = script {
        Widget::ScriptString(ScriptStringWidget {
            title,
            url,
            script,
            align,
            color,
        })
    } else if let Some(value) = value {
        Widget::String(StringWidget {
            title,
            url,
            value,
            align,
            color,
        })
    } else {
        return Err(config.error("expected one of: 'value' or 'script'"));
    };

    config.ensure_empty()?;
    Ok(widget)
}

fn load_graph_widget(mut config: Block) -> Result<Widget> {
    config.name = Some("graph widget");
    let title = config.take_string("title")?;
    let url = config.take_string("url")?;
    let elements = config.take_required("elements")?;
    let Json::Array(elements) = elements else {
        return Err(config.error("'elements' is not an array"));
    };

    let mut widgets = Vec::with_capacity(elements.len());
    for element in elements {
        let mut element = Block::new(element, Some("graph widget element"))?;
        element.one_of(&["issue_query", "value"])?;
        let title = element.take_string("title")?;
        let url = element.take_string("url")?;
        let color = element.take_string("color")?;
        let query = element.take_string("issue_query")?;
        let value = element.take("value");

        if let Some(query) = query {
            widgets.push(Widget::QueryNumber(QueryNumberWidget {
                title,
                url,
                query_type: QueryType::Issue,
                query,
                color,
            }));
        } else {
            let value = match value {
                Some(Json::Number(n)) => NumberValue::Literal(n.as_f64().unwrap_or(f64::NAN)),
                Some(Json::String(s)) => NumberValue::Template(s),
                _ => {
                    return Err(element.error("'value' must be a number or a string"));
                }
            };
            widgets.push(Widget::Number(NumberWidget {
                title,
                url,
                value,
                color,
            }));
        }
        element.ensure_empty()?;
    }

    config.ensure_empty()?;
    Ok(Widget::Graph(GraphWidget {
        title,
        url,
        elements: widgets,
    }))
}

fn load_table_widget(mut config: Block) -> Result<Widget> {
    config.name = Some("table widget");
    config.one_of(&["issue_query", "elements"])?;
    let widget = if !matches!(config.map.get("issue_query"), None | Some(Json::Null)) {
        load_query_table_widget(&mut config)?
    } else {
        load_static_table_widget(&mut config)?
    };
    config.ensure_empty()?;
    Ok(widget)
}

fn load_query_table_widget(config: &mut Block) -> Result<Widget> {
    let title = config.take_string("title")?;
    let url = config.take_string("url")?;
    let fields = config.take("fields");
    let query = config.take_required("issue_query")?;
    let query = match query {
        Json::String(s) => s,
        other => scalar_string(&other),
    };
    let limit = match config.take("limit") {
        Some(Json::Number(n)) => match n.as_u64() {
            Some(n) => Some(n as usize),
            None => return Err(config.error("'limit' must be a non-negative integer")),
        },
        Some(_) => return Err(config.error("'limit' must be a non-negative integer")),
        None => None,
    };

    let fields = match fields {
        Some(Json::Array(fields)) => {
            let mut loaded = Vec::with_capacity(fields.len());
            for field in fields {
                loaded.push(load_field(field, config)?);
            }
            loaded
        }
        Some(_) => return Err(config.error("'fields' is not an array")),
        None => QueryTableWidget::default_fields(QueryType::Issue),
    };

    Ok(Widget::QueryTable(QueryTableWidget {
        title,
        url,
        query_type: QueryType::Issue,
        query,
        limit: limit.unwrap_or(QueryTableWidget::DEFAULT_LIMIT),
        fields,
    }))
}

fn load_field(value: Json, config: &Block) -> Result<Field> {
    match value {
        Json::String(name) => Ok(Field::Property(name)),
        Json::Object(map) => {
            let mut field = Block {
                name: Some("table widget field"),
                map,
            };
            let title = field.take_string("title")?;
            let property = field.take_string("property")?;
            let value = field.take_string("value")?;
            field.ensure_empty()?;
            Ok(Field::Spec {
                title,
                property,
                value,
            })
        }
        other => Err(config.error(&format!(
            "fields must be strings or tables, got {}",
            json_kind(&other)
        ))),
    }
}

fn load_static_table_widget(config: &mut Block) -> Result<Widget> {
    let title = config.take_string("title")?;
    let url = config.take_string("url")?;
    let header_config = config.take("headers");
    let elements_config = config.take_required("elements")?;

    let mut headers = Vec::new();
    match header_config {
        Some(Json::Array(header_config)) => {
            for header in header_config {
                headers.push(load_string_widget(header)?);
            }
        }
        Some(single) => headers.push(load_string_widget(single)?),
        None => {}
    }

    let Json::Array(elements_config) = elements_config else {
        return Err(config.error("'elements' is not an array"));
    };
    let mut elements = Vec::with_capacity(elements_config.len());
    for row in elements_config {
        match row {
            Json::Array(row) => {
                let mut cells = Vec::with_capacity(row.len());
                for cell in row {
                    cells.push(load_string_widget(cell)?);
                }
                elements.push(cells);
            }
            single => elements.push(vec![load_string_widget(single)?]),
        }
    }

    Ok(Widget::Table(TableWidget {
        title,
        url,
        headers,
        elements,
    }))
}

// ============================================================
// Block helpers
// ============================================================

/// One mapping block of the configuration, consumed key by key.
struct Block {
    name: Option<&'static str>,
    map: serde_json::Map<String, Json>,
}

impl Block {
    fn new(value: Json, name: Option<&'static str>) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self { name, map }),
            other => Err(Error::Config(match name {
                Some(name) => format!("config: {name}: expected a table, got {}", json_kind(&other)),
                None => format!("config: expected a table, got {}", json_kind(&other)),
            })),
        }
    }

    fn error(&self, message: &str) -> Error {
        match self.name {
            Some(name) => Error::Config(format!("config: {name}: {message}")),
            None => Error::Config(format!("config: {message}")),
        }
    }

    fn take(&mut self, key: &str) -> Option<Json> {
        match self.map.remove(key) {
            Some(Json::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    fn take_required(&mut self, key: &str) -> Result<Json> {
        self.take(key)
            .ok_or_else(|| self.error(&format!("'{key}' is not defined")))
    }

    fn take_string(&mut self, key: &str) -> Result<Option<String>> {
        match self.take(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s)),
            Some(value @ (Json::Number(_) | Json::Bool(_))) => Ok(Some(scalar_string(&value))),
            Some(other) => Err(self.error(&format!(
                "'{key}' must be a scalar, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Exactly one of `keys` must be present in this block.
    fn one_of(&self, keys: &[&str]) -> Result<()> {
        let found: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !matches!(self.map.get(*key), None | Some(Json::Null)))
            .collect();
        if found.is_empty() {
            return Err(self.error(&format!("expected one of: {}", key_list(keys))));
        }
        if found.len() > 1 {
            return Err(self.error(&format!("expected only one of: {}", key_list(&found))));
        }
        Ok(())
    }

    fn ensure_empty(&self) -> Result<()> {
        if self.map.is_empty() {
            return Ok(());
        }
        let keys: Vec<&str> = self.map.keys().map(String::as_str).collect();
        Err(self.error(&format!("unexpected keys: {}", key_list(&keys))))
    }
}

fn key_list(keys: &[&str]) -> String {
    match keys {
        [] => String::new(),
        [only] => format!("'{only}'"),
        [init @ .., last] => {
            let init = init
                .iter()
                .map(|key| format!("'{key}'"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{init} or '{last}'")
        }
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "a table",
    }
}

fn scalar_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
