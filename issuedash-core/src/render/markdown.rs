//! Markdown renderer for evaluated dashboards.
//!
//! Consecutive number widgets in a section are grouped into a single
//! two-column table; graphs become unicode bar charts. Only evaluated
//! trees render; hitting a query or script widget here means the caller
//! skipped evaluation.

use crate::analytics::Analytics;
use crate::error::{Error, Result};
use crate::widget::{GraphWidget, NumberValue, NumberWidget, StringWidget, TableWidget, Widget};

// on-screen bar length at the largest value
const BAR_LENGTH: usize = 35;

pub fn render(analytics: &Analytics) -> Result<String> {
    let mut md: Vec<String> = Vec::new();

    if let Some(title) = &analytics.title {
        md.push(format!("# {title}"));
        md.push(String::new());
    }
    if let Some(description) = &analytics.description {
        md.push(description.clone());
        md.push(String::new());
    }

    for section in &analytics.sections {
        if let Some(title) = &section.title {
            md.push(format!("## {title}"));
            md.push(String::new());
        }
        if let Some(description) = &section.description {
            md.push(description.clone());
            md.push(String::new());
        }

        let mut showing_numbers = false;
        for widget in &section.widgets {
            if let Widget::Number(number) = widget {
                // group consecutive number widgets into one table
                if !showing_numbers {
                    md.push("| Query |  |".to_string());
                    md.push("|:------|-:|".to_string());
                    showing_numbers = true;
                }
                md.push(format!(
                    "| {} | {} |",
                    number.title.as_deref().unwrap_or_default(),
                    render_number(number)?
                ));
                continue;
            }
            if showing_numbers {
                md.push(String::new());
                showing_numbers = false;
            }
            match widget {
                Widget::String(string) => md.push(render_string(string)?),
                Widget::Graph(graph) => md.push(render_graph(graph)?),
                Widget::Table(table) => md.push(render_table(table)?),
                other => {
                    return Err(Error::Config(format!(
                        "cannot render unevaluated {} widget",
                        other.kind()
                    )));
                }
            }
        }
    }

    md.push(String::new());
    Ok(md.join("\n"))
}

fn render_color(color: &str) -> Result<&'static str> {
    match color {
        "red" => Ok("\u{1f534}"),
        "yellow" => Ok("\u{1f49b}"),
        "green" => Ok("\u{2705}"),
        "blue" => Ok("\u{1f537}"),
        "black" => Ok("\u{2b1b}\u{fe0f}"),
        other => Err(Error::Config(format!("invalid color: {other}"))),
    }
}

fn literal_value(widget: &NumberWidget) -> Result<f64> {
    match widget.value {
        NumberValue::Literal(n) => Ok(n),
        NumberValue::Template(_) => Err(Error::Config(
            "number widget did not evaluate to a static number".to_string(),
        )),
    }
}

fn render_number(widget: &NumberWidget) -> Result<String> {
    let value = literal_value(widget)?;
    let mut out = crate::expr::Value::Number(value).to_display_string();
    if let Some(color) = &widget.color {
        out = format!("{} {}", render_color(color)?, out);
    }
    if let Some(url) = &widget.url {
        out = format!("[{out}]({url})");
    }
    Ok(out)
}

fn render_string(widget: &StringWidget) -> Result<String> {
    let mut md = String::new();
    if let Some(title) = &widget.title {
        md.push_str(&format!("#### {title}\n\n"));
    }
    if widget.url.is_some() {
        md.push('[');
    }
    if let Some(color) = &widget.color {
        md.push_str(render_color(color)?);
        md.push(' ');
    }
    md.push_str(&widget.value);
    if let Some(url) = &widget.url {
        md.push_str(&format!("]({url})"));
    }
    md.push('\n');
    Ok(md)
}

fn render_graph(widget: &GraphWidget) -> Result<String> {
    let mut max = 0.0_f64;
    let mut values = Vec::with_capacity(widget.elements.len());
    for element in &widget.elements {
        let Widget::Number(number) = element else {
            return Err(Error::Config(format!(
                "graph element did not evaluate to a number widget (is a {} widget)",
                element.kind()
            )));
        };
        let value = literal_value(number)?;
        if value > max {
            max = value;
        }
        values.push((number, value));
    }

    let scale = if max > 0.0 { BAR_LENGTH as f64 / max } else { 0.0 };

    // pad with non-breaking space so min and max read left and right
    // aligned; the factor approximates glyph widths
    let min_text = "0";
    let max_text = crate::expr::Value::Number(max).to_display_string();
    let spacerlen =
        ((BAR_LENGTH as f64 - (min_text.len() as f64 - max_text.len() as f64)) * 3.75) as usize;
    let spacer = "&nbsp;".repeat(spacerlen);

    let mut md: Vec<String> = Vec::new();
    if let Some(title) = &widget.title {
        md.push(format!("#### {title}"));
        md.push(String::new());
    }
    md.push(format!(
        "| {} |  | {min_text}{spacer}{max_text} |",
        widget.title.as_deref().unwrap_or_default()
    ));
    md.push("|:------------------------------------|-:|:-------|".to_string());
    for (number, value) in values {
        let bar = "\u{2588}".repeat((value * scale) as usize);
        md.push(format!(
            "| {} | {} | {} |",
            number.title.as_deref().unwrap_or_default(),
            render_number(number)?,
            bar
        ));
    }
    md.push(String::new());
    Ok(md.join("\n"))
}

fn render_cell(widget: &Widget) -> Result<String> {
    match widget {
        Widget::Number(number) => render_number(number),
        Widget::String(string) => {
            let mut out = string.value.clone();
            if let Some(color) = &string.color {
                out = format!("{} {}", render_color(color)?, out);
            }
            if let Some(url) = &string.url {
                out = format!("[{out}]({url})");
            }
            Ok(out)
        }
        other => Err(Error::Config(format!(
            "table cell did not evaluate to a static value (is a {} widget)",
            other.kind()
        ))),
    }
}

fn render_table(widget: &TableWidget) -> Result<String> {
    let columns = widget
        .elements
        .iter()
        .map(Vec::len)
        .chain([widget.headers.len()])
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return Ok(String::new());
    }

    let mut md: Vec<String> = Vec::new();
    if let Some(title) = &widget.title {
        md.push(format!("#### {title}"));
        md.push(String::new());
    }

    let mut line = String::from("|");
    for i in 0..columns {
        line.push(' ');
        if let Some(header) = widget.headers.get(i) {
            line.push_str(&render_cell(header)?);
        }
        line.push_str(" |");
    }
    md.push(line);

    let mut line = String::from("|");
    for i in 0..columns {
        let align = match widget.headers.get(i) {
            Some(Widget::String(header)) => header.align.as_deref(),
            _ => None,
        };
        line.push_str(match align {
            Some("left") => ":--",
            Some("center") => ":-:",
            Some("right") => "--:",
            _ => "---",
        });
        line.push('|');
    }
    md.push(line);

    for row in &widget.elements {
        let mut line = String::from("|");
        for i in 0..columns {
            line.push(' ');
            if let Some(cell) = row.get(i) {
                line.push_str(&render_cell(cell)?);
            }
            line.push_str(" |");
        }
        md.push(line);
    }

    Ok(md.join("\n"))
}
