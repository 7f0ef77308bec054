//! HTML renderer for evaluated dashboards.
//!
//! Output is a standalone page that expects `dashboard.css` and
//! `dashboard.js` next to it. Widget colors become CSS classes; every
//! titled widget gets a named anchor derived from its title.

use crate::analytics::Analytics;
use crate::error::{Error, Result};
use crate::widget::{GraphWidget, NumberValue, NumberWidget, StringWidget, TableWidget, Widget};

pub fn render(analytics: &Analytics) -> Result<String> {
    let mut html: Vec<String> = Vec::new();

    html.push(format!(
        "\n<html>\n<head>\n<title>{}</title>\n\
         <link rel=\"stylesheet\" href=\"dashboard.css\" type=\"text/css\" media=\"all\">\n\
         <script src=\"dashboard.js\"></script>\n\
         </head>\n<body>\n<div id=\"analytics\">\n",
        analytics.title.as_deref().unwrap_or("Dashboard")
    ));

    if let Some(title) = &analytics.title {
        html.push(format!("<h1>{title}</h1>"));
        html.push(String::new());
    }
    if let Some(description) = &analytics.description {
        html.push("<div id=\"main_description\" class=\"description\">".to_string());
        html.push(description.clone());
        html.push("</div>".to_string());
        html.push(String::new());
    }

    html.push("<div class=\"sections\">".to_string());
    for section in &analytics.sections {
        html.push("<div class=\"section\">".to_string());
        html.push("<div class=\"section_metadata\">".to_string());
        if let Some(title) = &section.title {
            html.push(format!("<a name=\"{}\"></a>", anchor(title)));
            html.push(format!("<h2 class=\"section_title\">{title}</h2>"));
            html.push(String::new());
        }
        if let Some(description) = &section.description {
            html.push("<div class=\"description\">".to_string());
            html.push(description.clone());
            html.push("</div>".to_string());
            html.push(String::new());
        }
        html.push("</div> <!-- section_metadata -->".to_string());
        html.push("<div class=\"section_widgets\">".to_string());

        let mut showing_numbers = false;
        for widget in &section.widgets {
            if let Widget::Number(number) = widget {
                if !showing_numbers {
                    html.push("<div class=\"number_widgets\">".to_string());
                    showing_numbers = true;
                }
                html.push(render_number(number)?);
                continue;
            }
            if showing_numbers {
                html.push("</div> <!-- number_widgets -->".to_string());
                showing_numbers = false;
            }
            match widget {
                Widget::String(string) => html.push(render_string(string)),
                Widget::Graph(graph) => html.push(render_graph(graph)?),
                Widget::Table(table) => html.push(render_table(table)?),
                other => {
                    return Err(Error::Config(format!(
                        "cannot render unevaluated {} widget",
                        other.kind()
                    )));
                }
            }
        }
        if showing_numbers {
            html.push("</div> <!-- number_widgets -->".to_string());
        }

        html.push("</div> <!-- section_widgets -->".to_string());
        html.push("</div> <!-- section -->".to_string());
    }

    html.push(
        "\n</div> <!-- sections -->\n<div id=\"footer\">\n</div>\n\
         </div> <!-- analytics -->\n</body>\n</html>\n"
            .to_string(),
    );
    Ok(html.join("\n"))
}

/// Anchor names keep word characters and dashes only.
fn anchor(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}

fn literal_value(widget: &NumberWidget) -> Result<f64> {
    match widget.value {
        NumberValue::Literal(n) => Ok(n),
        NumberValue::Template(_) => Err(Error::Config(
            "number widget did not evaluate to a static number".to_string(),
        )),
    }
}

fn color_class(color: Option<&str>) -> String {
    match color {
        Some(color) => format!(" {color}"),
        None => String::new(),
    }
}

fn render_number(widget: &NumberWidget) -> Result<String> {
    let value = crate::expr::Value::Number(literal_value(widget)?).to_display_string();
    let mut out: Vec<String> = Vec::new();
    if let Some(title) = &widget.title {
        out.push(format!("<a name=\"{}\"></a>", anchor(title)));
    }
    if let Some(url) = &widget.url {
        out.push(format!("<a href=\"{url}\">"));
    }
    out.push(format!(
        "<div class=\"number_widget{}\">",
        color_class(widget.color.as_deref())
    ));
    if let Some(title) = &widget.title {
        out.push(format!("<span class=\"title\">{title}</span>"));
    }
    out.push(format!("<span class=\"value\">{value}</span>"));
    out.push("</div>".to_string());
    if widget.url.is_some() {
        out.push("</a>".to_string());
    }
    Ok(out.join("\n"))
}

fn render_string(widget: &StringWidget) -> String {
    let mut out: Vec<String> = Vec::new();
    if let Some(title) = &widget.title {
        out.push(format!("<a name=\"{}\"></a>", anchor(title)));
    }
    if let Some(url) = &widget.url {
        out.push(format!("<a href=\"{url}\">"));
    }
    out.push(format!(
        "<div class=\"string_widget{}\">",
        color_class(widget.color.as_deref())
    ));
    if let Some(title) = &widget.title {
        out.push(format!("<h3 class=\"title\">{title}</h3>"));
    }
    out.push(format!("<span class=\"value\">{}</span>", widget.value));
    out.push("</div> <!-- string_widget -->".to_string());
    if widget.url.is_some() {
        out.push("</a>".to_string());
    }
    out.join("\n")
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

    let mut html: Vec<String> = Vec::new();
    html.push("<div class=\"graph_widget\">".to_string());
    if let Some(title) = &widget.title {
        let linked = match &widget.url {
            Some(url) => format!("<a href=\"{url}\">{title}</a>"),
            None => title.clone(),
        };
        html.push(format!("<a name=\"{}\"></a>", anchor(title)));
        html.push(format!("<h3 class=\"graph_title\">{linked}</h3>"));
    }
    html.push("<div class=\"graph\">".to_string());
    for (number, value) in values {
        let scaled = if max > 0.0 { ((value / max) * 100.0) as u32 } else { 0 };
        html.push(format!(
            "<div class=\"graph_item{}\">",
            color_class(number.color.as_deref())
        ));
        html.push("<span class=\"graph_item_title\">".to_string());
        if let Some(title) = &number.title {
            if let Some(url) = &number.url {
                html.push(format!("<a href=\"{url}\">"));
            }
            html.push(format!("<span class=\"title\">{title}</span>"));
            if number.url.is_some() {
                html.push("</a>".to_string());
            }
        }
        html.push("</span>".to_string());
        html.push("<span class=\"graph_item_value\">".to_string());
        if let Some(url) = &number.url {
            html.push(format!("<a href=\"{url}\">"));
        }
        let value_class = if scaled > 0 { "value" } else { "value empty_value" };
        let value_display = if scaled >= 5 {
            crate::expr::Value::Number(value).to_display_string()
        } else {
            String::new()
        };
        html.push(format!(
            "<span class=\"{value_class}\" style=\"width: {scaled}%;\">{value_display}</span>"
        ));
        if number.url.is_some() {
            html.push("</a>".to_string());
        }
        html.push("</span>".to_string());
        html.push("</div>".to_string());
    }
    html.push("</div>".to_string());
    html.push("</div>".to_string());
    Ok(html.join("\n"))
}

fn render_cell(tag: &str, cell: &Widget) -> Result<String> {
    let (value, color, url, align) = match cell {
        Widget::Number(number) => (
            crate::expr::Value::Number(literal_value(number)?).to_display_string(),
            number.color.as_deref(),
            number.url.as_deref(),
            None,
        ),
        Widget::String(string) => (
            string.value.clone(),
            string.color.as_deref(),
            string.url.as_deref(),
            string.align.as_deref(),
        ),
        other => {
            return Err(Error::Config(format!(
                "table cell did not evaluate to a static value (is a {} widget)",
                other.kind()
            )));
        }
    };

    let align = match align {
        Some(align) => format!(" style=\"text-align: {align}\""),
        None => String::new(),
    };
    let color = match color {
        Some(color) => format!(" class=\"{color}\""),
        None => String::new(),
    };

    let mut html = format!("<{tag}{color}{align}>");
    if let Some(url) = url {
        html.push_str(&format!("<a href=\"{url}\">"));
    }
    html.push_str(&value);
    if url.is_some() {
        html.push_str("</a>");
    }
    html.push_str(&format!("</{tag}>"));
    Ok(html)
}

fn render_table(widget: &TableWidget) -> Result<String> {
    let mut html: Vec<String> = Vec::new();
    html.push("<div class=\"table_widget\">".to_string());
    if let Some(title) = &widget.title {
        let linked = match &widget.url {
            Some(url) => format!("<a href=\"{url}\">{title}</a>"),
            None => title.clone(),
        };
        html.push(format!("<a name=\"{}\"></a>", anchor(title)));
        html.push(format!("<h3 class=\"table_title\">{linked}</h3>"));
    }
    html.push("<table class=\"table\">".to_string());
    if !widget.headers.is_empty() {
        html.push("<tr class=\"table_header\">".to_string());
        for cell in &widget.headers {
            html.push(render_cell("th", cell)?);
        }
        html.push("</tr>".to_string());
    }
    for row in &widget.elements {
        html.push("<tr class=\"table_element\">".to_string());
        for cell in row {
            html.push(render_cell("td", cell)?);
        }
        html.push("</tr>".to_string());
    }
    html.push("</table>".to_string());
    html.push("</div>".to_string());
    Ok(html.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Section;

    fn dashboard(widgets: Vec<Widget>) -> Analytics {
        Analytics {
            title: Some("Team Dashboard".to_string()),
            description: None,
            sections: vec![Section {
                title: Some("Bugs & Features".to_string()),
                description: None,
                widgets,
            }],
            setup: None,
            shutdown: None,
        }
    }

    #[test]
    fn test_anchor_names() {
        assert_eq!(anchor("Bugs & Features"), "bugs--features");
        assert_eq!(anchor("Open_Issues 2"), "open_issues-2");
    }

    #[test]
    fn test_page_skeleton() {
        let out = render(&dashboard(vec![])).expect("render");
        assert!(out.contains("<title>Team Dashboard</title>"));
        assert!(out.contains("<h1>Team Dashboard</h1>"));
        assert!(out.contains("<h2 class=\"section_title\">Bugs & Features</h2>"));
    }

    #[test]
    fn test_number_widgets_wrapped_in_group_div() {
        let number = Widget::Number(NumberWidget {
            title: Some("Open".to_string()),
            url: None,
            value: NumberValue::Literal(3.0),
            color: Some("red".to_string()),
        });
        let out = render(&dashboard(vec![number])).expect("render");
        assert!(out.contains("<div class=\"number_widgets\">"));
        assert!(out.contains("<div class=\"number_widget red\">"));
        assert!(out.contains("<span class=\"value\">3</span>"));
        assert!(out.contains("</div> <!-- number_widgets -->"));
    }

    #[test]
    fn test_table_cell_alignment_and_link() {
        let cell = Widget::String(StringWidget {
            title: None,
            url: Some("https://example.com".to_string()),
            value: "go".to_string(),
            align: Some("right".to_string()),
            color: Some("blue".to_string()),
        });
        let html = render_cell("td", &cell).expect("cell");
        assert_eq!(
            html,
            "<td class=\"blue\" style=\"text-align: right\">\
             <a href=\"https://example.com\">go</a></td>"
        );
    }

    #[test]
    fn test_graph_bar_widths() {
        let number = |title: &str, value: f64| {
            Widget::Number(NumberWidget {
                title: Some(title.to_string()),
                url: None,
                value: NumberValue::Literal(value),
                color: None,
            })
        };
        let out = render(&dashboard(vec![Widget::Graph(GraphWidget {
            title: Some("G".to_string()),
            url: None,
            elements: vec![number("a", 50.0), number("b", 1.0)],
        })]))
        .expect("render");
        assert!(out.contains("style=\"width: 100%;\">50</span>"));
        // 2% is drawn but too narrow to label
        assert!(out.contains("style=\"width: 2%;\"></span>"));
    }
}
