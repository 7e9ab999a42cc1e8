//! Small HTML helpers shared by the report pages.

use serde_json::Value;

pub const HTML_HEAD: &str = r#"<head>
<style>
    body {
        padding: 20px;
        font-family: Verdana, sans-serif;
    }
    div {
        width: 60%;
    }
    table {
        border-collapse: collapse;
    }
    th, td {
        border: 1px solid #ddd;
        padding: 4px 8px;
        text-align: right;
    }
</style>
<meta charset="UTF-8">
</head>
"#;

pub const INTERPRETING_TEXT: &str = r#"<div>
<hr>
<p>Notes on interpreting plots with taxonomic feature identifiers:</p>
<ul>
<li>If taxonomic labels are used to identify features, the feature labels
(y-axis labels) in each plot represent the most specific named taxonomic level
associated with that feature.</li>
<li>Hover over the bars in plots to see the full taxonomic label of each
feature identifier and information about its differential abundance relative
to the reference.</li>
<li>Feature identifiers (y-axis labels) that are followed by an asterisk
(<code>*</code>) represent instances of a duplicated taxonomic name at the
level displayed in the feature identifier. The number next to the feature
identifiers in these cases is used only for unique identification in the
current figure. It is not taxonomically meaningful, and won't be
consistent across visualizations.</li>
</ul>
</div>
"#;

/// Escape text for use in HTML content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format a number for a table cell; NaN is shown as `NA`.
pub fn cell(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", value)
    }
}

/// Render a table with a header row and one row header per row.
pub fn table(corner: &str, columns: &[String], rows: &[(String, Vec<String>)]) -> String {
    let mut html = String::from("<table>\n<thead>\n<tr>");
    html.push_str(&format!("<th>{}</th>", escape(corner)));
    for column in columns {
        html.push_str(&format!("<th>{}</th>", escape(column)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");
    for (header, cells) in rows {
        html.push_str(&format!("<tr><th>{}</th>", escape(header)));
        for value in cells {
            html.push_str(&format!("<td>{}</td>", escape(value)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// Vega-Lite spec wrapped in a `vegaEmbed` call.
///
/// `</` is escaped so the JSON cannot close the surrounding script element.
pub fn vega_embed(element_id: &str, spec: &Value) -> String {
    let json = spec.to_string().replace("</", "<\\/");
    format!(
        "<div id=\"{id}\"></div>\n<script type=\"text/javascript\">\n\
         vegaEmbed('#{id}', {json}).catch(console.error);\n</script>\n",
        id = escape(element_id),
        json = json
    )
}

/// Script tags loading Vega, Vega-Lite and vega-embed.
pub const VEGA_SCRIPTS: &str = r#"<script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
"#;

/// A standalone page holding a single chart.
pub fn chart_page(title: &str, spec: &Value) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n{}</head>\n\
         <body>\n{}</body>\n</html>\n",
        escape(title),
        VEGA_SCRIPTS,
        vega_embed("vis", spec)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_table() {
        let html = table(
            "id",
            &["x".to_string()],
            &[("f<1>".to_string(), vec![cell(f64::NAN)])],
        );
        assert!(html.contains("<th>f&lt;1&gt;</th><td>NA</td>"));
    }

    #[test]
    fn test_embed_cannot_close_script() {
        let page = chart_page("t", &json!({"title": "</script><b>"}));
        assert!(!page.contains("</script><b>"));
        assert!(page.contains("vegaEmbed('#vis'"));
    }
}
