//! HTML panels for the context of an answer.

use std::fmt::Write as _;

use prism_core::Frame;

use crate::context::cell_text;

#[must_use]
pub fn escape_html(text: &str) -> String {
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

/// Render `frame` as a bordered HTML table with a row-index column.
#[must_use]
pub fn frame_to_html(frame: &Frame) -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n");
    html.push_str("    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for column in frame.columns() {
        let _ = writeln!(html, "      <th>{}</th>", escape_html(column));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for (i, row) in frame.rows().iter().enumerate() {
        let _ = writeln!(html, "    <tr>\n      <th>{i}</th>");
        for value in row {
            let _ = writeln!(html, "      <td>{}</td>", escape_html(&cell_text(value)));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");
    html
}

/// A heading followed by content, one block per row.
///
/// The heading shows `prefix` and the escaped `label` column; the body is
/// the `content` column. Empty if either column is missing.
fn blocks_to_html(frame: &Frame, heading: &str, prefix: &str, label: &str, content: &str) -> String {
    let (Some(label_col), Some(content_col)) = (frame.column_index(label), frame.column_index(content))
    else {
        return String::new();
    };
    frame
        .rows()
        .iter()
        .map(|row| {
            format!(
                "\n\n<h5>{heading} <b>{prefix}{}</b></h5>\n{}",
                escape_html(&cell_text(&row[label_col])),
                escape_html(&cell_text(&row[content_col]))
            )
        })
        .collect()
}

/// `<h5>Source <b>#id</b></h5>` blocks with the text unit text.
#[must_use]
pub fn sources_to_html(frame: &Frame) -> String {
    blocks_to_html(frame, "Source", "#", "id", "text")
}

/// `<h5>Report <b>title</b></h5>` blocks with the full report content.
#[must_use]
pub fn reports_to_html(frame: &Frame) -> String {
    blocks_to_html(frame, "Report", "", "title", "content")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn renders_table() {
        let frame = Frame::new(
            vec!["entity".into(), "description".into()],
            vec![vec![json!("ACME"), json!("<b>bold</b>")]],
        )
        .unwrap();
        let html = frame_to_html(&frame);
        assert!(html.starts_with("<table border=\"1\" class=\"dataframe\">"));
        assert!(html.contains("<tr style=\"text-align: right;\">"));
        assert!(html.contains("      <th>entity</th>\n"));
        assert!(html.contains("      <th>0</th>\n      <td>ACME</td>\n"));
        assert!(html.contains("<td>&lt;b&gt;bold&lt;/b&gt;</td>"));
        assert!(html.ends_with("</tbody>\n</table>"));
    }

    #[test]
    fn renders_source_and_report_blocks() {
        let sources = Frame::new(
            vec!["id".into(), "text".into()],
            vec![vec![json!("3"), json!("harbour text")]],
        )
        .unwrap();
        assert_eq!(sources_to_html(&sources), "\n\n<h5>Source <b>#3</b></h5>\nharbour text");

        let reports = Frame::new(
            vec!["id".into(), "title".into(), "content".into()],
            vec![
                vec![json!("1"), json!("Port"), json!("a")],
                vec![json!("2"), json!("Rail"), json!("b")],
            ],
        )
        .unwrap();
        assert_eq!(
            reports_to_html(&reports),
            "\n\n<h5>Report <b>Port</b></h5>\na\n\n<h5>Report <b>Rail</b></h5>\nb"
        );
    }

    #[test]
    fn missing_columns_render_nothing() {
        assert_eq!(reports_to_html(&Frame::empty()), "");
    }
}
