//! Markup normalisation for OCR and LLM output.
//!
//! OCR services emit Markdown interleaved with HTML: tables come back as
//! `<table>` blocks, figures as `<img>` tags, and some backends wrap spans in
//! `<div>`s. The rules here are deterministic string passes, each testable on
//! its own:
//!
//! 1. [`strip_html`] removes tag-delimited elements *with* their content, then
//!    any stray tag. Used on whole-document OCR and on LLM output.
//! 2. [`html_tables_to_markdown`] rewrites `<table>` blocks into GFM pipe
//!    tables. Used on per-table OCR before it reaches the LLM.
//! 3. [`append_table_label`] binds a description back to its image.
//! 4. [`assemble`] produces the final text of an extraction run.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Strip HTML ──────────────────────────────────────────────────────

static RE_ELEMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>.*?</[^>]+>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Remove HTML elements together with the content they bracket, then any
/// remaining lone tag.
pub fn strip_html(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let s = RE_ELEMENT.replace_all(input, "");
    RE_TAG.replace_all(&s, "").into_owned()
}

// ── Rule 2: HTML tables → GFM ───────────────────────────────────────────────

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<table[^>]*>(.*?)</table>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<t[hd](?:\s[^>]*)?>(.*?)</t[hd]>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Replace every `<table>` block in `input` with a pipe-delimited table: the
/// first row becomes the header, followed by a `---` separator row with one
/// entry per header column.
pub fn html_tables_to_markdown(input: &str) -> String {
    RE_TABLE
        .replace_all(input, |caps: &regex::Captures<'_>| html_table_to_markdown(&caps[1]))
        .into_owned()
}

fn html_table_to_markdown(inner: &str) -> String {
    let rows: Vec<Vec<String>> = RE_ROW
        .captures_iter(inner)
        .map(|row| {
            RE_CELL
                .captures_iter(&row[1])
                .map(|cell| clean_cell(&cell[1]))
                .collect()
        })
        .collect();

    let Some(header) = rows.first() else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(pipe_row(header));
    lines.push(pipe_row(&vec!["---".to_string(); header.len()]));
    lines.extend(rows[1..].iter().map(|r| pipe_row(r)));
    lines.join("\n")
}

fn clean_cell(raw: &str) -> String {
    let text = RE_TAG.replace_all(raw, " ");
    RE_WS
        .replace_all(text.trim(), " ")
        .replace('|', "\\|")
}

fn pipe_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

// ── Rule 3: Inline image references ─────────────────────────────────────────

/// Append `![](image_url)` to every line that opens a quoted section
/// (`> ` after trimming).
pub fn append_table_label(image_url: &str, description: &str) -> String {
    if description.is_empty() || image_url.is_empty() {
        return description.to_string();
    }
    description
        .split('\n')
        .map(|line| {
            if line.trim().starts_with("> ") {
                format!("{}![]({})", line, image_url)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Assembly ────────────────────────────────────────────────────────

/// Whole-document text followed, when there are any, by a `## heading`
/// section holding the table descriptions in detection order.
pub fn assemble(document_text: &str, heading: &str, descriptions: &[String]) -> String {
    if descriptions.is_empty() {
        return document_text.to_string();
    }
    format!(
        "{}\n\n## {}\n\n{}",
        document_text,
        heading,
        descriptions.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_elements_with_content() {
        let s = strip_html("before<div class=\"x\">hidden\ntext</div>after<br>end");
        assert_eq!(s, "beforeafterend");
    }

    #[test]
    fn strip_html_removes_stray_tags() {
        assert_eq!(strip_html("a <img src=\"x.png\"> b"), "a  b");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn html_table_becomes_pipe_table() {
        let html = "Intro\n<table border=\"1\"><tr><th>Item</th><th>Fee</th></tr>\
<tr><td>Hotel</td><td> 750 </td></tr><tr><td>Meals</td><td>100</td></tr></table>\nOutro";
        let md = html_tables_to_markdown(html);
        assert_eq!(
            md,
            "Intro\n| Item | Fee |\n| --- | --- |\n| Hotel | 750 |\n| Meals | 100 |\nOutro"
        );
    }

    #[test]
    fn separator_follows_header_width() {
        let html = "<table><tr><td>a</td><td>b</td><td>c</td></tr><tr><td colspan=\"3\">x</td></tr></table>";
        let md = html_tables_to_markdown(html);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| x |");
    }

    #[test]
    fn cell_markup_and_pipes_are_cleaned() {
        let md = html_tables_to_markdown("<table><tr><td><b>A|B</b>\n x</td></tr></table>");
        assert_eq!(md, "| A\\|B x |\n| --- |");
    }

    #[test]
    fn label_goes_on_quoted_lines_only() {
        let desc = "> Table type\n- a bullet\n  > Structure\n>no space";
        let out = append_table_label("/img/t1.png", desc);
        assert_eq!(
            out,
            "> Table type![](/img/t1.png)\n- a bullet\n  > Structure![](/img/t1.png)\n>no space"
        );
    }

    #[test]
    fn assemble_skips_empty_section() {
        assert_eq!(assemble("body", "Tables", &[]), "body");
        assert_eq!(
            assemble("body", "Tables", &["one".into(), "two".into()]),
            "body\n\n## Tables\n\none\n\ntwo"
        );
    }
}
