//! Server-side HTML rendering

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

use crate::db::{DailyCount, PathCount};
use crate::lessons::{Lesson, Section};

fn layout(title: &str, sections: &[Section], body: &str) -> String {
    let mut nav = String::new();
    for section in sections {
        let _ = write!(
            nav,
            r#"<li><a href="/{}">{}</a></li>"#,
            attr(&section.slug),
            text(&section.title)
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="el">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Αρχική</a><ul>{nav}</ul></nav>
<main>
<h1>{title}</h1>
{body}
</main>
<footer><a href="/stats">Stats</a></footer>
<script src="/static/app.js" defer></script>
</body>
</html>
"#,
        title = text(title),
    )
}

pub fn index(sections: &[Section]) -> String {
    let mut body = String::from(r#"<ul class="sections">"#);
    for section in sections {
        let _ = write!(
            body,
            r#"<li><a href="/{}">{}</a></li>"#,
            attr(&section.slug),
            text(&section.title)
        );
    }
    body.push_str("</ul>");

    layout("Λεξιλόγιο", sections, &body)
}

fn tts_href(snippet: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(snippet.as_bytes()).collect();
    format!("/tts?text={}", query)
}

pub fn lesson(lesson: &Lesson, sections: &[Section]) -> String {
    let speak = lesson.speak_index();

    let mut body = String::from("<table class=\"lesson\">\n<thead><tr>");
    for column in &lesson.columns {
        let _ = write!(body, "<th>{}</th>", text(column));
    }
    body.push_str("</tr></thead>\n<tbody>\n");

    for row in &lesson.rows {
        body.push_str("<tr>");
        for (i, cell) in row.iter().enumerate() {
            if Some(i) == speak && !cell.trim().is_empty() {
                let _ = write!(
                    body,
                    r#"<td>{} <a class="speak" href="{}" title="Listen">&#128266;</a></td>"#,
                    text(cell),
                    attr(&tts_href(cell))
                );
            } else {
                let _ = write!(body, "<td>{}</td>", text(cell));
            }
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</tbody>\n</table>");

    layout(&lesson.title, sections, &body)
}

/// Stats page: chart, daily totals and per-page rows, newest day first
pub fn stats(totals: &[DailyCount], pages: &[PathCount], hits: i64, sections: &[Section]) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        r#"<p>{} recorded visits</p>
<img class="chart" src="/stats/chart.png" alt="Distinct visitors per day" width="900" height="420">
<h2>Visitors per day</h2>
<table class="stats"><thead><tr><th>Day</th><th>Visitors</th></tr></thead><tbody>
"#,
        hits
    );
    for row in totals {
        let _ = writeln!(body, "<tr><td>{}</td><td>{}</td></tr>", row.day, row.visitors);
    }
    body.push_str("</tbody></table>\n<h2>Visits per page</h2>\n");
    body.push_str(
        r#"<table class="stats"><thead><tr><th>Day</th><th>Page</th><th>Visits</th></tr></thead><tbody>
"#,
    );
    for row in pages {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            row.day,
            text(&row.path),
            row.visits
        );
    }
    body.push_str("</tbody></table>");

    layout("Stats", sections, &body)
}
