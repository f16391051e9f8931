// handlers/render.rs - Minimal server-side HTML for the pages

use axum::response::Html;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Wrap a body fragment in the shared page shell. `title` is escaped, `body` is not.
pub fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Expert Match</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; color: #1f2933; background: #f5f7fa; }}
header {{ background: #243b53; color: #fff; padding: 1rem 2rem; }}
main {{ max-width: 960px; margin: 2rem auto; padding: 0 1rem; }}
table {{ width: 100%; border-collapse: collapse; background: #fff; }}
th, td {{ text-align: left; padding: .5rem; border-bottom: 1px solid #e4e7eb; }}
.stats {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; }}
.stat {{ background: #fff; padding: 1rem; border-radius: 6px; }}
.error {{ color: #ab091e; }}
</style>
</head>
<body>
<header><strong>Expert Match</strong></header>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
        body = body,
    ))
}
