//! HTML pages. Everything interpolated goes through [`escape`].

use std::fmt::Write;

use super::handlers::UploadRejection;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
.error {{ color: #b00020; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.25rem 0.75rem; text-align: left; }}
img {{ max-width: 100%; margin-top: 1rem; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

/// The upload form, with an optional message about a rejected upload.
pub fn upload_page(rejection: Option<UploadRejection>) -> String {
    let mut body = String::from("<h1>Upload CSV File</h1>\n");
    if let Some(rejection) = rejection {
        let _ = writeln!(body, r#"<p class="error">{}</p>"#, escape(rejection.message()));
    }
    body.push_str(
        r#"<form method="post" action="/upload" enctype="multipart/form-data">
<input type="file" name="file" accept=".csv">
<input type="submit" value="Upload">
</form>"#,
    );
    page("Upload CSV", &body)
}

/// Column selection form for an uploaded file. The submit is sent with
/// `fetch` and the JSON answer rendered in place; without scripts the raw
/// JSON is shown.
pub fn column_picker(filename: &str, columns: &[String]) -> String {
    let mut options = String::new();
    for column in columns {
        let column = escape(column);
        let _ = writeln!(options, r#"<option value="{column}">{column}</option>"#);
    }

    let body = format!(
        r#"<h1>Analyze {name}</h1>
<form id="analyze" method="post" action="/analyze/{name}">
<label for="column">Select a column:</label>
<select id="column" name="column">
{options}</select>
<input type="submit" value="Analyze">
</form>
<div id="result"></div>
<p><a href="/">Upload another file</a></p>
<script>
document.getElementById("analyze").addEventListener("submit", async (event) => {{
  event.preventDefault();
  const form = event.target;
  const result = document.getElementById("result");
  const response = await fetch(form.action, {{
    method: "POST",
    body: new URLSearchParams(new FormData(form)),
  }});
  if (!response.headers.get("content-type")?.includes("application/json")) {{
    result.textContent = await response.text();
    return;
  }}
  const data = await response.json();
  result.replaceChildren();
  if (data.error) {{
    const p = document.createElement("p");
    p.className = "error";
    p.textContent = data.error;
    result.append(p);
    return;
  }}
  const table = document.createElement("table");
  for (const [key, value] of Object.entries(data.summary_stats)) {{
    const row = table.insertRow();
    row.insertCell().textContent = key;
    row.insertCell().textContent = value === null ? "NaN" : value;
  }}
  const img = document.createElement("img");
  img.src = "/" + data.plot_url + "?t=" + Date.now();
  img.alt = "Histogram";
  result.append(table, img);
}});
</script>"#,
        name = escape(filename),
    );
    page(&format!("Analyze {filename}"), &body)
}
