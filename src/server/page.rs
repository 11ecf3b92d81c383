//! 챗 화면 HTML

use crate::config::UiConfig;

/// HTML 특수문자 이스케이프
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; }
  h1 { margin-bottom: 0.2rem; }
  h2 { font-weight: normal; color: #555; font-size: 1.1rem; }
  #error { display: none; background: #fdecea; color: #611a15; padding: 0.75rem; border-radius: 6px; margin: 1rem 0; }
  .message { padding: 0.6rem 0.9rem; border-radius: 8px; margin: 0.5rem 0; white-space: pre-wrap; }
  .assistant { background: #f1f3f4; }
  .user { background: #e3f2fd; text-align: right; }
  form { display: flex; gap: 0.5rem; margin-top: 1rem; }
  input[type=text] { flex: 1; padding: 0.6rem; font-size: 1rem; }
  #thinking { display: none; color: #777; font-style: italic; }
</style>
</head>
<body>
<h1>{title}</h1>
<h2>{subheader}</h2>
<div id="error"></div>
<div id="messages"></div>
<div id="thinking">Thinking...</div>
<form id="chat-form">
  <input type="text" id="input" placeholder="{placeholder}" autocomplete="off">
  <button type="submit">Send</button>
  <button type="button" id="reset">Reset</button>
</form>
<script>
const list = document.getElementById("messages");
const errorBox = document.getElementById("error");
const thinking = document.getElementById("thinking");

function showError(text) {
  errorBox.textContent = text || "";
  errorBox.style.display = text ? "block" : "none";
}

function render(messages) {
  list.replaceChildren(...messages.map((m) => {
    const div = document.createElement("div");
    div.className = "message " + m.role;
    div.textContent = m.content;
    return div;
  }));
}

async function call(method, url, body) {
  const res = await fetch(url, {
    method,
    headers: body ? { "Content-Type": "application/json" } : {},
    body: body ? JSON.stringify(body) : undefined,
  });
  const data = await res.json();
  if (!res.ok) { throw new Error(data.error || res.statusText); }
  return data;
}

async function refresh() {
  const status = await call("GET", "/api/status");
  if (status.index.state === "failed") { showError("Failed to load and index data: " + status.index.error); }
  const data = await call("GET", "/api/messages");
  render(data.messages);
}

document.getElementById("chat-form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const input = document.getElementById("input");
  const message = input.value.trim();
  if (!message) { return; }
  input.value = "";
  thinking.style.display = "block";
  try {
    const data = await call("POST", "/api/chat", { message });
    render(data.messages);
    showError(data.error);
  } catch (err) {
    showError(err.message);
  } finally {
    thinking.style.display = "none";
  }
});

document.getElementById("reset").addEventListener("click", async () => {
  const data = await call("POST", "/api/reset");
  render(data.messages);
  showError(null);
});

refresh().catch((err) => showError(err.message));
</script>
</body>
</html>
"#;

/// 화면 문구를 채운 페이지
pub fn render(ui: &UiConfig) -> String {
    PAGE_TEMPLATE
        .replace("{title}", &escape_html(&ui.title))
        .replace("{subheader}", &escape_html(&ui.subheader))
        .replace("{placeholder}", &escape_html(&ui.placeholder))
}
