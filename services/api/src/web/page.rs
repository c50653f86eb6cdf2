//! services/api/src/web/page.rs
//!
//! The single interactive page served at `/`. All behaviour lives in the JSON API;
//! the page only calls it.

use axum::response::{Html, IntoResponse};

pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn health_handler() -> &'static str {
    "ok"
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>AI-Powered SQL Query Assistant</title>
  <style>
    body { font-family: sans-serif; margin: 2rem auto; max-width: 1100px; }
    .cols { display: grid; grid-template-columns: 1fr 2fr; gap: 2rem; }
    textarea { width: 100%; font-family: monospace; }
    table { border-collapse: collapse; margin-top: 1rem; }
    td, th { border: 1px solid #ccc; padding: 0.25rem 0.5rem; }
    .error { color: #b00020; } .warn { color: #a15c00; } .ok { color: #1b5e20; }
    .hidden { display: none; }
  </style>
</head>
<body>
  <section id="login">
    <h1>Secure Login</h1>
    <p>Enter the app password to access the SQL query assistant.</p>
    <input id="password" type="password" placeholder="Password">
    <button id="login-btn">Login</button>
    <p id="login-msg"></p>
  </section>

  <section id="app" class="hidden">
    <button id="logout-btn" style="float:right">Logout</button>
    <h1>AI-Powered SQL Query Assistant</h1>
    <div class="cols">
      <aside>
        <h3>Example questions</h3>
        <div id="examples"></div>
        <button id="sample-btn">Run sample JOIN query</button>
      </aside>
      <main>
        <h3>What would you like to know?</h3>
        <textarea id="question" rows="3" placeholder="Which region has the highest sales?"></textarea>
        <button id="generate-btn">Generate SQL</button>
        <button id="clear-btn">Clear History</button>
        <p id="msg"></p>
        <div id="sql-box" class="hidden">
          <h3>Generated SQL Query</h3>
          <p id="sql-question"></p>
          <textarea id="sql" rows="10"></textarea>
          <button id="run-btn">Run Query</button>
        </div>
        <div id="result"></div>
        <h3>Query History (last 5)</h3>
        <div id="history"></div>
      </main>
    </div>
  </section>

<script>
const $ = (id) => document.getElementById(id);

async function api(method, path, body) {
  const res = await fetch(path, {
    method,
    credentials: "same-origin",
    headers: body ? { "Content-Type": "application/json" } : {},
    body: body ? JSON.stringify(body) : undefined,
  });
  const text = await res.text();
  if (!res.ok) throw new Error(text || res.statusText);
  return text ? JSON.parse(text) : null;
}

function say(el, text, cls) { el.textContent = text; el.className = cls || ""; }

function renderTable(target, data) {
  target.innerHTML = "";
  const p = document.createElement("p");
  say(p, "Query returned " + data.row_count + " rows", "ok");
  target.appendChild(p);
  const table = document.createElement("table");
  const head = table.insertRow();
  data.columns.forEach((c) => { const th = document.createElement("th"); th.textContent = c; head.appendChild(th); });
  data.rows.forEach((row) => {
    const tr = table.insertRow();
    row.forEach((v) => { tr.insertCell().textContent = v === null ? "NULL" : String(v); });
  });
  target.appendChild(table);
}

async function refreshHistory() {
  const history = await api("GET", "/history");
  const box = $("history");
  box.innerHTML = "";
  history.entries.forEach((item) => {
    const d = document.createElement("details");
    const s = document.createElement("summary");
    s.textContent = "Query " + item.number + ": " + (item.question || "(typed SQL)").slice(0, 60);
    const pre = document.createElement("pre");
    pre.textContent = item.sql;
    const cap = document.createElement("p");
    cap.textContent = "Returned " + item.row_count + " rows";
    const btn = document.createElement("button");
    btn.textContent = "Re-run this query";
    const out = document.createElement("div");
    btn.onclick = async () => {
      try { renderTable(out, await api("POST", "/history/" + item.number + "/rerun")); }
      catch (e) { say(out, e.message, "error"); }
    };
    d.append(s, pre, cap, btn, out);
    box.appendChild(d);
  });
}

async function showApp() {
  $("login").classList.add("hidden");
  $("app").classList.remove("hidden");
  const session = await api("GET", "/session");
  window.aiEnabled = session.ai_enabled;
  $("generate-btn").disabled = !session.ai_enabled;
  if (!session.ai_enabled) $("sql-box").classList.remove("hidden");
  if (session.generated_sql) {
    $("sql").value = session.generated_sql;
    $("sql-question").textContent = "Question: " + (session.current_question || "");
    $("sql-box").classList.remove("hidden");
  }
  const groups = await api("GET", "/examples");
  $("examples").innerHTML = groups.map((g) =>
    "<strong>" + g.topic + "</strong><ul>" + g.questions.map((q) => "<li>" + q + "</li>").join("") + "</ul>").join("");
  await refreshHistory();
}

$("login-btn").onclick = async () => {
  const password = $("password").value;
  if (!password) return say($("login-msg"), "Please enter a password", "warn");
  try { await api("POST", "/auth/login", { password }); }
  catch (e) { return say($("login-msg"), e.message, "error"); }
  try { await showApp(); }
  catch (e) {
    $("app").classList.add("hidden");
    $("login").classList.remove("hidden");
    say($("login-msg"), "Password accepted, but the browser did not keep the session cookie. " +
      "If this site is served over plain HTTP, set COOKIE_SECURE=false.", "error");
  }
};

$("logout-btn").onclick = async () => { await api("POST", "/auth/logout"); location.reload(); };

$("generate-btn").onclick = async () => {
  const question = $("question").value.trim();
  if (!question) return say($("msg"), "Please enter a question first.", "warn");
  say($("msg"), "Generating SQL...");
  try {
    const g = await api("POST", "/queries/generate", { question });
    $("sql").value = g.sql;
    $("sql-question").textContent = "Question: " + g.question;
    $("sql-box").classList.remove("hidden");
    say($("msg"), g.source === "fallback" ? "AI assistant not configured; showing a sample query." : "", "warn");
  } catch (e) { say($("msg"), e.message, "error"); }
};

$("run-btn").onclick = async () => {
  const sql = $("sql").value;
  if (!sql.trim()) return say($("msg"), "Please enter a SQL query first.", "warn");
  say($("msg"), "Executing query...");
  try { renderTable($("result"), await api("POST", "/queries/run", { sql })); say($("msg"), ""); await refreshHistory(); }
  catch (e) { say($("msg"), e.message, "error"); }
};

$("sample-btn").onclick = async () => {
  try { renderTable($("result"), await api("POST", "/queries/sample")); }
  catch (e) { say($("msg"), e.message, "error"); }
};

$("clear-btn").onclick = async () => {
  await api("DELETE", "/history");
  $("sql").value = ""; $("result").innerHTML = "";
  if (window.aiEnabled) $("sql-box").classList.add("hidden");
  say($("msg"), "History cleared!", "ok");
  await refreshHistory();
};

api("GET", "/session").then(showApp).catch(() => {});
</script>
</body>
</html>
"#;
