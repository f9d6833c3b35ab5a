// src/web.rs

//! Read-only HTML admin UI, plus the one mutating action: killing a running
//! instance with a pid confirmation token.
//!
//! Everything rendered here goes through the task message protocol (status,
//! running-instance and failure queries) or the independently-locked output
//! buffers, so a slow browser can never stall a control loop.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::engine::Registry;
use crate::logging::LogRing;
use crate::output::Line;

#[derive(Clone)]
struct AdminState {
    registry: Registry,
    ring: Arc<LogRing>,
}

/// Serve the admin UI on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener, registry: Registry, ring: Arc<LogRing>) -> Result<()> {
    let app = Router::new()
        .route("/", get(task_list))
        .route("/log", get(system_log))
        .route("/task/{name}", get(task_view))
        .route("/task/{name}/kill", post(kill_task))
        .with_state(AdminState { registry, ring });

    axum::serve(listener, app).await?;
    Ok(())
}

async fn task_list(State(state): State<AdminState>) -> Html<String> {
    let mut page = String::new();
    let p = &mut page;
    let _ = write!(p, "<html><head><title>procsit</title></head>");
    let _ = write!(p, "<body><h1>procsit admin</h1><h2>tasks</h2><ul>\n");
    for task in state.registry.list() {
        let name = escape(task.name());
        let status = escape(&task.status().await);
        let _ = write!(p, "<li><a href='/task/{name}'>{name}</a>: {status}</li>\n");
    }
    let _ = write!(p, "</ul>\n");
    let _ = write!(
        p,
        "<h2>supervisor log</h2><pre>{}</pre>\n",
        escape(&state.ring.contents())
    );
    let _ = write!(p, "</body></html>\n");
    Html(page)
}

async fn system_log(State(state): State<AdminState>) -> String {
    state.ring.contents()
}

async fn task_view(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    let Some(task) = state.registry.get(&name) else {
        return Err((StatusCode::NOT_FOUND, format!("no task {name:?}\n")));
    };

    let mut page = String::new();
    let p = &mut page;
    let _ = write!(p, "<html><head><title>procsit: task {}</title></head>", escape(&name));
    let _ = write!(
        p,
        "<body><div>[<a href='/'>all tasks</a>]</div><h1>{}</h1>\n",
        escape(&name)
    );
    let _ = write!(p, "<p>status: {}</p>\n", escape(&task.status().await));

    if let Some(instance) = task.running_instance().await {
        let pid = instance.pid();
        let _ = write!(p, "<p>running instance: pid={pid} ");
        let _ = write!(
            p,
            "<form method='post' action='/task/{}/kill' style='display:inline'>\
             <input type='hidden' name='pid' value='{pid}'>\
             <button type='submit'>kill</button></form></p>\n",
            escape(&name)
        );
        render_lines(p, &instance.output_lines());
    }

    let failures = task.failures().await;
    if !failures.is_empty() {
        let _ = write!(p, "<h2>past instances</h2>\n");
        for failed in &failures {
            let _ = write!(p, "<h3>{}</h3>\n", escape(&failed.id()));
            render_lines(p, &failed.output_lines());
        }
    }

    let _ = write!(p, "</body></html>\n");
    Ok(Html(page))
}

fn render_lines(p: &mut String, lines: &[Line]) {
    for line in lines {
        let marker = if line.truncated { " [cut]" } else { "" };
        let _ = write!(
            p,
            "<p>{}: {}: {}{marker}</p>\n",
            line.at.format("%H:%M:%S%.3f"),
            line.stream,
            escape(&line.text)
        );
    }
}

#[derive(Debug, Deserialize)]
struct KillForm {
    pid: u32,
}

async fn kill_task(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Form(form): Form<KillForm>,
) -> Result<Html<String>, (StatusCode, String)> {
    let Some(task) = state.registry.get(&name) else {
        return Err((StatusCode::NOT_FOUND, format!("no task {name:?}\n")));
    };
    match task.kill_pid(form.pid).await {
        Ok(()) => Ok(Html(format!(
            "<html><body>killed pid {}.<p>back to <a href='/task/{}'>{} status</a></body></html>",
            form.pid,
            escape(&name),
            escape(&name)
        ))),
        Err(reason) => Err((StatusCode::CONFLICT, format!("{reason}\n"))),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn escape_covers_html_specials() {
        assert_eq!(escape("a<b>&'\"c"), "a&lt;b&gt;&amp;&#39;&quot;c");
        assert_eq!(escape("plain"), "plain");
    }
}
