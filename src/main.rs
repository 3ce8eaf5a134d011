mod config;
mod db;
mod ipc;
mod issue;
mod model;
mod render;
mod store;
mod template;
mod tracing_init;

use std::io::{self, BufRead, Write};

use clap::Parser;

fn main() {
    let args = config::Args::parse();
    tracing_init::init_tracing("admitd=info", args.log_json);

    let mut state = ipc::AppState {
        font_dirs: args.font_dirs.clone(),
        ..ipc::AppState::default()
    };
    if let Some(path) = args.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, path.clone()) {
            tracing::error!(workspace = %path.display(), error = %e, "startup workspace not opened");
        }
    }
    if let Some(store) = args.http_store() {
        match ipc::connect_remote(&mut state, &store) {
            Ok(()) => {
                if let Some(Err(e)) = state.reload() {
                    tracing::warn!(error = %e, "initial records load failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "records API not connected"),
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admitd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
