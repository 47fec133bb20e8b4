mod config;
mod ids;
mod ipc;
mod logging;
mod picker;
mod reconcile;
mod reconciler;
mod roster;
mod validate;

use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::from_env();
    if let Err(e) = logging::init_logging(&config) {
        // Serving matters more than logs.
        let _ = writeln!(io::stderr(), "attendanced: logging disabled: {e:#}");
    }

    let mut state = ipc::AppState::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::error!("event=stdin_read status=failed error={}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                log::warn!("event=bad_json line_len={}", line.len());
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        log::trace!("event=request method={}", req.method);
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    log::info!("event=app_stop status=ok");
}
