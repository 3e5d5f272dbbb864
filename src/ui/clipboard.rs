//! System clipboard access via platform tools.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::shell::Platform;

/// Candidate clipboard commands for a platform, in preference order.
fn clipboard_commands(platform: Platform) -> &'static [&'static [&'static str]] {
    match platform {
        Platform::MacOS => &[&["pbcopy"]],
        Platform::Windows => &[&["clip"]],
        Platform::Linux => &[
            &["wl-copy"],
            &["xclip", "-selection", "clipboard"],
            &["xsel", "--clipboard", "--input"],
        ],
    }
}

/// Copy `text` to the system clipboard. Returns false if no tool worked.
pub fn copy_to_system_clipboard(text: &str) -> bool {
    for argv in clipboard_commands(Platform::current()) {
        if pipe_into(argv, text) {
            return true;
        }
    }
    tracing::debug!("no clipboard tool available");
    false
}

fn pipe_into(argv: &[&str], text: &str) -> bool {
    let Some((program, args)) = argv.split_first() else {
        return false;
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let Ok(mut child) = child else {
        return false;
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(text.as_bytes()).is_err() {
            let _ = child.kill();
            let _ = child.wait();
            return false;
        }
    }

    child.wait().map(|s| s.success()).unwrap_or(false)
}
