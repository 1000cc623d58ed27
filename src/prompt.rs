//! Line-oriented terminal prompts.

use std::io::{self, BufRead, Write};

/// Reads one line after printing `message`. `None` on EOF or read failure.
pub fn read_line(message: &str) -> Option<String> {
    print!("{message}");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Asks with a default shown in brackets; blank input keeps the default.
pub fn ask(message: &str, default: &str) -> String {
    match read_line(&format!("{message} [{default}]: ")) {
        Some(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
        _ => default.to_string(),
    }
}

pub fn confirm(message: &str) -> bool {
    read_line(&format!("{message} (y/n): "))
        .map(|answer| answer.trim().eq_ignore_ascii_case("y"))
        .unwrap_or(false)
}
