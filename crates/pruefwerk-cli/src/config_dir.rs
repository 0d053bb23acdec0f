// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware configuration file discovery.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// The user's configuration file, if one exists.
///
/// Looks in `$XDG_CONFIG_HOME/pruefwerk/` first, then `~/.config/pruefwerk/`.
pub fn discover_config() -> Option<PathBuf> {
    candidates(|key| std::env::var(key).ok())
        .into_iter()
        .find(|path| path.is_file())
}

fn candidates(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(xdg) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        dirs.push(PathBuf::from(xdg));
    }
    if let Some(home) = env("HOME").filter(|v| !v.is_empty()) {
        dirs.push(PathBuf::from(home).join(".config"));
    }
    dirs.into_iter()
        .map(|dir| dir.join("pruefwerk").join(CONFIG_FILE))
        .collect()
}
