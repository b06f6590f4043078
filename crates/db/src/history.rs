use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = "clockdb";
const HISTORY_FILE: &str = "history";

/// Location of the shell history: `$XDG_STATE_HOME/clockdb/history`, then
/// `~/.local/state/clockdb/history`, then a dotfile in the working directory.
pub fn resolve_history_path() -> PathBuf {
    history_path(env::var_os("XDG_STATE_HOME"), env::var_os("HOME"))
}

fn history_path(state_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let state_dir = match (state_home, home) {
        (Some(dir), _) if !dir.is_empty() => PathBuf::from(dir),
        (_, Some(home)) if !home.is_empty() => Path::new(&home).join(".local").join("state"),
        _ => return PathBuf::from(".clockdb_history"),
    };
    state_dir.join(PROJECT_DIR).join(HISTORY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_xdg_state_home() {
        let path = history_path(Some("/state".into()), Some("/home/me".into()));
        assert_eq!(path, PathBuf::from("/state/clockdb/history"));
    }

    #[test]
    fn falls_back_to_home_then_cwd() {
        let path = history_path(Some("".into()), Some("/home/me".into()));
        assert_eq!(path, PathBuf::from("/home/me/.local/state/clockdb/history"));
        assert_eq!(history_path(None, None), PathBuf::from(".clockdb_history"));
    }
}
