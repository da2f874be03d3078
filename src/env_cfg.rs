use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const CACHE_DIR: &str = "statline";

pub fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

pub fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Per-user cache directory, preferring `XDG_CACHE_HOME` over `~/.cache`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Some(base) = env_string("STATLINE_CACHE_DIR") {
        return Some(PathBuf::from(base));
    }
    if let Some(base) = env_string("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = env_string("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}
