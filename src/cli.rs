use tracing_subscriber::EnvFilter;

/// Loads `.env.local` then `.env` and installs the stderr log subscriber.
pub fn init() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Value of `--name=value` or `--name value`. Blank values count as absent.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn values_in_both_forms() {
        let a = args(&["--season=2023", "--player", "Jo Runner", "--demo"]);
        assert_eq!(arg_value(&a, "--season").as_deref(), Some("2023"));
        assert_eq!(arg_value(&a, "--player").as_deref(), Some("Jo Runner"));
        assert_eq!(arg_value(&a, "--line"), None);
        assert!(has_flag(&a, "--demo"));
    }

    #[test]
    fn flag_is_not_a_value() {
        let a = args(&["--line", "--demo"]);
        assert_eq!(arg_value(&a, "--line"), None);
    }
}
