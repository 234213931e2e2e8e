use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// `default_level` comes from settings; `RUST_LOG` wins when it is set.
/// Safe to call more than once, later calls are ignored.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_level_maps_aliases_and_unknowns() {
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("Debug"), "debug");
        assert_eq!(normalize_level("verbose"), "info");
    }

    #[test]
    fn init_accepts_repeated_calls() {
        init("info");
        init("debug");
    }
}
