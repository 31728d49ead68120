/// Initialize tracing for the services and the viewer.
///
/// `level` comes from the `log.level` setting; unknown values fall back to `info`.
pub fn init(level: &str) {
    let lvl = parse_level(level);

    // try_init: tests call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}

pub(crate) fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_level;

    #[test]
    fn parse_level_is_case_insensitive() {
        assert_eq!(parse_level("WARN"), tracing::Level::WARN);
        assert_eq!(parse_level(" Debug "), tracing::Level::DEBUG);
        assert_eq!(parse_level(""), tracing::Level::INFO);
    }
}
