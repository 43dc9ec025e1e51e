use tracing::Level;

/// Installs the global fmt subscriber. Returns `false` when one is already
/// installed; unknown levels fall back to `info`.
pub fn init(level: &str) -> bool {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .is_ok()
}
