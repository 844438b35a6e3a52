// src/utils/log.rs

//! Console formatting helpers for pipeline progress.
//!
//! Everything goes through the `log` facade, so the CLI's logger decides
//! where and whether it is printed.

/// Parse a configured level name, defaulting to `Info`.
pub fn level_filter(level: &str) -> ::log::LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => ::log::LevelFilter::Off,
        "error" => ::log::LevelFilter::Error,
        "warn" | "warning" => ::log::LevelFilter::Warn,
        "debug" => ::log::LevelFilter::Debug,
        "trace" => ::log::LevelFilter::Trace,
        _ => ::log::LevelFilter::Info,
    }
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    ::log::info!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        sub_item(&format!("{}: {}", key, value));
    }
}
