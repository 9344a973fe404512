use env_logger::{Builder, Env};
use log::LevelFilter;
use num_format::{Locale, ToFormattedString};
use std::io::Write;

use crate::sim_if::try_sim_time_ns;

/// Initializes the global logger. Every line is prefixed with the current simulation
/// time. `level` overrides `RUST_LOG`, which defaults to `info`.
pub fn init(level: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format(|buf, record| {
        let time = try_sim_time_ns().map(format_sim_time).unwrap_or_default();
        writeln!(buf, "{:>16}  {:<5} {}", time, record.level(), record.args())
    });
    // a second init (tests) keeps the first logger
    let _ = builder.try_init();
}

/// Formats a time in ns with thousands separators and ps resolution: `1,234.500ns`.
pub fn format_sim_time(t_ns: f64) -> String {
    let ps = (t_ns * 1000.0).round() as u64;
    format!(
        "{}.{:03}ns",
        (ps / 1000).to_formatted_string(&Locale::en),
        ps % 1000
    )
}
