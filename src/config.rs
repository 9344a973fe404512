use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Run-time settings of the testbench.
#[derive(Debug, Clone, Parser)]
#[command(name = "regbus-tb", version, about = "Constrained-random testbench for the register-mapped OR/FIFO block")]
pub struct TbConfig {
    /// Seed of the stimulus sampler. A random seed is drawn (and logged) when absent.
    #[arg(long, env = "TB_SEED")]
    pub seed: Option<u64>,

    /// Number of randomized bus cycles.
    #[arg(long, default_value_t = 100)]
    pub cycles: u32,

    #[arg(long, default_value_t = 2)]
    pub clock_period_ns: u64,

    /// Simulation time after which a test is failed.
    #[arg(long, default_value_t = 1_000_000)]
    pub timeout_ns: u64,

    /// JUnit XML output.
    #[arg(long, default_value = "results.xml")]
    pub junit: PathBuf,

    /// Writes the coverage database as JSON.
    #[arg(long)]
    pub coverage_json: Option<PathBuf>,

    /// Include every bin in the coverage report.
    #[arg(long)]
    pub report_bins: bool,

    /// Log filter, overrides RUST_LOG.
    #[arg(long, env = "TB_LOG")]
    pub log_level: Option<LevelFilter>,
}

impl Default for TbConfig {
    fn default() -> Self {
        TbConfig {
            seed: None,
            cycles: 100,
            clock_period_ns: 2,
            timeout_ns: 1_000_000,
            junit: PathBuf::from("results.xml"),
            coverage_json: None,
            report_bins: false,
            log_level: None,
        }
    }
}

impl TbConfig {
    /// The configured seed, or a fresh random one.
    pub fn seed_or_random(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let parsed = TbConfig::try_parse_from(["regbus-tb"]).unwrap();
        let default = TbConfig::default();
        assert_eq!(parsed.cycles, default.cycles);
        assert_eq!(parsed.clock_period_ns, default.clock_period_ns);
        assert_eq!(parsed.timeout_ns, default.timeout_ns);
        assert_eq!(parsed.junit, default.junit);
        assert!(!parsed.report_bins);
    }

    #[test]
    fn parses_flags() {
        let cfg = TbConfig::try_parse_from([
            "regbus-tb",
            "--seed",
            "9",
            "--cycles",
            "500",
            "--report-bins",
            "--log-level",
            "debug",
            "--coverage-json",
            "cov.json",
        ])
        .unwrap();
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.seed_or_random(), 9);
        assert_eq!(cfg.cycles, 500);
        assert!(cfg.report_bins);
        assert_eq!(cfg.log_level, Some(LevelFilter::Debug));
        assert_eq!(cfg.coverage_json, Some(PathBuf::from("cov.json")));
    }
}
