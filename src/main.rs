use clap::Parser;
use std::process::ExitCode;

use regbus_tb::config::TbConfig;
use regbus_tb::tb::run_dut_tests;
use regbus_tb::{junit, logging, TbResult};

fn main() -> ExitCode {
    let cfg = TbConfig::parse();
    logging::init(cfg.log_level);
    match run(&cfg) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: &TbConfig) -> TbResult<bool> {
    let run = run_dut_tests(cfg)?;
    junit::create_junit_xml(env!("CARGO_PKG_NAME"), &run.reports, &cfg.junit)?;
    if let Some(path) = &cfg.coverage_json {
        run.coverage.get().export_json(path)?;
    }
    Ok(run.passed())
}
