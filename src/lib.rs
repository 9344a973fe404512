pub mod config;
pub mod constraint;
pub mod coverage;
pub mod driver;
mod error;
pub mod executor;
pub mod junit;
pub mod kernel;
pub mod logging;
pub mod model;
pub mod prelude;
mod signal;
pub mod sim_if;
pub mod stimulus;
pub mod tb;
mod tb_obj;
pub mod testbench;
pub mod trigger;
pub mod utils;
mod value;

use num_format::{Locale, ToFormattedString};
use prettytable::{format, Cell, Row, Table};
use std::cell::{Cell as StdCell, RefCell};
use std::time;

use executor::Task;
use sim_if::{with_sim, SimIf, TimeUnit};

pub use error::TbError;
pub use signal::{ObjectKind, SimObject};
pub use tb_obj::TbObj;
pub use test::{TbTests, Test, TestReport};
pub use value::Val;

pub type TbResult<T = Val> = Result<T, TbError>;

thread_local! {
    static TEST_RUNNING: StdCell<bool> = StdCell::new(false);
    static FORCED_RESULT: RefCell<Option<TbResult>> = RefCell::new(None);
}

fn force_result(result: TbResult) {
    if !TEST_RUNNING.with(|r| r.get()) {
        return;
    }
    FORCED_RESULT.with(|f| {
        let mut f = f.borrow_mut();
        // the first verdict wins
        if f.is_none() {
            *f = Some(result);
        }
    });
}

/// Ends the running test as passed, unless it has already passed or failed.
pub fn pass_test(msg: &str) {
    force_result(Ok(Val::String(msg.to_string())));
}

/// Ends the running test as failed, unless it has already passed or failed.
pub fn fail_test(msg: &str) {
    force_result(Err(TbError::Failed(msg.to_string())));
}

/// Drops every task and pending trigger left over from a test.
fn tear_down_test() {
    trigger::cancel_all_triggers();
    executor::clear_all();
    TEST_RUNNING.with(|r| r.set(false));
    FORCED_RESULT.with(|f| f.borrow_mut().take());
}

/// Installs `sim` on this thread and runs `tests` one after another against it.
///
/// Each test runs until its future completes, [`pass_test`]/[`fail_test`] is called,
/// the simulator runs out of events or `timeout_ns` of simulation time has passed.
/// Tasks forked by a test don't outlive it.
pub fn run_tests(
    sim: Box<dyn SimIf>,
    tests: &TbTests,
    timeout_ns: Option<u64>,
) -> TbResult<Vec<TestReport>> {
    if sim_if::install(sim).is_some() {
        log::warn!("Replacing the simulator already installed on this thread");
    }
    let result = run_all(tests, timeout_ns);
    sim_if::uninstall();
    result
}

fn run_all(tests: &TbTests, timeout_ns: Option<u64>) -> TbResult<Vec<TestReport>> {
    let sim_start = time::Instant::now();
    let mut reports = Vec::with_capacity(tests.len());
    for test in tests.iter() {
        let report = run_test(test, timeout_ns);
        tear_down_test();
        reports.push(report?);
    }
    end_of_simulation(&reports, sim_start.elapsed().as_secs_f64())?;
    Ok(reports)
}

fn run_test(test: &Test, timeout_ns: Option<u64>) -> TbResult<TestReport> {
    let root = SimObject::get_root()?;
    let time_start = time::Instant::now();
    let sim_time_start = sim_if::sim_time(TimeUnit::Ns)?;
    log::info!("Starting test {}", test.name);

    TEST_RUNNING.with(|r| r.set(true));
    let mut handle = Task::spawn((test.generator)(root), &test.name);
    executor::run_once();

    let result = loop {
        if let Some(result) = handle.try_join() {
            break result;
        }
        if let Some(result) = FORCED_RESULT.with(|f| f.borrow_mut().take()) {
            break result;
        }
        if let Some(timeout_ns) = timeout_ns {
            if sim_if::sim_time(TimeUnit::Ns)? - sim_time_start > timeout_ns as f64 {
                break Err(TbError::Timeout {
                    name: test.name.clone(),
                    timeout_ns,
                });
            }
        }
        match with_sim(|sim| sim.advance())? {
            Some(event) => trigger::react(event),
            None => break Err(TbError::Stalled(test.name.clone())),
        }
    };

    let report = TestReport {
        name: test.name.clone(),
        time_secs: time_start.elapsed().as_secs_f64(),
        sim_time_ns: sim_if::sim_time(TimeUnit::Ns)? - sim_time_start,
        result: match result {
            Ok(val) => Ok(val.to_string()),
            Err(e) => Err(e.to_string()),
        },
    };
    match &report.result {
        Ok(msg) => log::info!("Test {} passed: {}", report.name, msg),
        Err(msg) => log::error!("Test {} failed: {}", report.name, msg),
    }
    Ok(report)
}

fn end_of_simulation(reports: &[TestReport], duration: f64) -> TbResult<()> {
    let final_sim_time = sim_if::sim_time(TimeUnit::Ns)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(
        ["Test", "Result", "Real time", "Sim time", "Sim speed"]
            .iter()
            .map(|t| Cell::new(t))
            .collect(),
    ));
    for r in reports {
        table.add_row(Row::new(vec![
            Cell::new(&r.name),
            Cell::new(if r.passed() { "passed" } else { "failed" }),
            Cell::new(&format!("{:.3} s", r.time_secs)),
            Cell::new(&format!("{} ns", (r.sim_time_ns as u64).to_formatted_string(&Locale::en))),
            Cell::new(&format!("{:.3} ns/s", speed(r.sim_time_ns, r.time_secs))),
        ]));
    }
    for line in table.to_string().lines() {
        log::info!("{}", line);
    }

    let passed = reports.iter().filter(|r| r.passed()).count();
    log::info!("TOTAL SIMULATION");
    log::info!("Tests passed: {}/{}", passed, reports.len());
    log::info!(
        "Simulation time: {} ns",
        (final_sim_time as u64).to_formatted_string(&Locale::en)
    );
    log::info!("Real time: {:.3} s", duration);
    log::info!("Simulation speed: {:.3} ns/s", speed(final_sim_time, duration));
    Ok(())
}

fn speed(sim_ns: f64, secs: f64) -> f64 {
    if secs > 0.0 {
        sim_ns / secs
    } else {
        0.0
    }
}
