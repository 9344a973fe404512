use regbus_tb::config::TbConfig;
use regbus_tb::coverage::CoverageDb;
use regbus_tb::kernel::{HdlModel, Kernel, Port};
use regbus_tb::model::{self, OrFifoDut};
use regbus_tb::prelude::*;
use regbus_tb::tb::{dut_test, run_dut_tests};
use regbus_tb::{run_tests, tests, TbTests, Test};

fn cfg(seed: u64, cycles: u32) -> TbConfig {
    TbConfig {
        seed: Some(seed),
        cycles,
        ..TbConfig::default()
    }
}

#[test]
fn dut_test_passes_with_full_functional_coverage() {
    let run = run_dut_tests(&cfg(1, 200)).unwrap();
    assert_eq!(run.reports.len(), 1);
    assert!(run.passed(), "{:?}", run.reports);

    let db = run.coverage.get();
    assert_eq!(db.cover_percentage("top.cross.ab").unwrap(), 100.0);
    assert_eq!(db.coverage("top.a").unwrap(), 2);
    // read_address stays on 0/1 whenever read_en is 0
    assert!(db.cover_percentage("top.cross.r").unwrap() <= 75.0);
    assert!(db.cover_percentage("top.cross.w").unwrap() > 0.0);
}

#[test]
fn dut_test_with_no_random_cycles() {
    let run = run_dut_tests(&cfg(3, 0)).unwrap();
    assert!(run.passed());
    let db = run.coverage.get();
    assert_eq!(db.coverage("top.cross.r").unwrap(), 0);
    assert!(run.reports[0].sim_time_ns > 0.0);
}

/// OR/FIFO model whose `read_data` output is stuck at 0.
struct StuckReadData(OrFifoDut);

impl HdlModel for StuckReadData {
    fn top_name(&self) -> &str {
        self.0.top_name()
    }
    fn ports(&self) -> &[Port] {
        self.0.ports()
    }
    fn clock_port(&self) -> usize {
        self.0.clock_port()
    }
    fn on_rising_edge(&mut self, sampled: &[u64]) {
        self.0.on_rising_edge(sampled);
    }
    fn eval(&self, io: &mut [u64]) {
        self.0.eval(io);
        io[model::READ_DATA] = 0;
    }
}

#[test]
fn dut_test_fails_on_wrong_read_data() {
    let cfg = cfg(5, 10);
    let timeout_ns = cfg.timeout_ns;
    let db = TbObj::new(CoverageDb::new());
    let test_db = db.clone();
    let mut tests = TbTests::new();
    tests.push(Test::new("dut_test", move |dut| {
        dut_test(dut, cfg.clone(), test_db.clone()).boxed_local()
    }));
    let sim = Kernel::new(StuckReadData(OrFifoDut::new("dut")));
    let reports = run_tests(Box::new(sim), &tests, Some(timeout_ns)).unwrap();

    assert_eq!(reports.len(), 1);
    assert!(!reports[0].passed());
    // only (0, 0) reads back as expected
    let err = reports[0].result.as_ref().unwrap_err();
    assert!(err.contains("matched=1, errors=3"), "{}", err);
    // the directed phase still ran to the end
    assert_eq!(db.get().cover_percentage("top.cross.ab").unwrap(), 100.0);
}

#[test]
fn same_seed_same_coverage() {
    let a = run_dut_tests(&cfg(99, 50)).unwrap();
    let b = run_dut_tests(&cfg(99, 50)).unwrap();
    let (a, b) = (a.coverage.get(), b.coverage.get());
    for item in ["top.cross.w", "top.cross.r", "top.rd_add"] {
        let bins = |db: &regbus_tb::coverage::CoverageDb| {
            db.item(item)
                .unwrap()
                .bins()
                .iter()
                .map(|b| b.hits)
                .collect::<Vec<_>>()
        };
        assert_eq!(bins(&a), bins(&b), "{}", item);
    }
}

fn dut() -> Box<Kernel> {
    Box::new(Kernel::new(OrFifoDut::new("dut")))
}

// never released from reset, so read_rdy stays low
async fn waits_forever(dut: SimObject) -> TbResult {
    Task::fork(clock(dut.c("CLK"), 2, TimeUnit::Ns));
    dut.c("read_rdy").rising_edge().await?;
    Ok(Val::None)
}

async fn no_clock(dut: SimObject) -> TbResult {
    dut.c("read_rdy").rising_edge().await?;
    Ok(Val::None)
}

async fn passes_early(dut: SimObject) -> TbResult {
    let clk = dut.c("CLK");
    Task::fork(clock(clk, 2, TimeUnit::Ns));
    Task::fork(async move {
        clock_cycles(clk, 5).await?;
        pass_test("five cycles");
        fail_test("ignored");
        Ok(Val::None)
    });
    dut.c("read_rdy").rising_edge().await?;
    Ok(Val::None)
}

async fn fails(_dut: SimObject) -> TbResult {
    Trigger::timer(10, TimeUnit::Ns).await?;
    Err(TbError::Failed("broken".to_string()))
}

#[test]
fn runner_outcomes() {
    let tests = tests!(waits_forever, no_clock, passes_early, fails);
    let reports = run_tests(dut(), &tests, Some(100)).unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["waits_forever", "no_clock", "passes_early", "fails"]);

    assert!(reports[0].result.as_ref().unwrap_err().contains("timeout"));
    assert!(reports[0].sim_time_ns > 100.0);
    assert!(reports[1].result.as_ref().unwrap_err().contains("ran out of events"));
    assert_eq!(reports[2].result.as_deref(), Ok("five cycles"));
    assert_eq!(reports[3].result.as_ref().unwrap_err(), "broken");
    assert!((reports[3].sim_time_ns - 10.0).abs() < 1e-6);
}
