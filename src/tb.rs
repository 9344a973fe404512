//! Testbench of the OR/FIFO block: reset, directed OR checks, then constrained-random
//! bus cycles with functional coverage.

use std::fmt;

use crate::config::TbConfig;
use crate::coverage::{CoverGroup, CoverageDb};
use crate::driver::{BusDriver, ReadDriver, Transaction, WriteDriver};
use crate::kernel::Kernel;
use crate::model::{OrFifoDut, RegAddr};
use crate::prelude::*;
use crate::stimulus::{rw_problem, Stimulus, StimulusSampler};
use crate::test::{TbTests, Test, TestReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatVal {
    Full,
    Empty,
    Data(u32),
}

impl fmt::Display for StatVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatVal::Full => f.write_str("full"),
            StatVal::Empty => f.write_str("empty"),
            StatVal::Data(v) => write!(f, "{}", v),
        }
    }
}

/// One observed register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub name: &'static str,
    pub val: StatVal,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{name: {}, val: {}}}", self.name, self.val)
    }
}

/// Sample of the directed phase.
#[derive(Debug, Clone, Copy)]
pub struct AbSample {
    pub a: u32,
    pub b: u32,
}

pub fn ab_cover(db: &TbObj<CoverageDb>) -> TbResult<CoverGroup<AbSample>> {
    CoverGroup::new(db)
        .cover_point("top.a", [0, 1], |s: &AbSample| i64::from(s.a))?
        .cover_point("top.b", [0, 1], |s: &AbSample| i64::from(s.b))?
        .cover_cross("top.cross.ab", &["top.a", "top.b"])
}

pub fn w_r_cover(db: &TbObj<CoverageDb>) -> TbResult<CoverGroup<Stimulus>> {
    CoverGroup::new(db)
        .cover_point("top.rd_add", [0, 1, 2, 3], |s: &Stimulus| i64::from(s.read_address))?
        .cover_point("top.rd_en", [0, 1], |s: &Stimulus| i64::from(s.read_en))?
        .cover_point("top.wd_add", [4, 5], |s: &Stimulus| i64::from(s.write_address))?
        .cover_point("top.wd_en", [0, 1], |s: &Stimulus| i64::from(s.write_en))?
        .cover_point("top.wd_data", [0, 1], |s: &Stimulus| i64::from(s.write_data))?
        .cover_cross("top.cross.w", &["top.wd_add", "top.wd_data", "top.wd_en"])?
        .cover_cross("top.cross.r", &["top.rd_add", "top.rd_en"])
}

pub struct DutTb {
    pub name: String,
    dut: SimObject,
    clk: SimObject,
    rst_n: SimObject,
    read_data: SimObject,
    pub writer: WriteDriver,
    pub reader: ReadDriver,
    pub scoreboard: Scoreboard<u32>,
    stats: Vec<Stat>,
}

impl DutTb {
    pub fn new(name: &str, dut: SimObject) -> TbResult<Self> {
        Ok(DutTb {
            name: name.to_string(),
            dut,
            clk: dut.get_child("CLK")?,
            rst_n: dut.get_child("RST_N")?,
            read_data: dut.get_child("read_data")?,
            writer: WriteDriver::new("write_FIFO", dut)?,
            reader: ReadDriver::new("read_FIFO", dut)?,
            scoreboard: Scoreboard::new(),
            stats: Vec::new(),
        })
    }

    pub fn clk(&self) -> SimObject {
        self.clk
    }

    pub fn read_data(&self) -> TbResult<u32> {
        self.read_data.u32()
    }

    /// Drives the bus idle and pulses the active-low reset for 3 cycles.
    pub async fn reset(&self) -> TbResult<()> {
        self.clk.rising_edge().await?;
        for name in ["write_en", "write_address", "write_data", "read_en", "read_address"] {
            self.dut.get_child(name)?.set(0)?;
        }
        self.rst_n.set(1)?;
        clock_cycles(self.clk, 3).await?;
        self.rst_n.set(0)?;
        clock_cycles(self.clk, 3).await?;
        self.rst_n.set(1)?;
        self.clk.rising_edge().await
    }

    /// Records a register access. Status registers are decoded into full/empty.
    pub fn stat(&mut self, addr: u32, val: u32) {
        let stat = match RegAddr::try_from(addr) {
            Ok(RegAddr::AStatus) => Stat { name: "as", val: not_full_flag(val) },
            Ok(RegAddr::BStatus) => Stat { name: "bs", val: not_full_flag(val) },
            Ok(RegAddr::YStatus) => Stat {
                name: "ys",
                val: if val == 1 { StatVal::Full } else { StatVal::Empty },
            },
            Ok(RegAddr::YOutput) => Stat { name: "yr", val: StatVal::Data(val) },
            Ok(RegAddr::AData) => Stat { name: "aw", val: StatVal::Data(val) },
            Ok(RegAddr::BData) => Stat { name: "bw", val: StatVal::Data(val) },
            Err(_) => return,
        };
        self.stats.push(stat);
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn solve(&self, seed: u64) -> TbResult<StimulusSampler> {
        StimulusSampler::solve(&rw_problem()?, seed)
    }
}

fn not_full_flag(val: u32) -> StatVal {
    match val {
        0 => StatVal::Full,
        _ => StatVal::Empty,
    }
}

pub async fn dut_test(dut: SimObject, cfg: TbConfig, db: TbObj<CoverageDb>) -> TbResult {
    let clk = dut.get_child("CLK")?;
    Task::fork(clock(clk, cfg.clock_period_ns, TimeUnit::Ns));

    let mut tb = DutTb::new("tb inst", dut)?;
    tb.reset().await?;

    // directed: y must be a | b
    let ab = ab_cover(&db)?;
    for (a, b) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        tb.writer.send(Transaction::new(RegAddr::AData as u32, a)).await?;
        tb.writer.send(Transaction::new(RegAddr::BData as u32, b)).await?;
        ab.sample(&AbSample { a, b });
        tb.scoreboard.add_exp(a | b);
        tb.reader.send(Transaction::new(RegAddr::YOutput as u32, 0)).await?;
        let y = tb.read_data()?;
        log::debug!("[functional] a:{} b:{} y:{}", a, b, y);
        tb.scoreboard.add_recv(y);
    }

    let seed = cfg.seed_or_random();
    log::info!("Stimulus seed: {}", seed);
    let mut sampler = tb.solve(seed)?;
    let w_r = w_r_cover(&db)?;
    for i in 0..cfg.cycles {
        let x = sampler.sample().ok_or(TbError::NoSolutions)?;
        w_r.sample(&x);
        if x.read_en == 1 {
            tb.reader.send(Transaction::new(x.read_address, 0)).await?;
            let data = tb.read_data()?;
            log::debug!("[{}][read operation] address : {} got data : {}", i, x.read_address, data);
            tb.stat(x.read_address, data);
        } else if x.write_en == 1 {
            tb.writer
                .send(Transaction::new(x.write_address, x.write_data))
                .await?;
            log::debug!(
                "[{}][write operation] address : {} put data : {}",
                i,
                x.write_address,
                x.write_data
            );
            tb.stat(x.write_address, x.write_data);
        }
        clk.rising_edge().await?;
    }
    for s in tb.stats() {
        log::debug!("{}", s);
    }

    {
        let db = db.get();
        for line in db.report_coverage(cfg.report_bins).lines() {
            log::info!("{}", line);
        }
        log::info!("Functional Coverage: {:.2} %", db.cover_percentage("top.cross.ab")?);
        log::info!("Write Coverage: {:.2} %", db.cover_percentage("top.cross.w")?);
        log::info!("Read Coverage: {:.2} %", db.cover_percentage("top.cross.r")?);
    }

    tb.scoreboard.result()
}

/// Results of a full testbench run against the in-process model.
pub struct DutRun {
    pub reports: Vec<TestReport>,
    pub coverage: TbObj<CoverageDb>,
}

impl DutRun {
    pub fn passed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(TestReport::passed)
    }
}

/// Simulates the OR/FIFO model on this thread and runs `dut_test` on it.
pub fn run_dut_tests(cfg: &TbConfig) -> TbResult<DutRun> {
    let coverage = TbObj::new(CoverageDb::new());
    let mut tests = TbTests::new();
    let (test_cfg, test_db) = (cfg.clone(), coverage.clone());
    tests.push(Test::new("dut_test", move |dut| {
        dut_test(dut, test_cfg.clone(), test_db.clone()).boxed_local()
    }));
    let sim = Kernel::new(OrFifoDut::new("dut"));
    let reports = crate::run_tests(Box::new(sim), &tests, Some(cfg.timeout_ns))?;
    Ok(DutRun { reports, coverage })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb() -> DutTb {
        crate::sim_if::install(Box::new(Kernel::new(OrFifoDut::new("dut"))));
        DutTb::new("tb", SimObject::get_root().unwrap()).unwrap()
    }

    #[test]
    fn stat_decodes_register_map() {
        let mut tb = tb();
        tb.stat(0, 0);
        tb.stat(1, 1);
        tb.stat(2, 1);
        tb.stat(2, 0);
        tb.stat(3, 1);
        tb.stat(4, 0);
        tb.stat(5, 1);
        tb.stat(6, 1);
        let got: Vec<String> = tb.stats().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            got,
            [
                "{name: as, val: full}",
                "{name: bs, val: empty}",
                "{name: ys, val: full}",
                "{name: ys, val: empty}",
                "{name: yr, val: 1}",
                "{name: aw, val: 0}",
                "{name: bw, val: 1}",
            ]
        );
        crate::sim_if::uninstall();
    }

    #[test]
    fn cover_groups_have_expected_sizes() {
        let db = TbObj::new(CoverageDb::new());
        ab_cover(&db).unwrap();
        w_r_cover(&db).unwrap();
        let db = db.get();
        assert_eq!(db.size("top.cross.ab").unwrap(), 4);
        assert_eq!(db.size("top.cross.w").unwrap(), 8);
        assert_eq!(db.size("top.cross.r").unwrap(), 8);
    }

    #[test]
    fn missing_port_is_reported() {
        crate::sim_if::install(Box::new(Kernel::new(OrFifoDut::new("dut"))));
        let root = SimObject::get_root().unwrap();
        assert!(matches!(root.get_child("write_strobe"), Err(TbError::UnknownObject(n)) if n == "dut.write_strobe"));
        crate::sim_if::uninstall();
    }
}
