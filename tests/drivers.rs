use regbus_tb::driver::{BusDriver, ReadDriver, Transaction, WriteDriver};
use regbus_tb::kernel::Kernel;
use regbus_tb::model::{OrFifoDut, RegAddr};
use regbus_tb::prelude::*;
use regbus_tb::{run_tests, tests, TestReport};

fn run(tests: &regbus_tb::TbTests) -> Vec<TestReport> {
    let sim = Kernel::new(OrFifoDut::new("dut"));
    run_tests(Box::new(sim), tests, Some(10_000)).unwrap()
}

async fn read(reader: &ReadDriver, dut: SimObject, addr: RegAddr) -> TbResult<u32> {
    reader.send(Transaction::new(addr as u32, 0)).await?;
    dut.c("read_data").u32()
}

async fn write_then_read(dut: SimObject) -> TbResult {
    let clk = dut.c("CLK");
    Task::fork(clock(clk, 2, TimeUnit::Ns));
    let rst_n = dut.c("RST_N");
    Task::fork(async move {
        clock_cycles(clk, 3).await?;
        rst_n.set(1)?;
        Ok(Val::None)
    });

    let writer = WriteDriver::new("w", dut)?;
    let reader = ReadDriver::new("r", dut)?;
    assert_eq!(writer.name(), "w");

    // blocks on write_rdy until reset is released
    writer.send(Transaction::new(RegAddr::AData as u32, 1)).await?;
    assert_eq!(read(&reader, dut, RegAddr::AStatus).await?, 1);
    writer.send(Transaction::new(RegAddr::AData as u32, 1)).await?;
    assert_eq!(read(&reader, dut, RegAddr::AStatus).await?, 0);

    writer.send(Transaction::new(RegAddr::BData as u32, 0)).await?;
    assert_eq!(read(&reader, dut, RegAddr::YOutput).await?, 1);
    assert_eq!(read(&reader, dut, RegAddr::YStatus).await?, 0);
    Ok(Val::Int(sim_time_ns()))
}

fn sim_time_ns() -> i64 {
    regbus_tb::sim_if::sim_time(TimeUnit::Ns).map_or(-1, |t| t as i64)
}

async fn enable_is_a_single_cycle_pulse(dut: SimObject) -> TbResult {
    let clk = dut.c("CLK");
    Task::fork(clock(clk, 2, TimeUnit::Ns));
    dut.c("RST_N").set(1)?;
    let writer = WriteDriver::new("w", dut)?;
    let en = dut.c("write_en");

    writer.send(Transaction::new(RegAddr::BData as u32, 1)).await?;
    // sampled high on the completing edge, low from the next delta on
    assert_eq!(en.u32()?, 1);
    Trigger::read_only().await?;
    assert_eq!(en.u32()?, 0);
    assert_eq!(dut.c("write_address").u32()?, RegAddr::BData as u32);
    assert_eq!(dut.c("write_data").u32()?, 1);
    Ok(Val::None)
}

#[test]
fn drivers_through_the_kernel() {
    let reports = run(&tests!(write_then_read, enable_is_a_single_cycle_pulse));
    for r in &reports {
        assert!(r.passed(), "{}: {:?}", r.name, r.result);
    }
}
