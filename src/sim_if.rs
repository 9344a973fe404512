use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use crate::signal::ObjectKind;
use crate::trigger::EdgeKind;
use crate::{TbError, TbResult};

thread_local! {
    // One simulator per thread. The testbench runs single threaded on top of it.
    static SIM_IF: RefCell<Option<Box<dyn SimIf>>> = RefCell::new(None);
}

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative delay on registration, absolute time when delivered.
    Time(u64),
    /// Value change of the object with this handle.
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

/// A callback delivered by the simulator, with the edge direction for 1-bit value changes.
pub type SimEvent = (SimCallback, Option<EdgeKind>);

pub trait SimIf {
    fn set_value(&mut self, handle: usize, value: u64) -> TbResult<()>;
    fn get_value(&self, handle: usize) -> TbResult<u64>;
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize>;
    fn get_full_name(&self, handle: usize) -> TbResult<String>;
    fn get_kind(&self, handle: usize) -> ObjectKind;
    fn get_root_handle(&self) -> TbResult<usize>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&mut self, cb: SimCallback) -> TbResult<usize>;
    fn cancel_callback(&mut self, cb_hdl: usize) -> TbResult<()>;
    /// Runs the simulator up to the next callback that has to be delivered.
    /// `None` means the simulation has nothing left to do.
    fn advance(&mut self) -> Option<SimEvent>;

    fn get_sim_time(&self, unit: TimeUnit) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        ldexp10(t, self.get_sim_precision() - unit.scale())
    }
    fn get_sim_steps(&self, time: u64, unit: TimeUnit) -> TbResult<u64> {
        let precision = self.get_sim_precision();
        let exp = unit.scale() - precision;
        if exp >= 0 {
            10_u64
                .checked_pow(exp as u32)
                .and_then(|mul| time.checked_mul(mul))
                .ok_or_else(|| TbError::TimeOverflow(format!("{} {}", time, unit)))
        } else {
            match 10_u64.checked_pow((-exp) as u32) {
                Some(div) if time % div == 0 => Ok(time / div),
                _ if time == 0 => Ok(0),
                _ => Err(TbError::TimeRounding {
                    time,
                    unit: unit.to_string(),
                    precision,
                }),
            }
        }
    }
}

/// Installs `sim` as this thread's simulator and returns the one it replaces.
pub fn install(sim: Box<dyn SimIf>) -> Option<Box<dyn SimIf>> {
    SIM_IF.with(|s| s.borrow_mut().replace(sim))
}

pub fn uninstall() -> Option<Box<dyn SimIf>> {
    SIM_IF.with(|s| s.borrow_mut().take())
}

pub fn is_installed() -> bool {
    SIM_IF.with(|s| s.borrow().is_some())
}

/// Runs `f` against this thread's simulator. The borrow ends with `f`, so `f` must not
/// call back into the testbench.
pub fn with_sim<R>(f: impl FnOnce(&mut dyn SimIf) -> R) -> TbResult<R> {
    SIM_IF.with(|s| match s.borrow_mut().as_mut() {
        Some(sim) => Ok(f(sim.as_mut())),
        None => Err(TbError::NoSimulator),
    })
}

pub fn sim_time(unit: TimeUnit) -> TbResult<f64> {
    with_sim(|s| s.get_sim_time(unit))
}

/// Current time in ns, or `None` while the simulator is busy or absent. Used by the logger.
pub fn try_sim_time_ns() -> Option<f64> {
    SIM_IF
        .try_with(|s| {
            let sim = s.try_borrow().ok()?;
            let t = sim.as_ref().map(|sim| sim.get_sim_time(TimeUnit::Ns));
            t
        })
        .ok()
        .flatten()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Fs,
    Ps,
    Ns,
    Us,
    Ms,
    Sec,
}

impl TimeUnit {
    fn scale(self) -> i8 {
        match self {
            TimeUnit::Fs => -15,
            TimeUnit::Ps => -12,
            TimeUnit::Ns => -9,
            TimeUnit::Us => -6,
            TimeUnit::Ms => -3,
            TimeUnit::Sec => 0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fs" => Ok(TimeUnit::Fs),
            "ps" => Ok(TimeUnit::Ps),
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "sec" => Ok(TimeUnit::Sec),
            _ => Err(TbError::TimeUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::Sec => "sec",
        };
        f.write_str(s)
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!("ns".parse::<TimeUnit>().unwrap(), TimeUnit::Ns);
        assert_eq!("sec".parse::<TimeUnit>().unwrap(), TimeUnit::Sec);
        assert!(matches!("hours".parse::<TimeUnit>(), Err(TbError::TimeUnit(_))));
    }

    #[test]
    fn ldexp10_scales_both_ways() {
        assert_eq!(ldexp10(1.5, 3), 1500.0);
        assert_eq!(ldexp10(2500.0, -3), 2.5);
    }

    #[test]
    fn time_to_steps() {
        let sim = crate::kernel::Kernel::new(crate::model::OrFifoDut::new("dut"));
        assert_eq!(sim.get_sim_steps(3, TimeUnit::Ns).unwrap(), 3000);
        assert_eq!(sim.get_sim_steps(2000, TimeUnit::Fs).unwrap(), 2);
        assert!(matches!(
            sim.get_sim_steps(1500, TimeUnit::Fs),
            Err(TbError::TimeRounding { time: 1500, .. })
        ));
        assert!(matches!(
            sim.get_sim_steps(u64::MAX / 10, TimeUnit::Sec),
            Err(TbError::TimeOverflow(_))
        ));
    }

    #[test]
    fn no_simulator_is_an_error() {
        std::thread::spawn(|| {
            assert!(matches!(sim_time(TimeUnit::Ns), Err(TbError::NoSimulator)));
            assert_eq!(try_sim_time_ns(), None);
        })
        .join()
        .unwrap();
    }
}
