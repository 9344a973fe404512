//! Legal read/write bus stimulus and its uniform sampler.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::constraint::{Problem, Solution};
use crate::TbResult;

pub const WRITE_EN: &str = "write_en";
pub const WRITE_ADDRESS: &str = "write_address";
pub const WRITE_DATA: &str = "write_data";
pub const WRITE_RDY: &str = "write_rdy";
pub const READ_EN: &str = "read_en";
pub const READ_RDY: &str = "read_rdy";
pub const READ_ADDRESS: &str = "read_address";

/// Constraint model of one bus cycle.
///
/// Exactly one of read and write is enabled per cycle, and a cycle that doesn't read
/// keeps the read address on one of the a/b status registers.
pub fn rw_problem() -> TbResult<Problem> {
    let mut p = Problem::new();
    p.add_variable(WRITE_EN, [0, 1])?;
    p.add_variable(WRITE_ADDRESS, [4, 5])?;
    p.add_variable(WRITE_DATA, [0, 1])?;
    p.add_variable(WRITE_RDY, [1])?;
    p.add_variable(READ_EN, [0, 1])?;
    p.add_variable(READ_RDY, [1])?;
    p.add_variable(READ_ADDRESS, [3, 2, 1, 0])?;

    // read when the read side is ready and nothing is written
    p.add_constraint(
        |v| match v[1] == 1 && v[2] == 0 {
            true => v[0] == 1,
            false => v[0] == 0,
        },
        &[READ_EN, READ_RDY, WRITE_EN],
    )?;
    // write when the write side is ready and nothing is read
    p.add_constraint(
        |v| match v[1] == 1 && v[2] == 0 {
            true => v[0] == 1,
            false => v[0] == 0,
        },
        &[WRITE_EN, WRITE_RDY, READ_EN],
    )?;
    p.add_constraint(
        |v| v[1] == 1 || matches!(v[0], 0 | 1),
        &[READ_ADDRESS, READ_EN],
    )?;
    Ok(p)
}

/// Typed view of a bus-cycle solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stimulus {
    pub write_en: u32,
    pub write_address: u32,
    pub write_data: u32,
    pub read_en: u32,
    pub read_address: u32,
}

impl TryFrom<&Solution> for Stimulus {
    type Error = crate::TbError;

    fn try_from(sol: &Solution) -> Result<Self, Self::Error> {
        Ok(Stimulus {
            write_en: sol.require(WRITE_EN)? as u32,
            write_address: sol.require(WRITE_ADDRESS)? as u32,
            write_data: sol.require(WRITE_DATA)? as u32,
            read_en: sol.require(READ_EN)? as u32,
            read_address: sol.require(READ_ADDRESS)? as u32,
        })
    }
}

/// Picks one legal stimulus per cycle, uniformly from the full solution set.
pub struct StimulusSampler {
    solutions: Vec<Stimulus>,
    rng: StdRng,
}

impl StimulusSampler {
    pub fn solve(problem: &Problem, seed: u64) -> TbResult<Self> {
        let solutions = problem
            .get_solutions()
            .iter()
            .map(Stimulus::try_from)
            .collect::<TbResult<Vec<_>>>()?;
        log::info!("Stimulus solution set: {} legal bus cycles", solutions.len());
        Ok(StimulusSampler {
            solutions,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn solutions(&self) -> &[Stimulus] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// `None` if the constraints have no solution.
    pub fn sample(&mut self) -> Option<Stimulus> {
        self.solutions.choose(&mut self.rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn bus_model_has_24_solutions() {
        let sols = rw_problem().unwrap().get_solutions();
        assert_eq!(sols.len(), 24);
        let reads = sols.iter().filter(|s| s.get(READ_EN) == Some(1)).count();
        assert_eq!(reads, 16);
    }

    #[test]
    fn read_and_write_are_exclusive() {
        let sampler = StimulusSampler::solve(&rw_problem().unwrap(), 1).unwrap();
        for s in sampler.solutions() {
            assert_eq!(s.read_en + s.write_en, 1, "{:?}", s);
            if s.read_en == 0 {
                assert!(s.read_address <= 1, "{:?}", s);
            }
        }
    }

    #[test]
    fn sampler_is_reproducible_and_covers_the_set() {
        let p = rw_problem().unwrap();
        let mut a = StimulusSampler::solve(&p, 42).unwrap();
        let mut b = StimulusSampler::solve(&p, 42).unwrap();
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let s = a.sample().unwrap();
            assert_eq!(Some(s), b.sample());
            seen.insert(s);
        }
        assert_eq!(seen.len(), 24);
    }

    #[test]
    fn empty_set_samples_none() {
        let mut p = Problem::new();
        p.add_variable(WRITE_EN, [0]).unwrap();
        p.add_constraint(|v| v[0] == 1, &[WRITE_EN]).unwrap();
        let mut sampler = StimulusSampler::solve(&p, 0).unwrap();
        assert!(sampler.is_empty());
        assert_eq!(sampler.sample(), None);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let mut p = Problem::new();
        p.add_variable(WRITE_EN, [1]).unwrap();
        assert!(StimulusSampler::solve(&p, 0).is_err());
    }
}
