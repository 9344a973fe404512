//! Finite-domain constraint problems solved by exhaustive enumeration.

use std::collections::BTreeMap;
use std::fmt;

use crate::{TbError, TbResult};

type Predicate = Box<dyn Fn(&[i64]) -> bool>;

struct Constraint {
    vars: Vec<usize>,
    // index of the last variable the constraint depends on
    ready_at: usize,
    pred: Predicate,
}

/// Variables with finite domains and predicates over them.
#[derive(Default)]
pub struct Problem {
    vars: Vec<(String, Vec<i64>)>,
    constraints: Vec<Constraint>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(
        &mut self,
        name: &str,
        domain: impl IntoIterator<Item = i64>,
    ) -> TbResult<()> {
        if self.index_of(name).is_some() {
            return Err(TbError::DuplicateVariable(name.to_string()));
        }
        self.vars.push((name.to_string(), domain.into_iter().collect()));
        Ok(())
    }

    /// `pred` gets the values of `vars`, in that order.
    pub fn add_constraint(
        &mut self,
        pred: impl Fn(&[i64]) -> bool + 'static,
        vars: &[&str],
    ) -> TbResult<()> {
        let vars = vars
            .iter()
            .map(|v| {
                self.index_of(v)
                    .ok_or_else(|| TbError::UndeclaredVariable(v.to_string()))
            })
            .collect::<TbResult<Vec<_>>>()?;
        let ready_at = vars.iter().copied().max().unwrap_or(0);
        self.constraints.push(Constraint {
            vars,
            ready_at,
            pred: Box::new(pred),
        });
        Ok(())
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(name, _)| name.as_str())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|(n, _)| n == name)
    }

    /// All assignments satisfying every constraint, in declaration/domain order.
    pub fn get_solutions(&self) -> Vec<Solution> {
        let mut solutions = Vec::new();
        if self.vars.is_empty() {
            return solutions;
        }
        // constraints grouped by the depth at which they can be checked
        let mut by_depth: Vec<Vec<&Constraint>> = vec![Vec::new(); self.vars.len()];
        for c in &self.constraints {
            by_depth[c.ready_at].push(c);
        }
        let mut assignment = vec![0; self.vars.len()];
        self.search(0, &by_depth, &mut assignment, &mut solutions);
        log::debug!(
            "{} solutions for {} variables and {} constraints",
            solutions.len(),
            self.vars.len(),
            self.constraints.len()
        );
        solutions
    }

    fn search(
        &self,
        depth: usize,
        by_depth: &[Vec<&Constraint>],
        assignment: &mut [i64],
        solutions: &mut Vec<Solution>,
    ) {
        let mut args = Vec::new();
        for &value in &self.vars[depth].1 {
            assignment[depth] = value;
            let consistent = by_depth[depth].iter().all(|c| {
                args.clear();
                args.extend(c.vars.iter().map(|&i| assignment[i]));
                (c.pred)(&args)
            });
            if !consistent {
                continue;
            }
            if depth + 1 == self.vars.len() {
                solutions.push(Solution(
                    self.vars
                        .iter()
                        .zip(assignment.iter())
                        .map(|((name, _), &v)| (name.clone(), v))
                        .collect(),
                ));
            } else {
                self.search(depth + 1, by_depth, assignment, solutions);
            }
        }
    }
}

/// One satisfying assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution(BTreeMap<String, i64>);

impl Solution {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn require(&self, name: &str) -> TbResult<i64> {
        self.get(name)
            .ok_or_else(|| TbError::MissingVariable(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{{{}}}", fields.join(", "))
    }
}
