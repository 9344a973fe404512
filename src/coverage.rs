//! Functional coverage: cover points, crosses and a hierarchical database.
//!
//! Item names are dotted paths. Any prefix of a name (`top`, `top.cross`) is a
//! group whose size and coverage are the sums over the items below it.

use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::tb_obj::TbObj;
use crate::{TbError, TbResult};

#[derive(Debug, Clone, Serialize)]
pub struct Bin {
    pub label: String,
    pub hits: u64,
}

#[derive(Debug)]
enum CoverKind {
    Point { values: Vec<i64> },
    Cross { dims: Vec<usize> },
}

#[derive(Debug)]
pub struct CoverItem {
    kind: CoverKind,
    bins: Vec<Bin>,
    at_least: u64,
}

impl CoverItem {
    pub fn size(&self) -> usize {
        self.bins.len()
    }

    /// Number of bins hit at least `at_least` times.
    pub fn coverage(&self) -> usize {
        self.bins.iter().filter(|b| b.hits >= self.at_least).count()
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }
}

#[derive(Debug, Default)]
pub struct CoverageDb {
    items: BTreeMap<String, CoverItem>,
}

impl CoverageDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, name: &str, values: Vec<i64>) -> TbResult<()> {
        let bins = values
            .iter()
            .map(|v| Bin { label: v.to_string(), hits: 0 })
            .collect();
        self.insert(name, CoverItem { kind: CoverKind::Point { values }, bins, at_least: 1 })
    }

    /// Cross of previously added cover points.
    pub fn add_cross(&mut self, name: &str, items: &[&str]) -> TbResult<()> {
        let mut axes = Vec::with_capacity(items.len());
        for item in items {
            match self.items.get(*item).map(|i| &i.kind) {
                Some(CoverKind::Point { values }) => axes.push(values.clone()),
                _ => return Err(TbError::UnknownCoverItem(item.to_string())),
            }
        }
        let dims = axes.iter().map(Vec::len).collect();
        let bins = cartesian(&axes)
            .into_iter()
            .map(|combo| {
                let label: Vec<String> = combo.iter().map(i64::to_string).collect();
                Bin { label: format!("({})", label.join(", ")), hits: 0 }
            })
            .collect();
        self.insert(name, CoverItem { kind: CoverKind::Cross { dims }, bins, at_least: 1 })
    }

    fn insert(&mut self, name: &str, item: CoverItem) -> TbResult<()> {
        if self.items.contains_key(name) {
            return Err(TbError::DuplicateCoverItem(name.to_string()));
        }
        self.items.insert(name.to_string(), item);
        Ok(())
    }

    /// Bins of `name` count as covered after `at_least` hits.
    pub fn set_at_least(&mut self, name: &str, at_least: u64) -> TbResult<()> {
        let item = self
            .items
            .get_mut(name)
            .ok_or_else(|| TbError::UnknownCoverItem(name.to_string()))?;
        item.at_least = at_least;
        Ok(())
    }

    /// Records `value` on a cover point and returns the bin it fell into.
    pub fn hit_point(&mut self, name: &str, value: i64) -> Option<usize> {
        let item = self.items.get_mut(name)?;
        let CoverKind::Point { values } = &item.kind else {
            return None;
        };
        let idx = values.iter().position(|&v| v == value)?;
        item.bins[idx].hits += 1;
        Some(idx)
    }

    /// Records one bin index per crossed point and returns the cross bin hit.
    /// `None` if `name` is not a cross or an index is out of range.
    pub fn hit_cross(&mut self, name: &str, idx: &[usize]) -> Option<usize> {
        let item = self.items.get_mut(name)?;
        let CoverKind::Cross { dims } = &item.kind else {
            return None;
        };
        if idx.len() != dims.len() || idx.iter().zip(dims).any(|(&i, &d)| i >= d) {
            return None;
        }
        // row major, first item varies slowest
        let flat = idx.iter().zip(dims).fold(0, |acc, (&i, &d)| acc * d + i);
        item.bins[flat].hits += 1;
        Some(flat)
    }

    pub fn item(&self, name: &str) -> Option<&CoverItem> {
        self.items.get(name)
    }

    fn select(&self, name: &str) -> TbResult<Vec<&CoverItem>> {
        if let Some(item) = self.items.get(name) {
            return Ok(vec![item]);
        }
        let prefix = format!("{}.", name);
        let items: Vec<&CoverItem> = self
            .items
            .iter()
            .filter(|(n, _)| n.starts_with(&prefix))
            .map(|(_, i)| i)
            .collect();
        match items.is_empty() {
            true => Err(TbError::UnknownCoverItem(name.to_string())),
            false => Ok(items),
        }
    }

    pub fn size(&self, name: &str) -> TbResult<usize> {
        Ok(self.select(name)?.iter().map(|i| i.size()).sum())
    }

    pub fn coverage(&self, name: &str) -> TbResult<usize> {
        Ok(self.select(name)?.iter().map(|i| i.coverage()).sum())
    }

    pub fn cover_percentage(&self, name: &str) -> TbResult<f64> {
        let size = self.size(name)?;
        let coverage = self.coverage(name)?;
        Ok(match size {
            0 => 0.0,
            _ => 100.0 * coverage as f64 / size as f64,
        })
    }

    /// Every item and every group above it, in tree order.
    fn nodes(&self) -> BTreeSet<String> {
        let mut nodes = BTreeSet::new();
        for name in self.items.keys() {
            let mut end = 0;
            for part in name.split('.') {
                end += part.len();
                nodes.insert(name[..end].to_string());
                end += 1;
            }
        }
        nodes
    }

    pub fn report_coverage(&self, bins: bool) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(vec![
            Cell::new("item"),
            Cell::new("size"),
            Cell::new("covered"),
            Cell::new("coverage"),
        ]));
        for node in self.nodes() {
            let depth = node.matches('.').count();
            let (size, coverage, pct) = match (
                self.size(&node),
                self.coverage(&node),
                self.cover_percentage(&node),
            ) {
                (Ok(s), Ok(c), Ok(p)) => (s, c, p),
                _ => continue,
            };
            table.add_row(Row::new(vec![
                Cell::new(&format!("{}{}", "  ".repeat(depth), node)),
                Cell::new(&size.to_string()),
                Cell::new(&coverage.to_string()),
                Cell::new(&format!("{:.2} %", pct)),
            ]));
            if !bins {
                continue;
            }
            if let Some(item) = self.items.get(&node) {
                for bin in &item.bins {
                    table.add_row(Row::new(vec![
                        Cell::new(&format!("{}  bin {}", "  ".repeat(depth), bin.label)),
                        Cell::new(""),
                        Cell::new(&bin.hits.to_string()),
                        Cell::new(if bin.hits >= item.at_least { "hit" } else { "-" }),
                    ]));
                }
            }
        }
        table.to_string()
    }

    pub fn export_json(&self, path: &Path) -> TbResult<()> {
        let items: Vec<ItemExport> = self
            .items
            .iter()
            .map(|(name, item)| ItemExport {
                name,
                size: item.size(),
                coverage: item.coverage(),
                cover_percentage: 100.0 * item.coverage() as f64 / item.size().max(1) as f64,
                at_least: item.at_least,
                bins: &item.bins,
            })
            .collect();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &items)?;
        log::info!("Coverage written to {}", path.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct ItemExport<'a> {
    name: &'a str,
    size: usize,
    coverage: usize,
    cover_percentage: f64,
    at_least: u64,
    bins: &'a [Bin],
}

fn cartesian(axes: &[Vec<i64>]) -> Vec<Vec<i64>> {
    axes.iter().fold(vec![Vec::new()], |acc, axis| {
        acc.iter()
            .flat_map(|prefix| {
                axis.iter().map(move |&v| {
                    let mut combo = prefix.clone();
                    combo.push(v);
                    combo
                })
            })
            .collect()
    })
}

type Transform<S> = Box<dyn Fn(&S) -> i64>;

/// Sampling function over `S`: every sample updates all points, then all crosses.
pub struct CoverGroup<S> {
    db: TbObj<CoverageDb>,
    points: Vec<(String, Transform<S>)>,
    crosses: Vec<(String, Vec<usize>)>,
}

impl<S> CoverGroup<S> {
    pub fn new(db: &TbObj<CoverageDb>) -> Self {
        CoverGroup {
            db: db.clone(),
            points: Vec::new(),
            crosses: Vec::new(),
        }
    }

    pub fn cover_point(
        mut self,
        name: &str,
        bins: impl IntoIterator<Item = i64>,
        xf: impl Fn(&S) -> i64 + 'static,
    ) -> TbResult<Self> {
        self.db.get_mut().add_point(name, bins.into_iter().collect())?;
        self.points.push((name.to_string(), Box::new(xf)));
        Ok(self)
    }

    /// Crosses cover points of this group.
    pub fn cover_cross(mut self, name: &str, items: &[&str]) -> TbResult<Self> {
        let idx = items
            .iter()
            .map(|item| {
                self.points
                    .iter()
                    .position(|(n, _)| n == item)
                    .ok_or_else(|| TbError::UnknownCoverItem(item.to_string()))
            })
            .collect::<TbResult<Vec<_>>>()?;
        self.db.get_mut().add_cross(name, items)?;
        self.crosses.push((name.to_string(), idx));
        Ok(self)
    }

    pub fn sample(&self, s: &S) {
        let mut db = self.db.get_mut();
        let hits: Vec<Option<usize>> = self
            .points
            .iter()
            .map(|(name, xf)| db.hit_point(name, xf(s)))
            .collect();
        for (name, items) in &self.crosses {
            let bins: Option<Vec<usize>> = items.iter().map(|&i| hits[i]).collect();
            if let Some(bins) = bins {
                db.hit_cross(name, &bins);
            }
        }
    }
}
