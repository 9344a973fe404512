use intmap::IntMap;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::signal::ObjectKind;
use crate::sim_if::{SimCallback, SimEvent, SimIf};
use crate::trigger::EdgeKind;
use crate::{TbError, TbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub name: &'static str,
    pub width: u32,
    pub dir: PortDir,
}

impl Port {
    pub const fn input(name: &'static str, width: u32) -> Self {
        Port { name, width, dir: PortDir::Input }
    }
    pub const fn output(name: &'static str, width: u32) -> Self {
        Port { name, width, dir: PortDir::Output }
    }
    fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }
}

/// Cycle-level description of a design the kernel can simulate.
///
/// Port values are indexed in the order of [`HdlModel::ports`].
pub trait HdlModel {
    fn top_name(&self) -> &str;
    fn ports(&self) -> &[Port];
    /// Index of the port whose rising edge runs [`HdlModel::on_rising_edge`].
    fn clock_port(&self) -> usize;
    /// Sequential step, `sampled` holds the port values right before the edge.
    fn on_rising_edge(&mut self, sampled: &[u64]);
    /// Drives the output ports from the current state and inputs.
    fn eval(&self, io: &mut [u64]);
}

#[derive(Debug, Clone, Copy)]
enum CbKind {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

/// Event driven simulator for an [`HdlModel`].
///
/// Handle 0 is the top scope, handle `i + 1` is port `i`. Per time step the kernel
/// delivers timer callbacks, then settles deltas (testbench writes, clock edges,
/// value-change callbacks), then read-write and finally read-only callbacks.
pub struct Kernel {
    model: Box<dyn HdlModel>,
    ports: Vec<Port>,
    values: Vec<u64>,
    names: HashMap<String, usize>,
    time: u64,
    precision: i8,
    pending: Vec<(usize, u64)>,
    // keyed by callback handle
    callbacks: IntMap<CbKind>,
    next_cb: usize,
    timers: BTreeMap<u64, Vec<usize>>,
    // keyed by signal handle
    edge_cbs: IntMap<Vec<usize>>,
    rw: Vec<usize>,
    ro: Vec<usize>,
    ready: VecDeque<(usize, SimEvent)>,
}

impl Kernel {
    /// Precision of 1 ps.
    pub fn new(model: impl HdlModel + 'static) -> Self {
        Kernel::with_precision(model, -12)
    }

    pub fn with_precision(model: impl HdlModel + 'static, precision: i8) -> Self {
        let ports = model.ports().to_vec();
        let mut names = HashMap::new();
        names.insert(model.top_name().to_string(), 0);
        for (i, port) in ports.iter().enumerate() {
            names.insert(format!("{}.{}", model.top_name(), port.name), i + 1);
        }
        let mut values = vec![0; ports.len()];
        model.eval(&mut values);
        Kernel {
            model: Box::new(model),
            ports,
            values,
            names,
            time: 0,
            precision,
            pending: Vec::new(),
            callbacks: IntMap::new(),
            next_cb: 1,
            timers: BTreeMap::new(),
            edge_cbs: IntMap::new(),
            rw: Vec::new(),
            ro: Vec::new(),
            ready: VecDeque::new(),
        }
    }

    fn port_index(&self, handle: usize) -> Option<usize> {
        match handle {
            0 => None,
            h if h <= self.ports.len() => Some(h - 1),
            _ => None,
        }
    }

    /// Applies pending writes and runs the model. Returns true if value-change
    /// callbacks were queued.
    fn settle(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let before = self.values.clone();
        for (idx, value) in std::mem::take(&mut self.pending) {
            self.values[idx] = value & self.ports[idx].mask();
        }
        let clk = self.model.clock_port();
        if before[clk] == 0 && self.values[clk] != 0 {
            // inputs are sampled as they were before the edge
            let mut sampled = self.values.clone();
            for (i, port) in self.ports.iter().enumerate() {
                if port.dir == PortDir::Input && i != clk {
                    sampled[i] = before[i];
                }
            }
            self.model.on_rising_edge(&sampled);
        }
        self.model.eval(&mut self.values);

        let mut queued = false;
        for (idx, port) in self.ports.iter().enumerate() {
            if before[idx] == self.values[idx] {
                continue;
            }
            let edge = match (port.width, self.values[idx]) {
                (1, 0) => EdgeKind::Falling,
                (1, _) => EdgeKind::Rising,
                _ => EdgeKind::Any,
            };
            log::trace!("{} -> {:#x}", port.name, self.values[idx]);
            if let Some(handles) = self.edge_cbs.get((idx + 1) as u64) {
                for &h in handles {
                    self.ready
                        .push_back((h, (SimCallback::Edge(idx + 1), Some(edge))));
                    queued = true;
                }
            }
        }
        queued
    }
}

impl SimIf for Kernel {
    fn set_value(&mut self, handle: usize, value: u64) -> TbResult<()> {
        let idx = match self.port_index(handle) {
            Some(idx) => idx,
            None => return Err(TbError::NoValue(self.get_full_name(handle)?)),
        };
        if self.ports[idx].dir == PortDir::Output {
            return Err(TbError::NotDrivable(self.get_full_name(handle)?));
        }
        self.pending.push((idx, value));
        Ok(())
    }

    fn get_value(&self, handle: usize) -> TbResult<u64> {
        match self.port_index(handle) {
            Some(idx) => Ok(self.values[idx]),
            None => Err(TbError::NoValue(self.get_full_name(handle)?)),
        }
    }

    fn get_handle_by_name(&self, name: &str) -> TbResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TbError::UnknownObject(name.to_string()))
    }

    fn get_full_name(&self, handle: usize) -> TbResult<String> {
        let top = self.model.top_name();
        match handle {
            0 => Ok(top.to_string()),
            _ => match self.port_index(handle) {
                Some(idx) => Ok(format!("{}.{}", top, self.ports[idx].name)),
                None => Err(TbError::UnknownObject(format!("<handle {}>", handle))),
            },
        }
    }

    fn get_kind(&self, handle: usize) -> ObjectKind {
        match handle {
            0 => ObjectKind::Hier,
            _ => match self.port_index(handle) {
                Some(idx) => ObjectKind::Int(self.ports[idx].width),
                None => ObjectKind::Other,
            },
        }
    }

    fn get_root_handle(&self) -> TbResult<usize> {
        Ok(0)
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.time
    }

    fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    fn register_callback(&mut self, cb: SimCallback) -> TbResult<usize> {
        let cb_hdl = self.next_cb;
        let kind = match cb {
            SimCallback::Time(delay) => {
                let abs = self
                    .time
                    .checked_add(delay)
                    .ok_or_else(|| TbError::TimeOverflow(format!("{} steps from now", delay)))?;
                self.timers.entry(abs).or_default().push(cb_hdl);
                CbKind::Time(abs)
            }
            SimCallback::Edge(sig) => {
                if self.port_index(sig).is_none() {
                    return Err(TbError::UnknownObject(format!("<handle {}>", sig)));
                }
                match self.edge_cbs.get_mut(sig as u64) {
                    Some(handles) => handles.push(cb_hdl),
                    None => {
                        self.edge_cbs.insert(sig as u64, vec![cb_hdl]);
                    }
                }
                CbKind::Edge(sig)
            }
            SimCallback::ReadWrite => {
                self.rw.push(cb_hdl);
                CbKind::ReadWrite
            }
            SimCallback::ReadOnly => {
                self.ro.push(cb_hdl);
                CbKind::ReadOnly
            }
        };
        self.next_cb += 1;
        self.callbacks.insert(cb_hdl as u64, kind);
        Ok(cb_hdl)
    }

    fn cancel_callback(&mut self, cb_hdl: usize) -> TbResult<()> {
        let kind = self
            .callbacks
            .remove(cb_hdl as u64)
            .ok_or(TbError::UnknownCallback(cb_hdl))?;
        let list = match kind {
            CbKind::Time(abs) => self.timers.get_mut(&abs),
            CbKind::Edge(sig) => self.edge_cbs.get_mut(sig as u64),
            CbKind::ReadWrite => Some(&mut self.rw),
            CbKind::ReadOnly => Some(&mut self.ro),
        };
        if let Some(list) = list {
            list.retain(|&h| h != cb_hdl);
        }
        if let CbKind::Time(abs) = kind {
            if self.timers.get(&abs).is_some_and(|l| l.is_empty()) {
                self.timers.remove(&abs);
            }
        }
        if let CbKind::Edge(sig) = kind {
            if self.edge_cbs.get(sig as u64).is_some_and(|l| l.is_empty()) {
                self.edge_cbs.remove(sig as u64);
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<SimEvent> {
        loop {
            while let Some((cb_hdl, event)) = self.ready.pop_front() {
                // skip callbacks cancelled after they were queued
                let Some(kind) = self.callbacks.get(cb_hdl as u64).copied() else {
                    continue;
                };
                if !matches!(kind, CbKind::Edge(_)) {
                    self.callbacks.remove(cb_hdl as u64);
                }
                return Some(event);
            }
            if self.settle() {
                continue;
            }
            if !self.rw.is_empty() {
                for h in std::mem::take(&mut self.rw) {
                    self.ready.push_back((h, (SimCallback::ReadWrite, None)));
                }
                continue;
            }
            if !self.ro.is_empty() {
                for h in std::mem::take(&mut self.ro) {
                    self.ready.push_back((h, (SimCallback::ReadOnly, None)));
                }
                continue;
            }
            let (t, handles) = self.timers.pop_first()?;
            self.time = t;
            for h in handles {
                self.ready.push_back((h, (SimCallback::Time(t), None)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// D flip-flop: q <= d on rising clk.
    struct Dff {
        q: u64,
    }

    const PORTS: [Port; 3] = [Port::input("clk", 1), Port::input("d", 4), Port::output("q", 4)];

    impl HdlModel for Dff {
        fn top_name(&self) -> &str {
            "dff"
        }
        fn ports(&self) -> &[Port] {
            &PORTS
        }
        fn clock_port(&self) -> usize {
            0
        }
        fn on_rising_edge(&mut self, sampled: &[u64]) {
            self.q = sampled[1];
        }
        fn eval(&self, io: &mut [u64]) {
            io[2] = self.q;
        }
    }

    fn kernel() -> Kernel {
        Kernel::new(Dff { q: 0 })
    }

    #[test]
    fn names_and_kinds() {
        let k = kernel();
        assert_eq!(k.get_handle_by_name("dff").unwrap(), 0);
        let d = k.get_handle_by_name("dff.d").unwrap();
        assert_eq!(k.get_full_name(d).unwrap(), "dff.d");
        assert_eq!(k.get_kind(d), ObjectKind::Int(4));
        assert_eq!(k.get_kind(0), ObjectKind::Hier);
        assert!(matches!(k.get_handle_by_name("dff.e"), Err(TbError::UnknownObject(_))));
    }

    #[test]
    fn outputs_are_not_drivable() {
        let mut k = kernel();
        assert!(matches!(k.set_value(3, 1), Err(TbError::NotDrivable(n)) if n == "dff.q"));
    }

    #[test]
    fn writes_are_masked_and_applied_in_next_delta() {
        let mut k = kernel();
        k.set_value(2, 0x1f).unwrap();
        assert_eq!(k.get_value(2).unwrap(), 0);
        assert!(k.advance().is_none());
        assert_eq!(k.get_value(2).unwrap(), 0xf);
    }

    #[test]
    fn flop_samples_pre_edge_value() {
        let mut k = kernel();
        k.set_value(2, 5).unwrap();
        k.advance();
        // d changes together with the clock edge, q must take the old d
        k.set_value(2, 9).unwrap();
        k.set_value(1, 1).unwrap();
        k.advance();
        assert_eq!(k.get_value(3).unwrap(), 5);
    }

    #[test]
    fn edge_callbacks_report_direction() {
        let mut k = kernel();
        let cb = k.register_callback(SimCallback::Edge(1)).unwrap();
        k.set_value(1, 1).unwrap();
        assert_eq!(k.advance(), Some((SimCallback::Edge(1), Some(EdgeKind::Rising))));
        k.set_value(1, 0).unwrap();
        assert_eq!(k.advance(), Some((SimCallback::Edge(1), Some(EdgeKind::Falling))));
        k.cancel_callback(cb).unwrap();
        k.set_value(1, 1).unwrap();
        assert_eq!(k.advance(), None);
    }

    #[test]
    fn phases_in_order_and_time_advances() {
        let mut k = kernel();
        k.register_callback(SimCallback::Time(1000)).unwrap();
        k.register_callback(SimCallback::ReadOnly).unwrap();
        k.register_callback(SimCallback::ReadWrite).unwrap();
        assert_eq!(k.advance(), Some((SimCallback::ReadWrite, None)));
        assert_eq!(k.advance(), Some((SimCallback::ReadOnly, None)));
        assert_eq!(k.advance(), Some((SimCallback::Time(1000), None)));
        assert_eq!(k.get_sim_time_steps(), 1000);
        assert_eq!(k.advance(), None);
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let mut k = kernel();
        let cb = k.register_callback(SimCallback::Time(10)).unwrap();
        k.cancel_callback(cb).unwrap();
        assert!(matches!(k.cancel_callback(cb), Err(TbError::UnknownCallback(_))));
        assert_eq!(k.advance(), None);
    }

    #[test]
    fn timer_overflow_is_an_error() {
        let mut k = kernel();
        k.register_callback(SimCallback::Time(10)).unwrap();
        k.advance();
        assert!(matches!(
            k.register_callback(SimCallback::Time(u64::MAX)),
            Err(TbError::TimeOverflow(_))
        ));
    }
}
