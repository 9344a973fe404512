use crate::sim_if::with_sim;
use crate::trigger::Trigger;
use crate::{TbError, TbResult};

/// Copyable handle to an object (port, net or scope) of the simulated design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Int(u32),
    Hier,
    Other,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> TbResult<String> {
        with_sim(|s| s.get_full_name(self.handle))?
    }

    pub fn size(&self) -> Option<u32> {
        match self.kind {
            ObjectKind::Int(size) => Some(size),
            _ => None,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.kind, ObjectKind::Int(_))
    }

    pub fn get_child(&self, name: &str) -> TbResult<Self> {
        let mut child_name = self.name()?;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    pub fn from_name(full_name: &str) -> TbResult<Self> {
        let handle = with_sim(|s| s.get_handle_by_name(full_name))??;
        SimObject::from_handle(handle)
    }

    pub fn from_handle(handle: usize) -> TbResult<Self> {
        let kind = with_sim(|s| s.get_kind(handle))?;
        Ok(SimObject { handle, kind })
    }

    pub fn get_root() -> TbResult<Self> {
        let handle = with_sim(|s| s.get_root_handle())??;
        SimObject::from_handle(handle)
    }

    /// Child lookup for testbench code. Panics if the child doesn't exist.
    pub fn c(&self, name: &str) -> Self {
        self.get_child(name)
            .unwrap_or_else(|e| panic!("{}: {}", name, e))
    }

    pub fn value(&self) -> TbResult<u64> {
        if !self.has_value() {
            return Err(TbError::NoValue(self.name()?));
        }
        with_sim(|s| s.get_value(self.handle))?
    }

    pub fn u32(&self) -> TbResult<u32> {
        Ok(self.value()? as u32)
    }

    pub fn set(&self, val: u64) -> TbResult<()> {
        if !self.has_value() {
            return Err(TbError::NoValue(self.name()?));
        }
        with_sim(|s| s.set_value(self.handle, val))?
    }

    pub fn set_u32(&self, val: u32) -> TbResult<()> {
        self.set(u64::from(val))
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

impl std::fmt::Display for SimObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Ok(name) => f.write_str(&name),
            Err(_) => write!(f, "<handle {}>", self.handle),
        }
    }
}
