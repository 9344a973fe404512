//! Behavioral model of the OR block behind the register bus.
//!
//! Two input FIFOs `a` and `b` are written over the write bus (addresses 4 and 5).
//! Whenever both hold data and the output FIFO `y` has room, `a | b` moves into `y`.
//! The read bus returns FIFO status flags and pops `y`.

use queues::{Buffer, IsQueue};

use crate::kernel::{HdlModel, Port};

pub const CLK: usize = 0;
pub const RST_N: usize = 1;
pub const WRITE_ADDRESS: usize = 2;
pub const WRITE_DATA: usize = 3;
pub const WRITE_EN: usize = 4;
pub const WRITE_RDY: usize = 5;
pub const READ_ADDRESS: usize = 6;
pub const READ_EN: usize = 7;
pub const READ_RDY: usize = 8;
pub const READ_DATA: usize = 9;

const PORTS: [Port; 10] = [
    Port::input("CLK", 1),
    Port::input("RST_N", 1),
    Port::input("write_address", 3),
    Port::input("write_data", 1),
    Port::input("write_en", 1),
    Port::output("write_rdy", 1),
    Port::input("read_address", 3),
    Port::input("read_en", 1),
    Port::output("read_rdy", 1),
    Port::output("read_data", 1),
];

/// Register map of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegAddr {
    AStatus = 0,
    BStatus = 1,
    YStatus = 2,
    YOutput = 3,
    AData = 4,
    BData = 5,
}

impl TryFrom<u32> for RegAddr {
    type Error = u32;

    fn try_from(addr: u32) -> Result<Self, Self::Error> {
        match addr {
            0 => Ok(RegAddr::AStatus),
            1 => Ok(RegAddr::BStatus),
            2 => Ok(RegAddr::YStatus),
            3 => Ok(RegAddr::YOutput),
            4 => Ok(RegAddr::AData),
            5 => Ok(RegAddr::BData),
            _ => Err(addr),
        }
    }
}

pub struct OrFifoDut {
    name: String,
    a: Buffer<u64>,
    b: Buffer<u64>,
    y: Buffer<u64>,
    read_data: u64,
}

impl OrFifoDut {
    pub const A_DEPTH: usize = 2;
    pub const B_DEPTH: usize = 2;
    pub const Y_DEPTH: usize = 1;

    pub fn new(name: &str) -> Self {
        OrFifoDut {
            name: name.to_string(),
            a: Buffer::new(Self::A_DEPTH),
            b: Buffer::new(Self::B_DEPTH),
            y: Buffer::new(Self::Y_DEPTH),
            read_data: 0,
        }
    }

    fn reset(&mut self) {
        self.a = Buffer::new(Self::A_DEPTH);
        self.b = Buffer::new(Self::B_DEPTH);
        self.y = Buffer::new(Self::Y_DEPTH);
        self.read_data = 0;
    }

    fn read(&mut self, addr: u64) -> u64 {
        let reg = match RegAddr::try_from(addr as u32) {
            Ok(reg) => reg,
            Err(_) => return 0,
        };
        match reg {
            RegAddr::AStatus => not_full(&self.a),
            RegAddr::BStatus => not_full(&self.b),
            RegAddr::YStatus => u64::from(self.y.size() > 0),
            RegAddr::YOutput => self.y.remove().unwrap_or(0),
            RegAddr::AData | RegAddr::BData => 0,
        }
    }

    fn write(&mut self, addr: u64, data: u64) {
        let fifo = match RegAddr::try_from(addr as u32) {
            Ok(RegAddr::AData) => &mut self.a,
            Ok(RegAddr::BData) => &mut self.b,
            _ => return,
        };
        if fifo.add(data).is_err() {
            log::debug!("write of {} to full FIFO at address {} dropped", data, addr);
        }
    }
}

fn not_full(fifo: &Buffer<u64>) -> u64 {
    u64::from(fifo.size() < fifo.capacity())
}

impl HdlModel for OrFifoDut {
    fn top_name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[Port] {
        &PORTS
    }

    fn clock_port(&self) -> usize {
        CLK
    }

    fn on_rising_edge(&mut self, sampled: &[u64]) {
        if sampled[RST_N] == 0 {
            self.reset();
            return;
        }
        if self.a.size() > 0 && self.b.size() > 0 && self.y.size() < self.y.capacity() {
            if let (Ok(a), Ok(b)) = (self.a.remove(), self.b.remove()) {
                // room was checked above
                let _ = self.y.add(a | b);
            }
        }
        if sampled[READ_EN] == 1 {
            self.read_data = self.read(sampled[READ_ADDRESS]);
        }
        if sampled[WRITE_EN] == 1 {
            self.write(sampled[WRITE_ADDRESS], sampled[WRITE_DATA]);
        }
    }

    fn eval(&self, io: &mut [u64]) {
        // the bus is ready whenever the block is out of reset
        io[WRITE_RDY] = io[RST_N];
        io[READ_RDY] = io[RST_N];
        io[READ_DATA] = self.read_data;
    }
}
