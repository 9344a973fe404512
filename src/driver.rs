//! Bus drivers turning `{address, value}` transactions into clocked signal writes.

use futures::future::LocalBoxFuture;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub addr: u32,
    pub val: u32,
}

impl Transaction {
    pub fn new(addr: u32, val: u32) -> Self {
        Transaction { addr, val }
    }
}

pub trait BusDriver {
    fn name(&self) -> &str;
    /// Drives one transaction. The future completes on the clock edge that
    /// samples it.
    fn send(&self, txn: Transaction) -> LocalBoxFuture<'static, TbResult<()>>;
}

/// Write side of the bus: `write_address`, `write_data`, `write_en`, `write_rdy`.
#[derive(Debug, Clone)]
pub struct WriteDriver {
    name: String,
    clk: SimObject,
    address: SimObject,
    data: SimObject,
    en: SimObject,
    rdy: SimObject,
}

impl WriteDriver {
    pub fn new(name: &str, entity: SimObject) -> TbResult<Self> {
        Ok(WriteDriver {
            name: name.to_string(),
            clk: entity.get_child("CLK")?,
            address: entity.get_child("write_address")?,
            data: entity.get_child("write_data")?,
            en: entity.get_child("write_en")?,
            rdy: entity.get_child("write_rdy")?,
        })
    }
}

impl BusDriver for WriteDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, txn: Transaction) -> LocalBoxFuture<'static, TbResult<()>> {
        let d = self.clone();
        async move {
            d.clk.rising_edge().await?;
            if d.rdy.u32()? != 1 {
                log::debug!("{}: waiting for write_rdy", d.name);
                d.rdy.rising_edge().await?;
            }
            d.en.set(1)?;
            d.address.set_u32(txn.addr)?;
            d.data.set_u32(txn.val)?;
            d.clk.rising_edge().await?;
            d.en.set(0)?;
            Ok(())
        }
        .boxed_local()
    }
}

/// Read side of the bus: `read_address`, `read_en`, `read_rdy`. The data comes back on
/// `read_data` once the transaction completes.
#[derive(Debug, Clone)]
pub struct ReadDriver {
    name: String,
    clk: SimObject,
    address: SimObject,
    en: SimObject,
    rdy: SimObject,
}

impl ReadDriver {
    pub fn new(name: &str, entity: SimObject) -> TbResult<Self> {
        Ok(ReadDriver {
            name: name.to_string(),
            clk: entity.get_child("CLK")?,
            address: entity.get_child("read_address")?,
            en: entity.get_child("read_en")?,
            rdy: entity.get_child("read_rdy")?,
        })
    }
}

impl BusDriver for ReadDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, txn: Transaction) -> LocalBoxFuture<'static, TbResult<()>> {
        let d = self.clone();
        async move {
            d.clk.rising_edge().await?;
            if d.rdy.u32()? != 1 {
                log::debug!("{}: waiting for read_rdy", d.name);
                d.rdy.rising_edge().await?;
            }
            d.en.set(1)?;
            d.address.set_u32(txn.addr)?;
            d.clk.rising_edge().await?;
            d.en.set(0)?;
            Ok(())
        }
        .boxed_local()
    }
}
