use std::collections::VecDeque;
use std::fmt::Debug;

use crate::prelude::*;

/// In-order comparison of expected and received items.
pub struct Scoreboard<T: PartialEq>(TbObj<ScoreboardInner<T>>);

impl<T: PartialEq> Clone for Scoreboard<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static + PartialEq + Debug> Scoreboard<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(ScoreboardInner {
            exp_q: VecDeque::new(),
            recv_q: VecDeque::new(),
            errors: 0,
            expected: 0,
            received: 0,
            matched: 0,
        }))
    }
    pub fn add_exp(&self, data: T) {
        self.0.with_mut(|s| {
            s.exp_q.push_back(data);
            s.expected += 1;
        });
        self.compare();
    }
    pub fn add_recv(&self, data: T) {
        self.0.with_mut(|s| {
            s.recv_q.push_back(data);
            s.received += 1;
        });
        self.compare();
    }
    fn compare(&self) {
        self.0.with_mut(|s| {
            while let (Some(exp), Some(recv)) = (s.exp_q.front(), s.recv_q.front()) {
                if exp == recv {
                    s.matched += 1;
                } else {
                    log::error!("Scoreboard mismatch: expected {:?}, received {:?}", exp, recv);
                    s.errors += 1;
                }
                s.exp_q.pop_front();
                s.recv_q.pop_front();
            }
        });
    }
    pub fn result(&self) -> TbResult {
        match self.passed() {
            true => Ok(Val::String(self.result_str())),
            false => Err(TbError::Failed(self.result_str())),
        }
    }
    pub fn passed(&self) -> bool {
        let inner = self.0.get();
        inner.expected > 0
            && inner.received == inner.expected
            && inner.matched == inner.received
            && inner.errors == 0
            && inner.exp_q.is_empty()
            && inner.recv_q.is_empty()
    }
    pub fn result_str(&self) -> String {
        let inner = self.0.get();
        format!(
            "expected={}, received={}, matched={}, errors={}, expQ: {}, recvQ: {}",
            inner.expected,
            inner.received,
            inner.matched,
            inner.errors,
            inner.exp_q.len(),
            inner.recv_q.len()
        )
    }
}

struct ScoreboardInner<T>
where
    T: PartialEq,
{
    exp_q: VecDeque<T>,
    recv_q: VecDeque<T>,
    errors: u32,
    expected: u32,
    received: u32,
    matched: u32,
}

/*
 * CLOCK
 */
pub async fn clock(clk: SimObject, period: u64, unit: TimeUnit) -> TbResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        log::warn!(
            "Clock period {period}{unit} not dividable by 2. High time will be {high_t}{unit}; low time will be {low_t}{unit}."
        );
    }
    loop {
        clk.set(0)?;
        Trigger::timer(low_t, unit).await?;
        clk.set(1)?;
        Trigger::timer(high_t, unit).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_streams_pass() {
        let sb = Scoreboard::new();
        sb.add_exp(1u32);
        sb.add_exp(0);
        sb.add_recv(1);
        assert!(!sb.passed());
        sb.add_recv(0);
        assert!(sb.passed());
        assert!(sb.result().is_ok());
    }

    #[test]
    fn mismatch_fails() {
        let sb = Scoreboard::new();
        sb.add_recv(1u32);
        sb.add_exp(0);
        assert!(!sb.passed());
        assert!(sb.result_str().contains("errors=1"));
        assert!(matches!(sb.result(), Err(TbError::Failed(_))));
    }

    #[test]
    fn empty_scoreboard_fails() {
        let sb: Scoreboard<u32> = Scoreboard::new();
        assert!(!sb.passed());
    }
}
