use intmap::IntMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{
    signal::SimObject,
    sim_if::{self, SimCallback, SimEvent, TimeUnit},
    TbError, TbResult,
};

// IntMap specializes on u64 keys, no hashing needed.
thread_local! {
    // key is signal handle
    static EDGE_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    // key is absolute callback time
    static TIMER_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    static READ_ONLY: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
    static READ_WRITE: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

pub(crate) fn cancel_all_triggers() {
    let mut handles = Vec::new();
    for slot in [&READ_ONLY, &READ_WRITE] {
        slot.with(|s| {
            let mut s = s.borrow_mut();
            s.callbacks.clear();
            handles.extend(s.handle.take());
        });
    }
    for map in [&TIMER_MAP, &EDGE_MAP] {
        let mut drained = map.with(|m| std::mem::replace(&mut *m.borrow_mut(), IntMap::new()));
        for (_, cb) in drained.drain() {
            handles.extend(cb.handle);
        }
    }
    for handle in handles {
        // the simulator may already have retired one-shot callbacks
        let _ = sim_if::with_sim(|s| s.cancel_callback(handle));
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    fired: Rc<Cell<bool>>,
    // If trigger is an edge, react needs to know if it waits for a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
}

impl TrigShared {
    fn fire(self) {
        self.fired.set(true);
        self.waker.wake();
    }
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64, TimeUnit),
    ReadWrite,
    ReadOnly,
}

/// Future resolving once the simulator reaches the awaited event.
#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    fired: Option<Rc<Cell<bool>>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: TimeUnit) -> Self {
        Trigger::new(TrigKind::Timer(time, unit))
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }

    fn register(&self, shared: TrigShared) -> TbResult<()> {
        match self.kind {
            TrigKind::ReadWrite => register_phase(&READ_WRITE, shared, SimCallback::ReadWrite),
            TrigKind::ReadOnly => register_phase(&READ_ONLY, shared, SimCallback::ReadOnly),
            TrigKind::Timer(t, unit) => {
                let steps = sim_if::with_sim(|s| s.get_sim_steps(t, unit))??;
                register_timer(steps, shared)
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                let shared = TrigShared { edge_kind, ..shared };
                let registered = EDGE_MAP.with(|m| match m.borrow_mut().get_mut(sig_hdl as u64) {
                    Some(callbacks) => {
                        callbacks.callbacks.push_back(shared.clone());
                        true
                    }
                    None => false,
                });
                if !registered {
                    let handle =
                        sim_if::with_sim(|s| s.register_callback(SimCallback::Edge(sig_hdl)))??;
                    let callback = CallbackHandles {
                        handle: Some(handle),
                        callbacks: VecDeque::from([shared]),
                    };
                    EDGE_MAP.with(|m| {
                        m.borrow_mut().insert(sig_hdl as u64, callback);
                    });
                }
                Ok(())
            }
        }
    }
}

fn register_phase(
    slot: &'static std::thread::LocalKey<RefCell<CallbackHandles>>,
    shared: TrigShared,
    cb: SimCallback,
) -> TbResult<()> {
    let needs_cb = slot.with(|s| {
        let mut s = s.borrow_mut();
        s.callbacks.push_back(shared);
        s.handle.is_none()
    });
    if needs_cb {
        let cb_hdl = sim_if::with_sim(|s| s.register_callback(cb))??;
        slot.with(|s| s.borrow_mut().handle.replace(cb_hdl));
    }
    Ok(())
}

fn register_timer(steps: u64, shared: TrigShared) -> TbResult<()> {
    // Key on absolute time, the simulator reports absolute time back
    let abs_time = sim_if::with_sim(|s| s.get_sim_time_steps())?
        .checked_add(steps)
        .ok_or_else(|| TbError::TimeOverflow(format!("{} steps from now", steps)))?;
    let registered = TIMER_MAP.with(|m| match m.borrow_mut().get_mut(abs_time) {
        Some(callbacks) => {
            callbacks.callbacks.push_back(shared.clone());
            true
        }
        None => false,
    });
    if !registered {
        let handle = sim_if::with_sim(|s| s.register_callback(SimCallback::Time(steps)))??;
        let callback = CallbackHandles {
            handle: Some(handle),
            callbacks: VecDeque::from([shared]),
        };
        TIMER_MAP.with(|m| {
            m.borrow_mut().insert(abs_time, callback);
        });
    }
    Ok(())
}

impl Future for Trigger {
    type Output = TbResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Only the simulator callback sets `fired`, spurious polls stay pending.
        if let Some(fired) = &self.fired {
            return match fired.get() {
                true => Poll::Ready(Ok(())),
                false => Poll::Pending,
            };
        }
        let fired = Rc::new(Cell::new(false));
        let shared = TrigShared {
            waker: cx.waker().clone(),
            fired: fired.clone(),
            edge_kind: EdgeKind::Any,
        };
        self.fired = Some(fired);
        match self.register(shared) {
            Ok(()) => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

/// Wakes every trigger waiting on `event` and runs the woken tasks.
#[inline]
pub fn react((cb, edge): SimEvent) {
    let mut vec_wake: VecDeque<TrigShared> = VecDeque::new();

    match cb {
        SimCallback::ReadWrite => READ_WRITE.with(|s| {
            let mut s = s.borrow_mut();
            // the callback is done, a new one is needed for the next awaiter
            s.handle = None;
            vec_wake = std::mem::take(&mut s.callbacks);
        }),
        SimCallback::ReadOnly => READ_ONLY.with(|s| {
            let mut s = s.borrow_mut();
            s.handle = None;
            vec_wake = std::mem::take(&mut s.callbacks);
        }),
        SimCallback::Time(t) => {
            if let Some(callbacks) = TIMER_MAP.with(|m| m.borrow_mut().remove(t)) {
                vec_wake = callbacks.callbacks;
            } else {
                log::warn!("Did not expect Timer callback: t={}", t);
            }
        }
        SimCallback::Edge(sig_hdl) => {
            let callbacks = EDGE_MAP.with(|m| m.borrow_mut().remove(sig_hdl as u64));
            if let Some(mut callbacks) = callbacks {
                let edge = edge.unwrap_or(EdgeKind::Any);
                let mut vec_resched: VecDeque<TrigShared> = VecDeque::new();
                for trig in callbacks.callbacks.drain(..) {
                    if edge == EdgeKind::Any || trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge {
                        vec_wake.push_back(trig);
                    } else {
                        vec_resched.push_back(trig);
                    }
                }
                if vec_resched.is_empty() {
                    // if no callbacks are remaining, cancel
                    if let Some(handle) = callbacks.handle {
                        let _ = sim_if::with_sim(|s| s.cancel_callback(handle));
                    }
                } else {
                    // put rescheduled callbacks back into EDGE_MAP
                    callbacks.callbacks = vec_resched;
                    EDGE_MAP.with(|m| {
                        m.borrow_mut().insert(sig_hdl as u64, callbacks);
                    });
                }
            } else {
                log::warn!("Did not expect Edge callback: sig_hdl={}", sig_hdl);
            }
        }
    }

    if !vec_wake.is_empty() {
        for shared in vec_wake {
            shared.fire();
        }
        // execute woken tasks
        executor::run_once();
    }
}
