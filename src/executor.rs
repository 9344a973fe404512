use futures::{
    future::{FutureExt, LocalBoxFuture},
    task::{waker, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use intmap::IntMap;
use queues::{IsQueue, Queue};
use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    sync::Arc,
};

use crate::{TbError, TbResult};

thread_local! {
    static READY_QUEUE: RefCell<Queue<u64>> = RefCell::new(Queue::new());
    static TASKS: RefCell<IntMap<Task>> = RefCell::new(IntMap::new());
    static NEXT_ID: Cell<u64> = Cell::new(0);
}

pub fn schedule_task(id: u64) {
    READY_QUEUE.with(|q| {
        // add() only fails for bounded queues
        let _ = q.borrow_mut().add(id);
    });
}

fn next_task() -> Option<u64> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

/// Polls ready tasks until none is left.
#[inline]
pub fn run_once() {
    while let Some(id) = next_task() {
        process_task(id);
    }
}

#[inline]
fn process_task(id: u64) {
    // The future is taken out of its slot while it is polled, so it may spawn, wake
    // or cancel tasks, itself included.
    let fut = TASKS.with(|tasks| {
        tasks
            .borrow_mut()
            .get_mut(id)
            .and_then(|task| task.future.take())
    });
    let Some(mut fut) = fut else {
        // cancelled, finished, or woken twice
        return;
    };

    let waker = waker(Arc::new(TaskWaker { id }));
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            let cancelled = TASKS.with(|tasks| match tasks.borrow_mut().get_mut(id) {
                Some(task) => {
                    task.future = Some(fut);
                    None
                }
                None => Some(fut),
            });
            drop(cancelled);
        }
        Poll::Ready(result) => {
            let task = TASKS.with(|tasks| tasks.borrow_mut().remove(id));
            if let Some(mut task) = task {
                log::trace!("Task '{}' complete", task.name);
                if let Some(tx) = task.join_tx.take() {
                    let _ = tx.send(result);
                }
            }
        }
    }
}

/// Cancels a task. Its future is dropped without being polled again and its
/// JoinHandle resolves to `TbError::Cancelled`.
pub fn cancel(id: u64) {
    let task = TASKS.with(|tasks| tasks.borrow_mut().remove(id));
    if let Some(task) = task {
        log::trace!("Task '{}' cancelled", task.name);
    }
}

/// Drops every task and empties the ready queue.
pub(crate) fn clear_all() {
    let tasks = TASKS.with(|tasks| std::mem::replace(&mut *tasks.borrow_mut(), IntMap::new()));
    drop(tasks);
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
}

pub fn task_count() -> usize {
    TASKS.with(|tasks| tasks.borrow().len())
}

struct TaskWaker {
    id: u64,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        // wakers only fire on the simulation thread
        schedule_task(arc_self.id);
    }
}

pub struct Task {
    future: Option<LocalBoxFuture<'static, TbResult>>,
    name: String,
    join_tx: Option<oneshot::Sender<TbResult>>,
}

impl Task {
    pub fn fork(future: impl Future<Output = TbResult> + 'static) -> JoinHandle {
        Task::spawn(future, "forked")
    }

    pub fn spawn(future: impl Future<Output = TbResult> + 'static, name: &str) -> JoinHandle {
        let id = NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            id
        });
        let (tx, rx) = oneshot::channel::<TbResult>();
        let task = Task {
            future: Some(future.boxed_local()),
            name: name.to_string(),
            join_tx: Some(tx),
        };
        TASKS.with(|tasks| {
            tasks.borrow_mut().insert(id, task);
        });
        schedule_task(id);
        JoinHandle { id, join_rx: rx }
    }
}

pub struct JoinHandle {
    id: u64,
    join_rx: oneshot::Receiver<TbResult>,
}

impl JoinHandle {
    pub fn cancel(self) {
        cancel(self.id);
    }

    /// Result of the task if it has already finished.
    pub fn try_join(&mut self) -> Option<TbResult> {
        match self.join_rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(TbError::Cancelled)),
        }
    }
}

impl Future for JoinHandle {
    type Output = TbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(TbError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Val;
    use crate::TbObj;

    #[test]
    fn spawned_task_runs_and_joins() {
        let mut handle = Task::spawn(async { Ok(Val::Int(3)) }, "three");
        assert!(handle.try_join().is_none());
        run_once();
        assert_eq!(handle.try_join().unwrap().unwrap(), Val::Int(3));
        assert_eq!(task_count(), 0);
    }

    #[test]
    fn awaiting_a_forked_task() {
        let log = TbObj::new(Vec::new());
        let inner_log = log.clone();
        let mut outer = Task::spawn(
            async move {
                let child_log = inner_log.clone();
                let child = Task::fork(async move {
                    child_log.with_mut(|l| l.push("child"));
                    Ok(Val::Int(7))
                });
                let v = child.await?;
                inner_log.with_mut(|l| l.push("parent"));
                Ok(v)
            },
            "outer",
        );
        run_once();
        assert_eq!(outer.try_join().unwrap().unwrap(), Val::Int(7));
        assert_eq!(*log.get(), vec!["child", "parent"]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let ran = TbObj::new(false);
        let flag = ran.clone();
        let mut handle = Task::spawn(
            async move {
                *flag.get_mut() = true;
                Ok(Val::None)
            },
            "cancelled",
        );
        cancel(handle.id);
        run_once();
        assert!(!*ran.get());
        assert!(matches!(handle.try_join(), Some(Err(TbError::Cancelled))));
    }
}
