//! TaskRegistry - in-flight な taskId と Waiter の対応表
//!
//! # 設計原則
//! - process 内で唯一の共有可変構造
//! - すべての操作（register / resolve / expire / remove）は 1 回の lock で完結する
//! - lock を握ったまま await しない（`std::sync::Mutex` で十分）
//! - 完了スロットは `oneshot`：slot を map から取り出した側だけが送信できるので、
//!   resolve と expire のどちらか一方だけが勝つ
//!
//! # deadline 管理
//! - `BinaryHeap<Reverse<(Instant, TaskId)>>` の min-heap で次の deadline を引く
//! - resolve 済みの entry は heap に残る（lazy deletion）。heap が疎になったら作り直す
//! - 新しい最早 deadline が入ったら `Notify` で Sweeper を起こす
//! - Sweeper が止まっていても `Waiter::wait` は自分の deadline で expire する
//!
//! # close
//! `close_all()` 以降の register は `RegistryError::Closed` で失敗します（shutdown 後に
//! 残った Gateway の clone が、誰も完了させない Waiter を作らないように）。

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;
use tracing::trace;

use crate::app::status::RegistryCounts;
use crate::domain::{Completion, RegistryError, TaskId, TaskOutcome};

/// heap がこのサイズを超え、かつ pending の 2 倍より大きいときに作り直す
const COMPACT_THRESHOLD: usize = 64;

struct Slot {
    tx: oneshot::Sender<Completion>,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    waiters: HashMap<TaskId, Slot>,
    deadlines: BinaryHeap<Reverse<(Instant, TaskId)>>,
    fulfilled: u64,
    timed_out: u64,
    dropped: u64,
    cancelled: u64,
    closed: bool,
}

impl Inner {
    fn take(&mut self, task_id: &TaskId) -> Option<Slot> {
        let slot = self.waiters.remove(task_id)?;
        if self.deadlines.len() > COMPACT_THRESHOLD
            && self.deadlines.len() > 2 * self.waiters.len()
        {
            self.compact();
        }
        Some(slot)
    }

    fn compact(&mut self) {
        self.deadlines = self
            .waiters
            .iter()
            .map(|(id, slot)| Reverse((slot.deadline, *id)))
            .collect();
    }

    /// Drop heap entries whose waiter is already gone.
    fn prune_head(&mut self) {
        while let Some(Reverse((deadline, id))) = self.deadlines.peek() {
            match self.waiters.get(id) {
                Some(slot) if slot.deadline == *deadline => break,
                _ => {
                    self.deadlines.pop();
                }
            }
        }
    }
}

/// Process-local table of in-flight correlation ids.
pub struct TaskRegistry {
    inner: Mutex<Inner>,
    default_timeout: Duration,
    deadline_changed: Notify,
}

impl TaskRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_timeout,
            deadline_changed: Notify::new(),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // 各操作は lock 内で状態を壊さないので、poison されても中身はそのまま使える
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter whose deadline is `now + default_timeout`.
    pub fn register(self: &Arc<Self>, task_id: TaskId) -> Result<Waiter, RegistryError> {
        self.register_until(task_id, Instant::now() + self.default_timeout)
    }

    /// Register a waiter with an explicit deadline.
    pub fn register_until(
        self: &Arc<Self>,
        task_id: TaskId,
        deadline: Instant,
    ) -> Result<Waiter, RegistryError> {
        let (tx, rx) = oneshot::channel();
        let earliest = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(RegistryError::Closed);
            }
            if inner.waiters.contains_key(&task_id) {
                return Err(RegistryError::DuplicateTask(task_id));
            }
            inner.waiters.insert(task_id, Slot { tx, deadline });
            inner.deadlines.push(Reverse((deadline, task_id)));
            inner.prune_head();
            matches!(inner.deadlines.peek(), Some(Reverse((_, id))) if *id == task_id)
        };

        if earliest {
            self.deadline_changed.notify_one();
        }

        Ok(Waiter {
            task_id,
            deadline,
            rx,
            registry: Arc::clone(self),
        })
    }

    /// Fulfil the waiter for `task_id`.
    ///
    /// Returns `false` (no-op) if the id is unknown or already resolved/expired.
    pub fn resolve(&self, task_id: TaskId, outcome: TaskOutcome) -> bool {
        let mut inner = self.lock();
        match inner.take(&task_id) {
            Some(slot) => {
                inner.fulfilled += 1;
                // receiver が drop 済みでも、遷移自体は成立している
                let _ = slot.tx.send(Completion::Resolved(outcome));
                true
            }
            None => {
                inner.dropped += 1;
                false
            }
        }
    }

    /// Time out the waiter for `task_id` if it is still pending.
    pub fn expire(&self, task_id: TaskId) -> bool {
        let mut inner = self.lock();
        match inner.take(&task_id) {
            Some(slot) => {
                inner.timed_out += 1;
                let _ = slot.tx.send(Completion::Expired);
                true
            }
            None => false,
        }
    }

    /// Unconditional cleanup. The waiter (if any) observes a closed slot.
    pub fn remove(&self, task_id: TaskId) -> bool {
        let mut inner = self.lock();
        match inner.take(&task_id) {
            Some(_slot) => {
                inner.cancelled += 1;
                true
            }
            None => false,
        }
    }

    /// Expire every waiter whose deadline is at or before `now`.
    pub fn expire_due(&self, now: Instant) -> Vec<TaskId> {
        let mut expired = Vec::new();
        let mut inner = self.lock();
        loop {
            inner.prune_head();
            match inner.deadlines.peek() {
                Some(Reverse((deadline, _))) if *deadline <= now => {}
                _ => break,
            }
            let Some(Reverse((_, task_id))) = inner.deadlines.pop() else {
                break;
            };
            if let Some(slot) = inner.take(&task_id) {
                inner.timed_out += 1;
                let _ = slot.tx.send(Completion::Expired);
                expired.push(task_id);
            }
        }
        expired
    }

    /// Earliest deadline among pending waiters.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut inner = self.lock();
        inner.prune_head();
        inner.deadlines.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Drop every pending waiter and refuse further registrations (service shutdown).
    pub fn close_all(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        let n = inner.waiters.len();
        inner.waiters.clear();
        inner.deadlines.clear();
        inner.cancelled += n as u64;
        n
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.lock().waiters.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> RegistryCounts {
        let inner = self.lock();
        RegistryCounts {
            pending: inner.waiters.len(),
            fulfilled: inner.fulfilled,
            timed_out: inner.timed_out,
            dropped: inner.dropped,
            cancelled: inner.cancelled,
        }
    }

    /// Signalled when a registration introduces a new earliest deadline.
    pub(crate) fn deadline_changed(&self) -> &Notify {
        &self.deadline_changed
    }

    #[cfg(test)]
    fn heap_len(&self) -> usize {
        self.lock().deadlines.len()
    }
}

/// Handle a submission waits on.
///
/// Dropping it before completion removes the entry from the registry, so an
/// abandoned submission never leaves a stale waiter behind.
pub struct Waiter {
    task_id: TaskId,
    deadline: Instant,
    rx: oneshot::Receiver<Completion>,
    registry: Arc<TaskRegistry>,
}

impl Waiter {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the single completion.
    ///
    /// `None` means the slot was removed without an outcome (cancel / shutdown).
    /// Never waits past the deadline, even when no sweeper is running.
    pub async fn wait(mut self) -> Option<Completion> {
        let completion = match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(res) => res.ok(),
            Err(_) => {
                // sweeper と競合しても slot を取れるのはどちらか一方。どちらでも rx はすぐ返る
                self.registry.expire(self.task_id);
                (&mut self.rx).await.ok()
            }
        };
        if let Some(c) = &completion {
            trace!(task_id = %self.task_id, state = ?c.state(), "waiter completed");
        }
        completion
    }

    /// Give up on this task.
    pub fn cancel(self) {
        // Drop が remove する
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.registry.remove(self.task_id);
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("task_id", &self.task_id)
            .field("deadline", &self.deadline)
            .finish()
    }
}
