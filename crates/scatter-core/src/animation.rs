//! Cooperative per-frame scheduling for self-rescheduling work such as the
//! orbit animation.
//!
//! A [`RepeatingTask`] is armed for at most one upcoming frame at a time. The
//! host drains due tasks once per animation frame; each task that still wants
//! to run re-arms itself. Dropping the handle disarms it immediately, so a
//! cancelled task never receives another tick.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

pub type TaskId = u64;

#[derive(Debug, Default)]
struct FrameQueue {
    next_id: TaskId,
    armed: BTreeSet<TaskId>,
}

/// Owner of the frame queue; lives inside the scatter plot core.
#[derive(Debug, Default)]
pub struct FrameLoop {
    queue: Rc<RefCell<FrameQueue>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a task armed for the next frame.
    pub fn schedule_repeating(&self) -> RepeatingTask {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.armed.insert(id);
        RepeatingTask {
            id,
            queue: Rc::downgrade(&self.queue),
        }
    }

    /// Takes every armed task for this frame, disarming them.
    pub fn take_due(&self) -> Vec<TaskId> {
        let mut queue = self.queue.borrow_mut();
        std::mem::take(&mut queue.armed).into_iter().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().armed.is_empty()
    }
}

/// Cancellable handle to a self-rescheduling frame task.
#[derive(Debug)]
pub struct RepeatingTask {
    id: TaskId,
    queue: Weak<RefCell<FrameQueue>>,
}

impl RepeatingTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Arms the task for the following frame.
    pub fn reschedule(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.borrow_mut().armed.insert(self.id);
        }
    }

    /// Explicit form of dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.borrow_mut().armed.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_runs_once_per_arm() {
        let frames = FrameLoop::new();
        let task = frames.schedule_repeating();
        assert_eq!(frames.take_due(), vec![task.id()]);
        assert!(frames.take_due().is_empty());
        task.reschedule();
        assert_eq!(frames.take_due(), vec![task.id()]);
    }

    #[test]
    fn dropping_handle_prevents_the_pending_tick() {
        let frames = FrameLoop::new();
        let task = frames.schedule_repeating();
        assert!(frames.has_pending());
        task.cancel();
        assert!(!frames.has_pending());
        assert!(frames.take_due().is_empty());
    }

    #[test]
    fn cancel_after_drain_stops_rescheduling() {
        let frames = FrameLoop::new();
        let task = frames.schedule_repeating();
        let due = frames.take_due();
        assert_eq!(due.len(), 1);
        drop(task);
        assert!(frames.take_due().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let frames = FrameLoop::new();
        let a = frames.schedule_repeating();
        let b = frames.schedule_repeating();
        assert_ne!(a.id(), b.id());
        let mut due = frames.take_due();
        due.sort();
        assert_eq!(due, vec![a.id(), b.id()]);
    }
}
