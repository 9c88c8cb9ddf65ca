//! Priority-aware command queue between the public API and the job loop.

use super::JobCommand;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// FIFO of job commands with a priority lane.
///
/// `push_priority` jumps the queue but never overtakes an already-pending
/// `Terminate`.
pub struct CommandQueue {
    queue: Mutex<VecDeque<JobCommand>>,
    cv: Condvar,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        CommandQueue {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }

    /// Append a command.
    pub fn push(&self, command: JobCommand) {
        self.queue.lock().push_back(command);
        self.cv.notify_one();
    }

    /// Insert a command at the front, behind any pending `Terminate`.
    pub fn push_priority(&self, command: JobCommand) {
        let mut queue = self.queue.lock();
        let position = queue
            .iter()
            .rposition(|c| *c == JobCommand::Terminate)
            .map(|i| i + 1)
            .unwrap_or(0);
        queue.insert(position, command);
        drop(queue);
        self.cv.notify_one();
    }

    /// Pop the next command without blocking.
    pub fn try_pop(&self) -> Option<JobCommand> {
        self.queue.lock().pop_front()
    }

    /// Block until a command is available and pop it.
    pub fn wait_pop(&self) -> JobCommand {
        let mut queue = self.queue.lock();
        loop {
            if let Some(command) = queue.pop_front() {
                return command;
            }
            self.cv.wait(&mut queue);
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
