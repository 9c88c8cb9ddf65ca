//! Adapter turning a blocking user-input function into cancellable futures.

use opseq_engine::error::InputError;
use opseq_engine::observer::{InputFuture, UserInputReply, UserInputRequest};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Blocking backend that produces a reply for a request.
pub type InputFn = Box<dyn Fn(&UserInputRequest, u64) -> UserInputReply + Send + Sync>;
/// Interrupts the backend's handling of the request with the given id.
pub type InterruptFn = Box<dyn Fn(u64) + Send + Sync>;

struct AdapterState {
    queue: VecDeque<(u64, UserInputRequest)>,
    replies: HashMap<u64, UserInputReply>,
    current_id: u64,
    last_id: u64,
    halt: bool,
}

struct AdapterShared {
    state: Mutex<AdapterState>,
    queue_cv: Condvar,
    reply_cv: Condvar,
    interrupt: InterruptFn,
}

/// Serializes user-input requests onto one worker thread that calls a
/// blocking backend, and hands out cancellable futures for the replies.
///
/// Cancelling a request that is currently being serviced calls the
/// backend's interrupt function and discards the eventual reply; it never
/// joins the worker. Dropping the adapter interrupts any in-flight request
/// and joins the worker.
pub struct AsyncInputAdapter {
    shared: Arc<AdapterShared>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncInputAdapter {
    /// Launch the worker over the given backend functions.
    pub fn new(input: InputFn, interrupt: InterruptFn) -> Self {
        let shared = Arc::new(AdapterShared {
            state: Mutex::new(AdapterState {
                queue: VecDeque::new(),
                replies: HashMap::new(),
                current_id: 0,
                last_id: 0,
                halt: false,
            }),
            queue_cv: Condvar::new(),
            reply_cv: Condvar::new(),
            interrupt,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::spawn(move || handle_request_queue(&worker_shared, input));
        AsyncInputAdapter {
            shared,
            worker: Some(worker),
        }
    }

    /// Enqueue a request and return a future for its reply.
    pub fn submit(&self, request: UserInputRequest) -> AdapterFuture {
        let id = {
            let mut state = self.shared.state.lock();
            // Ids start at 1; 0 is reserved for "invalid".
            state.last_id += 1;
            let id = state.last_id;
            state.queue.push_back((id, request));
            id
        };
        self.shared.queue_cv.notify_one();
        AdapterFuture {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }
}

impl Drop for AsyncInputAdapter {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.current_id != 0 {
                (self.shared.interrupt)(state.current_id);
            }
            state.halt = true;
        }
        self.shared.queue_cv.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn handle_request_queue(shared: &AdapterShared, input: InputFn) {
    loop {
        let (id, request) = {
            let mut state = shared.state.lock();
            loop {
                if state.halt {
                    return;
                }
                if let Some(entry) = state.queue.pop_front() {
                    state.current_id = entry.0;
                    break entry;
                }
                shared.queue_cv.wait(&mut state);
            }
        };
        // While another thread sees a non-zero current id, the worker is in
        // this call.
        let reply = input(&request, id);
        let mut state = shared.state.lock();
        // A reset current id means the request was cancelled meanwhile and
        // the reply is no longer wanted.
        if state.current_id == id {
            state.replies.insert(id, reply);
            shared.reply_cv.notify_all();
        }
        state.current_id = 0;
    }
}

/// Future handle to one queued request.
///
/// Becomes invalid once the reply is consumed; dropping a still-valid
/// future cancels the underlying request.
pub struct AdapterFuture {
    shared: Weak<AdapterShared>,
    id: u64,
}

impl AdapterFuture {
    /// The request id; 0 is never handed out.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn cancel(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.state.lock();
        if let Some(position) = state.queue.iter().position(|(id, _)| *id == self.id) {
            // Still queued: removal is all that is needed.
            state.queue.remove(position);
            return;
        }
        if state.replies.remove(&self.id).is_some() {
            // Already replied: drop the reply.
            return;
        }
        if state.current_id == self.id {
            // Being serviced: interrupt and make the worker discard the
            // reply. The worker is not joined.
            (shared.interrupt)(self.id);
            state.current_id = 0;
        }
    }
}

impl InputFuture for AdapterFuture {
    fn is_valid(&self) -> bool {
        self.id != 0
    }

    fn is_ready(&self) -> bool {
        if self.id == 0 {
            return false;
        }
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let ready = shared.state.lock().replies.contains_key(&self.id);
        ready
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        if self.id == 0 {
            return false;
        }
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let deadline = Instant::now() + timeout;
        let mut state = shared.state.lock();
        loop {
            if state.replies.contains_key(&self.id) {
                return true;
            }
            if shared.reply_cv.wait_until(&mut state, deadline).timed_out() {
                return state.replies.contains_key(&self.id);
            }
        }
    }

    fn take(&mut self) -> Result<UserInputReply, InputError> {
        if self.id == 0 {
            return Err(InputError::Consumed);
        }
        let Some(shared) = self.shared.upgrade() else {
            return Err(InputError::Invalid);
        };
        let mut state = shared.state.lock();
        match state.replies.remove(&self.id) {
            Some(reply) => {
                self.id = 0;
                Ok(reply)
            }
            None => Err(InputError::NotReady),
        }
    }
}

impl Drop for AdapterFuture {
    fn drop(&mut self) {
        if self.id != 0 {
            self.cancel();
        }
    }
}
