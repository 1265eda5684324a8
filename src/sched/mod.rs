//! The M:N scheduler: a bounded pool of OS threads sharing a bounded set
//! of virtual cores, running fibers to completion or suspension.
//!
//! Grounded on `examples/original_source/src/vm/runtime.cpp`: `VCore`s hold
//! local run queues; `OSThread`s wire to a `VCore`, run its queue's
//! fibers, steal from other `VCore`s when idle, and park on a condvar when
//! there's nothing to do anywhere. This port collapses the original's
//! separate active/idle linked lists into one `Mutex`-guarded `Vec` of
//! `VCore`s plus a parking condvar, since Rust's `thread`/`Condvar`
//! primitives already give the wake/park semantics the original hand-rolls.

pub mod queue;
pub mod vcore;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use rand::Rng;

use crate::eval::{eval_fiber, EvalOutcome};
use crate::fiber::{Fiber, FiberStatus};
use crate::function::{bind_call, BindOutcome, Body, Function};
use crate::object::future::Future;
use crate::object::Value;

use queue::FiberQueue;
use vcore::VCore;

/// How many scheduler ticks an OS thread runs before consulting the global
/// queue first for fairness, matching `kScheduleTickBeforeCheck` in the
/// original.
const SCHEDULE_TICK_BEFORE_CHECK: u64 = 61;

struct FiberTable {
    fibers: Mutex<std::collections::HashMap<u64, Fiber>>,
}

impl FiberTable {
    fn new() -> Self {
        FiberTable {
            fibers: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn insert(&self, fiber: Fiber) -> u64 {
        let id = fiber.id;
        self.fibers.lock().unwrap().insert(id, fiber);
        id
    }

    fn take(&self, id: u64) -> Option<Fiber> {
        self.fibers.lock().unwrap().remove(&id)
    }

    fn put_back(&self, fiber: Fiber) {
        self.fibers.lock().unwrap().insert(fiber.id, fiber);
    }
}

pub struct Scheduler {
    vcores: Vec<Arc<VCore>>,
    global_queue: FiberQueue,
    fibers: Arc<FiberTable>,
    should_stop: AtomicBool,
    park_lock: Mutex<usize>,
    park_condvar: Condvar,
    ost_total: AtomicUsize,
    max_ost: usize,
    spinning_count: AtomicUsize,
    fiber_region_size: usize,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(max_vc: usize, max_ost: usize, fiber_region_size: usize, queue_max_len: usize) -> Arc<Self> {
        let vcores = (0..max_vc.max(1))
            .map(|id| Arc::new(VCore::new(id, queue_max_len)))
            .collect();
        Arc::new(Scheduler {
            vcores,
            global_queue: FiberQueue::new(0),
            fibers: Arc::new(FiberTable::new()),
            should_stop: AtomicBool::new(false),
            park_lock: Mutex::new(0),
            park_condvar: Condvar::new(),
            ost_total: AtomicUsize::new(0),
            max_ost,
            spinning_count: AtomicUsize::new(0),
            fiber_region_size,
            threads: Mutex::new(Vec::new()),
        })
    }

    /// `Spawn(function, args, mode)`: enqueues a fresh fiber with its
    /// initial frame filled per the calling convention, onto the global
    /// queue, then wakes a worker (spawning a new OS thread if none are
    /// idle and the cap allows).
    pub fn spawn(self: &Arc<Self>, func: Arc<Function>, args: Vec<Value>) -> Arc<Future> {
        let (mut fiber, future) = Fiber::with_future(self.fiber_region_size);

        match bind_call(&func, args, None, None) {
            Ok(BindOutcome::Ready(locals)) => match &func.body {
                Body::Code(code) => {
                    let frame = crate::eval::dispatch::framed_call(&func, code.clone(), locals, fiber.id);
                    let floating = func.is_generator();
                    fiber.push_frame(frame, floating);
                }
                Body::Native(native) => match crate::function::call_native(native, &locals) {
                    Ok(v) => {
                        future.fulfill(Ok(v));
                        return future;
                    }
                    Err(e) => {
                        future.fulfill(Err(e));
                        return future;
                    }
                },
            },
            Ok(BindOutcome::Partial(partial)) => {
                future.fulfill(Ok(Value::Function(partial)));
                return future;
            }
            Err(e) => {
                future.fulfill(Err(e));
                return future;
            }
        }

        let id = self.fibers.insert(fiber);
        self.global_queue.enqueue(id);
        self.wake_one();
        future
    }

    /// Synchronous top-level `Eval`: spawns and blocks the calling thread
    /// on the future, matching `runtime.cpp`'s `Eval`/`FutureWait` pairing.
    pub fn eval_sync(self: &Arc<Self>, func: Arc<Function>, args: Vec<Value>) -> Result<Value, Value> {
        self.ensure_worker();
        let future = self.spawn(func, args);
        future.wait()
    }

    fn ensure_worker(self: &Arc<Self>) {
        if self.ost_total.load(Ordering::Acquire) == 0 {
            self.spawn_worker();
        }
    }

    fn wake_one(&self) {
        self.park_condvar.notify_one();
    }

    /// Starts `count` OS-thread workers, up to `max_ost`.
    pub fn run_workers(self: &Arc<Self>, count: usize) {
        for _ in 0..count.min(self.max_ost) {
            self.spawn_worker();
        }
    }

    fn spawn_worker(self: &Arc<Self>) {
        let total = self.ost_total.fetch_add(1, Ordering::AcqRel);
        if total >= self.max_ost {
            self.ost_total.fetch_sub(1, Ordering::AcqRel);
            return;
        }
        let scheduler = self.clone();
        let handle = thread::spawn(move || scheduler.worker_loop());
        self.threads.lock().unwrap().push(handle);
    }

    fn worker_loop(self: Arc<Self>) {
        let mut tick: u64 = 0;
        let mut preferred_vcore: Option<usize> = None;

        'outer: loop {
            if self.should_stop.load(Ordering::Acquire) {
                break;
            }

            let vc = match self.acquire_vcore(preferred_vcore) {
                Some(vc) => vc,
                None => {
                    self.park();
                    continue;
                }
            };
            preferred_vcore = Some(vc.id);

            let mut last: Option<u64> = None;
            loop {
                if self.should_stop.load(Ordering::Acquire) {
                    vc.unwire();
                    break 'outer;
                }

                tick += 1;
                let check_global_first = tick % SCHEDULE_TICK_BEFORE_CHECK == 0;

                let fiber_id = last.take().or_else(|| {
                    if check_global_first {
                        self.global_queue.dequeue().or_else(|| vc.queue.dequeue())
                    } else {
                        vc.queue.dequeue().or_else(|| self.global_queue.dequeue())
                    }
                });

                let fiber_id = match fiber_id.or_else(|| self.steal_for(&vc)) {
                    Some(id) => id,
                    None => {
                        vc.unwire();
                        break;
                    }
                };

                let mut fiber = match self.fibers.take(fiber_id) {
                    Some(f) => f,
                    None => continue,
                };
                fiber.status = FiberStatus::Running;

                match eval_fiber(&mut fiber) {
                    EvalOutcome::Suspended => {
                        last = Some(fiber.id);
                        self.fibers.put_back(fiber);
                    }
                    EvalOutcome::Returned(v) => {
                        let future = fiber.future.clone();
                        if let Some(future) = future {
                            future.fulfill(Ok(v));
                        }
                    }
                    EvalOutcome::Panicked(v) => {
                        let future = fiber.future.clone();
                        if let Some(future) = future {
                            future.fulfill(Err(v));
                        }
                    }
                }
            }
        }
    }

    fn acquire_vcore(&self, preferred: Option<usize>) -> Option<Arc<VCore>> {
        if let Some(id) = preferred {
            if let Some(vc) = self.vcores.get(id) {
                if vc.try_wire() {
                    return Some(vc.clone());
                }
            }
        }
        self.vcores.iter().find(|vc| vc.try_wire()).cloned()
    }

    /// Attempts to steal half of another, randomly chosen VCore's local
    /// queue onto `vc`'s own, bounded by a global spinning-thread cap so
    /// every idle worker doesn't hammer the same victim at once.
    fn steal_for(&self, vc: &Arc<VCore>) -> Option<u64> {
        if self.vcores.len() <= 1 {
            return None;
        }
        let busy = self.vcores.iter().filter(|v| v.is_wired()).count();
        if self.spinning_count.fetch_add(1, Ordering::AcqRel) + 1 > busy {
            self.spinning_count.fetch_sub(1, Ordering::AcqRel);
            return None;
        }

        let start = rand::thread_rng().gen_range(0..self.vcores.len());
        let mut result = None;
        for offset in 0..self.vcores.len() {
            let idx = (start + offset) % self.vcores.len();
            if idx == vc.id {
                continue;
            }
            let victim = &self.vcores[idx];
            let stolen = victim.queue.steal_half();
            if !stolen.is_empty() {
                let mut iter = stolen.into_iter();
                result = iter.next();
                for rest in iter {
                    vc.queue.enqueue(rest);
                }
                break;
            }
        }
        self.spinning_count.fetch_sub(1, Ordering::AcqRel);
        result
    }

    fn park(&self) {
        let guard = self.park_lock.lock().unwrap();
        let _ = self
            .park_condvar
            .wait_timeout(guard, std::time::Duration::from_millis(50));
    }

    /// Cooperative yield: caller re-enqueues its own fiber id onto the
    /// global queue and the evaluator returns control to the scheduler.
    /// (Called from native/builtin code invoked during evaluation; the
    /// evaluator itself only ever returns `Suspended` for in-band yields.)
    pub fn reschedule(&self, fiber_id: u64) {
        self.global_queue.enqueue(fiber_id);
        self.park_condvar.notify_one();
    }

    /// Sets `should_stop`, wakes every parked thread, and joins with a
    /// bounded retry (10 x 500ms), matching spec.md §6's `Shutdown`
    /// contract.
    pub fn shutdown(&self) -> bool {
        self.should_stop.store(true, Ordering::Release);
        for _ in 0..10 {
            self.park_condvar.notify_all();
            let mut threads = self.threads.lock().unwrap();
            threads.retain(|h| !h.is_finished());
            if threads.is_empty() {
                return true;
            }
            drop(threads);
            thread::sleep(std::time::Duration::from_millis(500));
        }
        self.threads.lock().unwrap().is_empty()
    }

    pub fn vcore_count(&self) -> usize {
        self.vcores.len()
    }

    pub fn vcore_queue_len(&self, id: usize) -> usize {
        self.vcores[id].queue.len()
    }

    pub fn enqueue_on_vcore(&self, id: usize, fiber: Fiber) {
        let fid = self.fibers.insert(fiber);
        self.vcores[id].queue.enqueue(fid);
    }
}
