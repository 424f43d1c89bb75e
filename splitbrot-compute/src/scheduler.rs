//! Worker pool running one generation's job tree at a time.
//!
//! Ready jobs sit on a lock-free LIFO threaded through the job pool, so
//! the tree is explored depth first. Workers that find nothing to do
//! count themselves in `waiting` and park on a semaphore that is posted
//! once per enqueue while anybody waits. The root job's completion posts
//! `finished`.

use crate::error::EngineError;
use crate::fatal::fatal;
use crate::generation::Generation;
use crate::job::{self, JobId, JobKind, JobRecord, Presented, Stage};
use crate::pool::{AtomicStack, IndexStack, ObjectPool};
use crate::semaphore::Semaphore;
use log::{debug, info, trace};
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) struct Shared {
    jobs: ObjectPool<JobRecord>,
    ready: IndexStack,
    presented: AtomicStack<Presented>,
    waiting: AtomicUsize,
    wakeup: Semaphore,
    running: AtomicBool,
    finished: Semaphore,
    paused: AtomicBool,
    pause_ack: Semaphore,
    resume: Semaphore,
    shutdown: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            jobs: ObjectPool::new(),
            ready: IndexStack::new(),
            presented: AtomicStack::new(),
            waiting: AtomicUsize::new(0),
            wakeup: Semaphore::new(),
            running: AtomicBool::new(false),
            finished: Semaphore::new(),
            paused: AtomicBool::new(false),
            pause_ack: Semaphore::new(),
            resume: Semaphore::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Creates a record, counting it against its parent.
    fn insert(&self, parent: Option<JobId>, generation: Arc<Generation>, kind: JobKind) -> JobId {
        if let Some(parent) = parent {
            // SAFETY: the caller holds a pending count on `parent`
            let record = unsafe { self.jobs.get(parent) };
            record.pending.fetch_add(1, Ordering::Relaxed);
        }
        let id = self.jobs.insert(JobRecord::new(parent, generation, kind));
        trace!("job {id} created under {parent:?}: {kind:?}");
        id
    }

    /// Makes a job visible to the workers.
    fn publish(&self, id: JobId) {
        self.ready.push(&self.jobs, id);
        fence(Ordering::SeqCst);
        if self.waiting.load(Ordering::SeqCst) > 0 {
            self.wakeup.post();
        }
    }

    fn run(&self, id: JobId) {
        // SAFETY: a popped id belongs to this worker, and its own pending
        // count keeps the record alive until the release below
        let record = unsafe { self.jobs.get(id) };
        let mut ctx = JobContext::new(self, &record.generation, id, record.parent);
        if let Some(presented) = job::execute(&mut ctx, &record.kind) {
            self.presented.push(presented);
        }
        let JobContext {
            spawned, stages, ..
        } = ctx;
        for child in spawned {
            self.publish(child);
        }
        for stage in stages {
            self.release(stage);
        }
        self.release(id);
    }

    /// Drops one pending count of `id`, completing it and walking up the
    /// tree for as long as counts reach zero.
    fn release(&self, mut id: JobId) {
        loop {
            // SAFETY: the count being dropped keeps the record alive
            let record = unsafe { self.jobs.get(id) };
            if record.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
                return;
            }
            if let (JobKind::Stage(stage), Some(parent)) = (&record.kind, record.parent) {
                let mut ctx = JobContext::new(self, &record.generation, parent, None);
                job::complete_stage(&mut ctx, stage);
                for child in ctx.spawned {
                    self.publish(child);
                }
            }
            // SAFETY: the count is zero, so nothing else refers to the record
            let record = unsafe { self.jobs.remove(id) };
            trace!("job {id} done");
            match record.parent {
                Some(parent) => id = parent,
                None => {
                    drop(record);
                    self.running.store(false, Ordering::Release);
                    self.finished.post();
                    return;
                }
            }
        }
    }

    fn worker_loop(&self, index: usize) {
        debug!("worker {index} started");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            if self.paused.load(Ordering::SeqCst) {
                self.pause_ack.post();
                self.resume.wait();
                continue;
            }
            if let Some(id) = self.ready.pop(&self.jobs) {
                self.run(id);
                continue;
            }
            self.waiting.fetch_add(1, Ordering::SeqCst);
            fence(Ordering::SeqCst);
            let job = self.ready.pop(&self.jobs);
            if job.is_none()
                && !self.shutdown.load(Ordering::SeqCst)
                && !self.paused.load(Ordering::SeqCst)
            {
                self.wakeup.wait();
            }
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            if let Some(id) = job {
                self.run(id);
            }
        }
        debug!("worker {index} stopped");
    }
}

/// What a running job may do to the tree: spawn children, open stages
/// and hand work to idle siblings.
///
/// Children and stage releases are held back until the job returns.
pub(crate) struct JobContext<'a> {
    shared: &'a Shared,
    generation: &'a Arc<Generation>,
    id: JobId,
    parent: Option<JobId>,
    spawned: Vec<JobId>,
    stages: Vec<JobId>,
}

impl<'a> JobContext<'a> {
    fn new(
        shared: &'a Shared,
        generation: &'a Arc<Generation>,
        id: JobId,
        parent: Option<JobId>,
    ) -> Self {
        Self {
            shared,
            generation,
            id,
            parent,
            spawned: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn generation(&self) -> &'a Generation {
        self.generation
    }

    pub fn spawn(&mut self, kind: JobKind) {
        self.spawn_into(self.id, kind);
    }

    /// A stage under the current job, released once the job returns.
    pub fn open_stage(&mut self, stage: Stage) -> JobId {
        let id = self
            .shared
            .insert(Some(self.id), Arc::clone(self.generation), JobKind::Stage(stage));
        self.stages.push(id);
        id
    }

    pub fn spawn_into(&mut self, parent: JobId, kind: JobKind) {
        let id = self
            .shared
            .insert(Some(parent), Arc::clone(self.generation), kind);
        self.spawned.push(id);
    }

    /// Queues `kind` next to the current job, under the same parent,
    /// right away. False for a root job, which has no parent to share.
    pub fn spawn_sibling(&mut self, kind: JobKind) -> bool {
        let Some(parent) = self.parent else {
            return false;
        };
        let id = self
            .shared
            .insert(Some(parent), Arc::clone(self.generation), kind);
        self.shared.publish(id);
        true
    }

    pub fn workers_idle(&self) -> bool {
        self.shared.waiting.load(Ordering::Relaxed) > 0
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    active: Option<Arc<Generation>>,
}

impl Scheduler {
    /// Starts `threads` workers, one per logical CPU when 0.
    pub fn new(threads: usize) -> Result<Self, EngineError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        // on a spawn error, dropping the half-built scheduler stops the
        // workers already running
        let mut scheduler = Self {
            shared: Arc::new(Shared::new()),
            workers: Vec::with_capacity(threads),
            active: None,
        };
        for index in 0..threads {
            let shared = Arc::clone(&scheduler.shared);
            let handle = thread::Builder::new()
                .name(format!("splitbrot-worker-{index}"))
                .spawn(move || shared.worker_loop(index))?;
            scheduler.workers.push(handle);
        }
        info!("scheduler started with {threads} workers");
        Ok(scheduler)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues the root job of `generation`.
    pub fn start_execution(&mut self, generation: Arc<Generation>) -> Result<(), EngineError> {
        if !self.is_finished() {
            return Err(EngineError::AlreadyRunning);
        }
        self.shared.finished.drain();
        self.shared.running.store(true, Ordering::SeqCst);
        let root = self
            .shared
            .insert(None, Arc::clone(&generation), JobKind::Main);
        self.active = Some(generation);
        self.shared.publish(root);
        Ok(())
    }

    /// Stops the running generation and waits until its whole job tree
    /// is gone. Work left undone is marked stale in the image.
    pub fn cancel_execution(&mut self) {
        let Some(generation) = self.active.take() else {
            return;
        };
        if self.is_finished() {
            return;
        }
        let flag = generation.terminate_flag();
        flag.raise();
        self.wait_until_finished();
        flag.lower();
        if self.shared.jobs.live() != 0 {
            fatal(format_args!(
                "{} job records outlived their generation",
                self.shared.jobs.live()
            ));
        }
        info!("generation cancelled");
    }

    pub fn wait_until_finished(&self) {
        while self.shared.running.load(Ordering::Acquire) {
            self.shared.finished.wait();
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.shared.running.load(Ordering::Acquire)
    }

    /// Reorders queued jobs so the ones closest to `priority` run first.
    /// Jobs already executing are not affected.
    pub fn sort_ready_queue(&self, (px, py): (i32, i32)) {
        self.pause();
        let jobs = &self.shared.jobs;
        let mut ready: Vec<JobId> = std::iter::from_fn(|| self.shared.ready.pop(jobs)).collect();
        ready.sort_by_key(|&id| {
            // SAFETY: queued records stay alive while every worker is parked
            let kind = unsafe { &jobs.get(id).kind };
            kind.rect()
                .map_or(0, |rect| rect.distance_sq_to(px as i64, py as i64))
        });
        debug!("sorted {} ready jobs toward ({px}, {py})", ready.len());
        for id in ready.into_iter().rev() {
            self.shared.ready.push(jobs, id);
        }
        self.resume();
    }

    fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.wakeup.post_n(self.threads());
        for _ in 0..self.threads() {
            self.shared.pause_ack.wait();
        }
    }

    fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.resume.post_n(self.threads());
    }

    pub fn pop_presented(&self) -> Option<Presented> {
        self.shared.presented.pop()
    }

    /// Drops every presented record nobody collected, returning how many.
    pub fn discard_presented(&self) -> usize {
        self.shared.presented.drain().len()
    }

    /// Job records currently allocated, stages included.
    pub fn live_jobs(&self) -> usize {
        self.shared.jobs.live()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_execution();
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wakeup.post_n(self.workers.len());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
        info!("scheduler stopped");
    }
}
