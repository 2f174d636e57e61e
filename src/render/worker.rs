//! Single background thread that runs geometry generation.
//!
//! The generator is moved into the task and handed back with its result over
//! a oneshot channel; the render thread polls for it at frame boundaries.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::cloud::CloudGenerator;
use crate::config::{CloudConfig, RecipeMap, WaveConfig};
use crate::error::GeneratorError;
use crate::flags::{Mode, StateFlags};
use crate::wave::WaveGenerator;

/// A generation request. Configs travel by value.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Wave(WaveConfig),
    Cloud(CloudConfig, RecipeMap),
}

impl Job {
    pub fn mode(&self) -> Mode {
        match self {
            Job::Wave(_) => Mode::Wave,
            Job::Cloud(..) => Mode::Cloud,
        }
    }
}

#[derive(Debug)]
pub enum Generator {
    Wave(Box<WaveGenerator>),
    Cloud(Box<CloudGenerator>),
}

impl Generator {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Wave => Generator::Wave(Box::default()),
            Mode::Cloud => Generator::Cloud(Box::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Generator::Wave(_) => Mode::Wave,
            Generator::Cloud(_) => Mode::Cloud,
        }
    }

    fn run(&mut self, job: Job) -> Result<(), GeneratorError> {
        match (self, job) {
            (Generator::Wave(generator), Job::Wave(config)) => generator.new_waves(config),
            (Generator::Cloud(generator), Job::Cloud(config, recipe)) => generator.new_cloud(config, recipe),
            (generator, job) => {
                // mismatched pairs are rebuilt rather than rejected
                *generator = Generator::for_mode(job.mode());
                generator.run(job)
            }
        }
    }
}

/// What a finished task hands back.
#[derive(Debug)]
pub struct Outcome {
    pub generator: Generator,
    pub result: Result<(), GeneratorError>,
    pub elapsed: Duration,
}

/// Result of polling the worker.
#[derive(Debug)]
pub enum Poll {
    Idle,
    Busy,
    Finished(Outcome),
    /// The task died without reporting; its generator is gone.
    Lost,
}

pub struct Worker {
    runtime: Runtime,
    flags: Arc<Mutex<StateFlags>>,
    in_flight: Option<oneshot::Receiver<Outcome>>,
}

impl Worker {
    pub fn new(flags: Arc<Mutex<StateFlags>>) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name("atomix-worker")
            .build()?;

        Ok(Worker {
            runtime,
            flags,
            in_flight: None,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts `job` on the worker thread. The caller must not spawn while busy.
    pub fn spawn(&mut self, mut generator: Generator, job: Job) {
        debug_assert!(self.in_flight.is_none());

        let (tx, rx) = oneshot::channel();
        let flags = Arc::clone(&self.flags);
        log::debug!("spawning {} generation", job.mode().name());

        self.runtime.spawn_blocking(move || {
            let started = Instant::now();
            let result = generator.run(job);
            let outcome = Outcome {
                generator,
                result,
                elapsed: started.elapsed(),
            };
            flags.lock().insert(StateFlags::THREAD_FINISHED);
            if tx.send(outcome).is_err() {
                log::debug!("worker result dropped, receiver gone");
            }
        });

        self.in_flight = Some(rx);
    }

    /// Non-blocking check for a finished task.
    pub fn poll(&mut self) -> Poll {
        let Some(rx) = self.in_flight.as_mut() else {
            return Poll::Idle;
        };
        match rx.try_recv() {
            Ok(outcome) => {
                self.in_flight = None;
                Poll::Finished(outcome)
            }
            Err(TryRecvError::Empty) => Poll::Busy,
            Err(TryRecvError::Closed) => {
                self.in_flight = None;
                Poll::Lost
            }
        }
    }

    /// Blocks until the in-flight task, if any, reports.
    pub fn wait(&mut self) -> Poll {
        match self.in_flight.take() {
            None => Poll::Idle,
            Some(rx) => match rx.blocking_recv() {
                Ok(outcome) => Poll::Finished(outcome),
                Err(_) => Poll::Lost,
            },
        }
    }
}
