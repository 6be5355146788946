//! Simple thread pool for factoring batches of independent state vectors.
//!
//! Each factorization is strictly sequential internally, but separate states
//! share nothing, so a batch can be spread across worker threads with no
//! ordering constraints between jobs.
//!
//! ```
//! use num_complex::Complex64 as C64;
//! use mps_factor::batch::DecomposerPool;
//!
//! let pool: DecomposerPool<C64> = DecomposerPool::new(2);
//! let states: Vec<(Vec<usize>, Vec<C64>)> =
//!     (0..4)
//!     .map(|k| {
//!         let mut state = vec![C64::from(0.0); 8];
//!         state[k] = C64::from(1.0);
//!         (vec![2; 3], state)
//!     })
//!     .collect();
//! let results = pool.decompose(states).unwrap();
//! assert_eq!(results.len(), 4);
//! assert!(results.iter().all(|res| res.is_ok()));
//! ```

use std::thread;
use crossbeam::channel;
use thiserror::Error;
use tracing::debug;
use crate::{
    ComplexScalar,
    mps::{ MPS, MPSResult },
};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to enqueue states: dead thread")]
    DeadThread,

    #[error("failed to enqueue states: closed sender channel")]
    ClosedSenderChannel,

    #[error("failed to receive factorization result: receiver error: {0}")]
    ClosedReceiverChannel(channel::RecvError),

    #[error("encountered receiver error from within a thread: receiver error: {0}")]
    WorkerReceiverError(channel::RecvError),

    #[error("no factorization result was received for state {0}")]
    MissingResult(usize),
}
use PoolError::*;
pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Clone, Debug)]
enum ToWorker<A> {
    Stop,
    Work(usize, Vec<usize>, Vec<A>),
}

#[derive(Debug)]
enum FromWorker<A>
where A: ComplexScalar
{
    RecvError(channel::RecvError),
    Output(usize, MPSResult<MPS<A>>),
}

/// A simple thread pool to factor many state vectors in parallel.
///
/// Workload between threads is automatically balanced by means of a
/// single-producer, multiple-consumer channel. Results are returned in the
/// order the states were submitted. The pool as a whole is meant to be reused
/// between batches, and is **not** thread-safe.
#[derive(Debug)]
pub struct DecomposerPool<A>
where A: ComplexScalar
{
    threads: Vec<thread::JoinHandle<()>>,
    workers_in: channel::Sender<ToWorker<A>>,
    workers_out: channel::Receiver<FromWorker<A>>,
}

impl<A> DecomposerPool<A>
where
    A: ComplexScalar + Send + 'static,
    A::Re: Send,
{
    /// Create a new thread pool of `nthreads` threads (at least one).
    pub fn new(nthreads: usize) -> Self {
        let nthreads = nthreads.max(1);
        let (tx_in, rx_in) = channel::unbounded();
        let (tx_out, rx_out) = channel::unbounded();
        let mut threads = Vec::with_capacity(nthreads);
        for _ in 0..nthreads {
            let worker_receiver: channel::Receiver<ToWorker<A>> = rx_in.clone();
            let worker_sender: channel::Sender<FromWorker<A>> = tx_out.clone();
            let th = thread::spawn(move || loop {
                match worker_receiver.recv() {
                    Ok(ToWorker::Stop) => { break; },
                    Ok(ToWorker::Work(id, dims, state)) => {
                        let res = MPS::from_vector_dims(dims, state);
                        if worker_sender.send(FromWorker::Output(id, res)).is_err() {
                            break;
                        }
                    },
                    Err(err) => {
                        worker_sender.send(FromWorker::RecvError(err)).ok();
                        break;
                    },
                }
            });
            threads.push(th);
        }
        debug!(nthreads, "started decomposer pool");
        Self { threads, workers_in: tx_in, workers_out: rx_out }
    }

    /// Create a new thread pool with the number of threads equal to the number
    /// of logical CPU cores available in the current system.
    pub fn new_cpus() -> Self { Self::new(num_cpus::get()) }

    /// Create a new thread pool with the number of threads equal to the number
    /// of physical CPU cores available in the current system.
    pub fn new_physical() -> Self { Self::new(num_cpus::get_physical()) }

    /// Return the number of worker threads.
    pub fn nthreads(&self) -> usize { self.threads.len() }

    /// Enqueue a batch of `(physical dimensions, state vector)` pairs to be
    /// distributed across all threads.
    ///
    /// This method will block until all enqueued factorizations have been
    /// completed. Failures of individual factorizations are returned in place
    /// and do not affect the rest of the batch.
    pub fn decompose<I>(&self, states: I) -> PoolResult<Vec<MPSResult<MPS<A>>>>
    where I: IntoIterator<Item = (Vec<usize>, Vec<A>)>
    {
        if self.threads.iter().any(|th| th.is_finished()) {
            return Err(DeadThread);
        }
        let mut count: usize = 0;
        for (dims, state) in states.into_iter() {
            match self.workers_in.send(ToWorker::Work(count, dims, state)) {
                Ok(()) => { count += 1; },
                Err(_) => { return Err(ClosedSenderChannel); },
            }
        }
        let mut output: Vec<Option<MPSResult<MPS<A>>>> =
            (0..count).map(|_| None).collect();
        for _ in 0..count {
            match self.workers_out.recv() {
                Ok(FromWorker::Output(id, res)) => { output[id] = Some(res); },
                Ok(FromWorker::RecvError(err)) => {
                    return Err(WorkerReceiverError(err));
                },
                Err(err) => { return Err(ClosedReceiverChannel(err)); },
            }
        }
        debug!(count, "finished batch");
        collect_ordered(output)
    }
}

// Unwrap per-job result slots, failing on the first job that never reported
// back.
fn collect_ordered<T>(slots: Vec<Option<T>>) -> PoolResult<Vec<T>> {
    slots.into_iter()
        .enumerate()
        .map(|(id, slot)| slot.ok_or(MissingResult(id)))
        .collect()
}

impl<A> Drop for DecomposerPool<A>
where A: ComplexScalar
{
    fn drop(&mut self) {
        (0..self.threads.len())
            .for_each(|_| { self.workers_in.send(ToWorker::Stop).ok(); });
        self.threads.drain(..)
            .for_each(|th| { th.join().ok(); });
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64 as C64;
    use crate::mps::MPSError;
    use super::*;

    #[test]
    fn lost_jobs_are_reported() {
        assert_eq!(collect_ordered(vec![Some(1), Some(2), Some(3)]).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            collect_ordered(vec![Some(1), None, Some(3), None]),
            Err(MissingResult(1)),
        ));
        assert!(collect_ordered::<u8>(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn results_come_back_in_order() {
        let pool: DecomposerPool<C64> = DecomposerPool::new(3);
        assert_eq!(pool.nthreads(), 3);
        let jobs: Vec<(Vec<usize>, Vec<C64>)> =
            (1..=6)
            .map(|n| {
                let len = 1 << n;
                let mut state = vec![C64::from(0.0); len];
                state[len - 1] = C64::from(1.0);
                (vec![2; n], state)
            })
            .collect();
        let results = pool.decompose(jobs).unwrap();
        for (k, res) in results.into_iter().enumerate() {
            let mps = res.unwrap();
            assert_eq!(mps.n(), k + 1);
            let ones = vec![1; k + 1];
            assert!((mps.amplitude(&ones).unwrap() - C64::from(1.0)).norm() < 1e-12);
        }

        // the pool can be reused, and errors stay local to their job
        let jobs = vec![
            (vec![2, 2], vec![C64::from(1.0); 3]),
            (vec![2], vec![C64::from(1.0), C64::from(0.0)]),
        ];
        let results = pool.decompose(jobs).unwrap();
        assert!(matches!(results[0], Err(MPSError::InvalidParameters(_))));
        assert!(results[1].is_ok());
    }
}
