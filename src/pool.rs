//! Bounded fan-out with a join barrier.
//!
//! Every item is handed to one of a fixed number of named worker threads
//! through a bounded channel. Results travel back tagged with the index
//! of their item so that they are returned in input order, whatever the
//! order in which the workers complete.

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, unbounded};
use tracing::{debug, warn};

/// Run-level cancellation flag shared by every worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel the token once the deadline has passed.
    ///
    /// The watchdog thread is detached and simply outlives a run that ends first.
    pub fn cancel_after(&self, deadline: Duration) {
        let token = self.clone();
        let spawned = thread::Builder::new()
            .name("watchdog".to_owned())
            .spawn(move || {
                thread::sleep(deadline);
                if !token.is_cancelled() {
                    warn!("Run deadline of {deadline:?} reached, cancelling");
                    token.cancel();
                }
            });

        if let Err(err) = spawned {
            warn!("Could not start the run deadline watchdog: {err}");
        }
    }
}

/// The number of workers to use when none is configured
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Process every item on at most `workers` threads and return the results
/// in the order of the items.
///
/// Block until every item has been processed.
/// Threads are named `<name>-<n>`.
pub fn run_ordered<T, R, F>(name: &str, workers: usize, items: Vec<T>, process: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> R + Sync,
{
    let nb_items = items.len();
    if nb_items == 0 {
        return vec![];
    }
    let workers = workers.clamp(1, nb_items);
    let process = &process;

    let (input, receive) = bounded::<(usize, T)>(workers);
    let (send, output) = unbounded::<(usize, R)>();

    let mut results: Vec<Option<R>> = (0..nb_items).map(|_| None).collect();

    thread::scope(|scope| {
        let mut spawned = 0;
        for id in 0..workers {
            let receive = receive.clone();
            let send = send.clone();
            let res = thread::Builder::new()
                .name(format!("{name}-{id}"))
                .spawn_scoped(scope, move || {
                    debug!("Worker started, waiting for work");
                    for (idx, item) in receive {
                        let res = process(idx, item);
                        if send.send((idx, res)).is_err() {
                            break;
                        }
                    }
                    debug!("All work completed. Stopping the worker.");
                });

            match res {
                Ok(_) => spawned += 1,
                Err(err) => {
                    warn!("Could not spawn worker {name}-{id}, going on with {spawned}: {err}");
                    break;
                }
            }
        }

        // Only the workers must hold these so that the channels close with them
        drop(receive);
        drop(send);

        if spawned == 0 {
            drop(input);
            results = run_inline(items, process).into_iter().map(Some).collect();
            return;
        }

        // Fill the input channel with all the work
        for item in items.into_iter().enumerate() {
            if input.send(item).is_err() {
                break;
            }
        }

        // Drop the input to indicate the end of the input data
        drop(input);

        // Wait for the output to be closed, i.e. for every worker to stop
        for (idx, res) in output {
            results[idx] = Some(res);
        }
    });

    results.into_iter().flatten().collect()
}

/// Process every item on the current thread, in order
fn run_inline<T, R, F>(items: Vec<T>, process: &F) -> Vec<R>
where
    F: Fn(usize, T) -> R,
{
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| process(idx, item))
        .collect()
}
