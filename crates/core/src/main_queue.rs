//! The application's main execution context.
//!
//! Callback consumers update UI directly from their completions, so every
//! completion is delivered through a [`MainContext`]. [`MainQueue`] is the
//! default implementation: a dedicated thread draining jobs in FIFO order.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error};

/// Unit of work run on the main context.
pub type MainJob = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere jobs can be scheduled to run serially.
pub trait MainContext: Send + Sync {
	fn dispatch(&self, job: MainJob);
}

thread_local! {
	static ON_MAIN_QUEUE: Cell<bool> = const { Cell::new(false) };
}

/// Dedicated main thread fed by an unbounded channel.
///
/// The thread exits once every clone of the queue has been dropped and the
/// remaining jobs have run.
#[derive(Clone)]
pub struct MainQueue {
	tx: mpsc::UnboundedSender<MainJob>,
}

impl MainQueue {
	pub const THREAD_NAME: &'static str = "branch-main";

	/// Spawns the main thread.
	pub fn spawn() -> std::io::Result<Self> {
		let (tx, mut rx) = mpsc::unbounded_channel::<MainJob>();
		thread::Builder::new().name(Self::THREAD_NAME.to_string()).spawn(move || {
			ON_MAIN_QUEUE.with(|flag| flag.set(true));
			while let Some(job) = rx.blocking_recv() {
				if catch_unwind(AssertUnwindSafe(job)).is_err() {
					error!(target = "branch.coordinator", "main queue job panicked");
				}
			}
			debug!(target = "branch.coordinator", "main queue drained");
		})?;
		Ok(Self { tx })
	}

	/// Returns `true` when called from a [`MainQueue`] thread.
	pub fn is_main_thread() -> bool {
		ON_MAIN_QUEUE.with(Cell::get)
	}
}

impl MainContext for MainQueue {
	fn dispatch(&self, job: MainJob) {
		if self.tx.send(job).is_err() {
			error!(target = "branch.coordinator", "main queue closed; dropping job");
		}
	}
}
