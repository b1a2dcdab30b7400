//! Per-request deadline and cancellation.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	sync::watch,
	time::{self, Instant},
};
// self
use crate::_prelude::*;

/// Shared cancel signal; every clone observes the same flag.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<watch::Sender<bool>>);
impl CancelToken {
	/// Creates an untriggered token.
	pub fn new() -> Self {
		Self(Arc::new(watch::channel(false).0))
	}

	/// Triggers the signal. Idempotent.
	pub fn cancel(&self) {
		self.0.send_replace(true);
	}

	/// Returns `true` once [`CancelToken::cancel`] has been called.
	pub fn is_cancelled(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the signal fires.
	pub async fn cancelled(&self) {
		let mut rx = self.0.subscribe();

		// The sender lives in `self`, so the channel cannot close under us.
		let _ = rx.wait_for(|cancelled| *cancelled).await;
	}
}
impl Default for CancelToken {
	fn default() -> Self {
		Self::new()
	}
}

/// Deadline and cancel signal carried by every request.
///
/// The default context never expires and cannot be cancelled.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
	deadline: Option<Instant>,
	cancel: Option<CancelToken>,
}
impl RequestContext {
	/// Context without deadline or cancel signal.
	pub fn background() -> Self {
		Self::default()
	}

	/// Sets an absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline relative to now.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Attaches a cancel signal.
	pub fn with_cancel(mut self, token: CancelToken) -> Self {
		self.cancel = Some(token);

		self
	}

	/// Configured deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Attached cancel signal, if any.
	pub fn cancel_token(&self) -> Option<&CancelToken> {
		self.cancel.as_ref()
	}

	/// Fails fast when the context already fired.
	pub fn check(&self) -> Result<()> {
		if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
			return Err(Error::Cancelled);
		}
		if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
			return Err(Error::DeadlineExceeded);
		}

		Ok(())
	}

	/// Drives `fut` until it completes or the context fires, whichever comes first.
	///
	/// Cancellation wins over the deadline, and both win over a future that is ready
	/// in the same poll.
	pub async fn run<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		self.check()?;

		let cancelled = async {
			match &self.cancel {
				Some(token) => token.cancelled().await,
				None => std::future::pending().await,
			}
		};
		let expired = async {
			match self.deadline {
				Some(deadline) => time::sleep_until(deadline).await,
				None => std::future::pending().await,
			}
		};

		tokio::select! {
			biased;
			_ = cancelled => Err(Error::Cancelled),
			_ = expired => Err(Error::DeadlineExceeded),
			result = fut => result,
		}
	}
}
