//! Optional observability hooks for connector flows.
//!
//! # Feature Flags
//!
//! - `tracing` emits spans named `saas_connectors.flow` carrying `flow`, `stage`, and
//!   (when known) `provider` fields.
//! - `metrics` increments `saas_connectors_flow_total` for every attempt/success/failure,
//!   labeled by `flow` and `outcome`; failures additionally bump
//!   `saas_connectors_error_total` labeled by `flow` and `category`.
//!
//! Neither feature installs a subscriber or recorder; that stays with the application.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Connector flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Connector construction through [`ConnectorBuilder`](crate::connector::ConnectorBuilder).
	Assembly,
	/// OAuth2 refresh-token grant.
	Refresh,
	/// Outbound API request.
	Request,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Assembly => "assembly",
			FlowKind::Refresh => "refresh",
			FlowKind::Request => "request",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Flow entry.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the terminal outcome of `result` for `kind` and hands it back untouched.
pub fn observe<T>(kind: FlowKind, result: Result<T>) -> Result<T> {
	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			record_flow_outcome(kind, FlowOutcome::Failure);
			record_flow_error(kind, e.category());
		},
	}

	result
}
