// self
use crate::{
	error::ErrorCategory,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"saas_connectors_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the taxonomy category of a failed flow (when enabled).
pub fn record_flow_error(kind: FlowKind, category: ErrorCategory) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"saas_connectors_error_total",
			"flow" => kind.as_str(),
			"category" => category.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, category);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::Error, obs};

	#[test]
	fn recording_is_safe_without_a_recorder() {
		record_flow_outcome(FlowKind::Request, FlowOutcome::Failure);
		record_flow_error(FlowKind::Refresh, ErrorCategory::Authentication);
	}

	#[test]
	fn observe_passes_results_through() {
		assert_eq!(obs::observe(FlowKind::Assembly, Ok(3)).ok(), Some(3));
		assert!(matches!(
			obs::observe::<()>(FlowKind::Request, Err(Error::Cancelled)),
			Err(Error::Cancelled)
		));
	}
}
