//! Reference connectors and the per-provider assembly requirements.

pub mod salesforce;
pub mod zendesk;

pub use salesforce::SalesforceConnector;
pub use zendesk::ZendeskConnector;

// self
use crate::{
	_prelude::*,
	connector::{Connector, ConnectorHandle},
	http::{DefaultErrorInterpreter, ErrorInterpreter},
};

/// What a provider needs before its handle can be assembled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderRequirements {
	/// A workspace must be supplied.
	pub workspace: bool,
	/// Descriptor options the connector consumes.
	pub options: &'static [&'static str],
}

/// Requirements of `provider`; providers without a reference connector have none.
pub fn requirements(provider: &str) -> ProviderRequirements {
	match provider {
		salesforce::PROVIDER => salesforce::REQUIREMENTS,
		zendesk::PROVIDER => zendesk::REQUIREMENTS,
		_ => ProviderRequirements::default(),
	}
}

/// Error interpreter installed when the caller does not supply one.
pub fn default_interpreter(provider: &str) -> Arc<dyn ErrorInterpreter> {
	match provider {
		salesforce::PROVIDER => Arc::new(salesforce::interpret_error),
		zendesk::PROVIDER => Arc::new(zendesk::interpret_error),
		_ => Arc::new(DefaultErrorInterpreter),
	}
}

/// Wraps `handle` in the provider's reference connector.
pub fn connect(handle: ConnectorHandle) -> Result<Box<dyn Connector>> {
	match handle.provider() {
		salesforce::PROVIDER => Ok(Box::new(SalesforceConnector::new(handle)?)),
		zendesk::PROVIDER => Ok(Box::new(ZendeskConnector::new(handle)?)),
		other => Err(Error::Unsupported { provider: other.into(), operation: "list/read/write" }),
	}
}

/// Aborts a batch on cancellation; any other failure belongs to a single object.
pub(crate) fn is_fatal(error: &Error) -> bool {
	matches!(error, Error::Cancelled | Error::DeadlineExceeded)
}
