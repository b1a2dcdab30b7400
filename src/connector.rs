//! Connector assembly and the uniform list/read/write surface.
//!
//! [`ConnectorBuilder`] binds the catalog, credentials, and HTTP stack for one provider
//! and returns a [`ConnectorHandle`]. Providers with a reference implementation turn the
//! handle into a [`Connector`] through [`ConnectorHandle::into_connector`]; every other
//! provider is driven through the handle's [`JsonClient`] directly.

pub mod builder;
pub mod types;

pub use builder::*;
pub use types::*;

// self
use crate::{
	_prelude::*,
	auth::Workspace,
	catalog::ProviderInfo,
	error::ConfigError,
	http::{HttpClient, JsonClient, RefreshMetrics, RequestContext},
};

/// Boxed future returned by [`Connector`] operations.
pub type ConnectorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Uniform surface exposed by full connectors.
pub trait Connector
where
	Self: 'static + Send + Sync,
{
	/// Catalog identifier of the provider.
	fn provider(&self) -> &str;

	/// Describes each named object; per-object failures land in
	/// [`ListObjectMetadataResult::errors`].
	fn list_object_metadata<'a>(
		&'a self,
		ctx: &'a RequestContext,
		objects: &'a [String],
	) -> ConnectorFuture<'a, ListObjectMetadataResult>;

	/// Reads one page of records.
	fn read<'a>(&'a self, ctx: &'a RequestContext, params: &'a ReadParams)
	-> ConnectorFuture<'a, ReadResult>;

	/// Creates or updates one record.
	fn write<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a WriteParams,
	) -> ConnectorFuture<'a, WriteResult>;
}

/// Fully assembled connector state for one provider and tenant.
///
/// Every descriptor field the connector consumes has been resolved and validated, the
/// client carries the base URL, authenticator, and error interpreter.
#[derive(Clone, Debug)]
pub struct ConnectorHandle {
	info: ProviderInfo,
	client: JsonClient,
	base_url: Url,
	workspace: Option<Workspace>,
	options: BTreeMap<String, String>,
	refresh_metrics: Option<Arc<RefreshMetrics>>,
}
impl ConnectorHandle {
	/// Catalog identifier of the provider.
	pub fn provider(&self) -> &str {
		self.info.id()
	}

	/// Substituted descriptor.
	pub fn info(&self) -> &ProviderInfo {
		&self.info
	}

	/// Authenticated JSON client rooted at [`Self::base_url`].
	pub fn client(&self) -> &JsonClient {
		&self.client
	}

	/// Raw client underneath [`Self::client`].
	pub fn http(&self) -> &HttpClient {
		self.client.http()
	}

	/// Resolved base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Tenant workspace, when one was supplied.
	pub fn workspace(&self) -> Option<&Workspace> {
		self.workspace.as_ref()
	}

	/// Resolved provider option (descriptor value or caller override).
	pub fn option(&self, key: &str) -> Result<&str> {
		self.options.get(key).map(String::as_str).ok_or_else(|| {
			ConfigError::ProviderOptionNotFound { provider: self.provider().into(), option: key.into() }
				.into()
		})
	}

	/// Every resolved option.
	pub fn options(&self) -> &BTreeMap<String, String> {
		&self.options
	}

	/// Refresh counters, when the handle refreshes OAuth tokens.
	pub fn refresh_metrics(&self) -> Option<&Arc<RefreshMetrics>> {
		self.refresh_metrics.as_ref()
	}

	/// Turns the handle into the provider's reference connector.
	///
	/// Providers without one return [`Error::Unsupported`].
	pub fn into_connector(self) -> Result<Box<dyn Connector>> {
		crate::providers::connect(self)
	}

	/// Checks that the handle targets `expected`.
	pub(crate) fn ensure_provider(&self, expected: &'static str) -> Result<()> {
		if self.provider() == expected {
			Ok(())
		} else {
			Err(ConfigError::ProviderMismatch { expected, found: self.provider().into() }.into())
		}
	}
}
