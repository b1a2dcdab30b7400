//! Options-driven connector assembly.

// std
use std::borrow::Cow;
// self
use crate::{
	_prelude::*,
	auth::{OAuthToken, TokenSecret, Workspace},
	catalog::{ApiKeyPlacement, AuthType, Catalog, ProviderInfo, Substitutions},
	connector::ConnectorHandle,
	credentials::{CredentialField, CredentialRecord},
	error::{ConfigError, CredentialsError},
	http::{
		ApiKeyHeader, ApiKeyQuery, Authenticator, BasicAuth, DEFAULT_REFRESH_SKEW, ErrorInterpreter,
		HttpClient, HttpTransport, JsonClient, NoAuth, RefreshMetrics, RefreshingBearer,
		StaticBearer, TransportErrorMapper,
	},
	oauth::{OAuthClientConfig, TokenRefresher},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	providers,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestTransport, ReqwestTransportErrorMapper};

/// Substitution key filled from [`ConnectorBuilder::with_workspace`].
pub const WORKSPACE_VAR: &str = "workspace";
/// Substitution key filled from a credential record's `subdomain` field.
pub const SUBDOMAIN_VAR: &str = "subdomain";

/// Object-safe view over a transport and its error mapper, used to build the raw
/// client and the refresh grant without leaking their types into the builder.
trait TransportBinding
where
	Self: 'static + Send + Sync,
{
	fn client(&self) -> HttpClient;

	fn refreshing_bearer(
		&self,
		config: &OAuthClientConfig,
		info: &ProviderInfo,
		skew: Duration,
	) -> Result<(Arc<dyn Authenticator>, Arc<RefreshMetrics>)>;
}

struct Bound<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	transport: Arc<C>,
	mapper: Arc<M>,
}
impl<C, M> TransportBinding for Bound<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn client(&self) -> HttpClient {
		HttpClient::new::<C, M>(self.transport.clone(), self.mapper.clone())
	}

	fn refreshing_bearer(
		&self,
		config: &OAuthClientConfig,
		info: &ProviderInfo,
		skew: Duration,
	) -> Result<(Arc<dyn Authenticator>, Arc<RefreshMetrics>)> {
		let refresher = TokenRefresher::<C, M>::from_config(
			config,
			info,
			self.transport.clone(),
			self.mapper.clone(),
		)?;
		let bearer = RefreshingBearer::new(config.token.clone(), refresher).with_skew(skew);
		let metrics = bearer.metrics().clone();

		Ok((Arc::new(bearer), metrics))
	}
}

/// Credential flavor supplied to the builder.
enum ClientSource {
	Authenticated(HttpClient),
	OAuth(Box<OAuthClientConfig>),
	ApiKey(TokenSecret),
	Basic { username: String, password: TokenSecret },
	Credentials(Box<CredentialRecord>),
}
impl ClientSource {
	fn label(&self) -> &'static str {
		match self {
			Self::Authenticated(client) => client.authenticator().auth_type().as_str(),
			Self::OAuth(_) => AuthType::Oauth2.as_str(),
			Self::ApiKey(_) => AuthType::ApiKey.as_str(),
			Self::Basic { .. } => AuthType::Basic.as_str(),
			Self::Credentials(_) => "credential-file",
		}
	}
}

/// Authenticator chosen for the handle, plus the counters of a refreshing bearer.
struct Authentication {
	client: HttpClient,
	refresh_metrics: Option<Arc<RefreshMetrics>>,
}

/// Builds a [`ConnectorHandle`] for one provider.
///
/// The last credential option wins. Nothing is validated until [`Self::build`], which
/// either returns a fully wired handle or an error; no request is ever sent while
/// building.
pub struct ConnectorBuilder {
	provider: String,
	source: Option<ClientSource>,
	substitutions: Substitutions,
	workspace: Option<String>,
	options: BTreeMap<String, String>,
	catalog: Option<Catalog>,
	interpreter: Option<Arc<dyn ErrorInterpreter>>,
	skew: Duration,
	transport: Option<Arc<dyn TransportBinding>>,
}
impl ConnectorBuilder {
	/// Starts assembling a connector for `provider`.
	pub fn new(provider: impl Into<String>) -> Self {
		Self {
			provider: provider.into(),
			source: None,
			substitutions: Substitutions::new(),
			workspace: None,
			options: BTreeMap::new(),
			catalog: None,
			interpreter: None,
			skew: DEFAULT_REFRESH_SKEW,
			transport: None,
		}
	}

	/// Uses a caller-assembled client; only the base URL and interpreter are installed on it.
	pub fn with_authenticated_client(mut self, client: HttpClient) -> Self {
		self.source = Some(ClientSource::Authenticated(client));

		self
	}

	/// Builds an OAuth client from the transport, the registration, and its token.
	pub fn with_client(mut self, config: OAuthClientConfig) -> Self {
		self.source = Some(ClientSource::OAuth(Box::new(config)));

		self
	}

	/// Authenticates with an API key, placed as the descriptor declares.
	pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
		self.source = Some(ClientSource::ApiKey(TokenSecret::new(key)));

		self
	}

	/// Authenticates with HTTP Basic.
	pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.source = Some(ClientSource::Basic {
			username: username.into(),
			password: TokenSecret::new(password),
		});

		self
	}

	/// Derives the credential flavor the descriptor declares from a credential record.
	///
	/// The record's `subdomain` and `workspace` fields seed the matching substitutions
	/// unless they were set explicitly.
	pub fn with_credentials(mut self, record: CredentialRecord) -> Self {
		self.source = Some(ClientSource::Credentials(Box::new(record)));

		self
	}

	/// Adds tenant substitutions applied to the descriptor.
	pub fn with_catalog_substitutions(mut self, substitutions: Substitutions) -> Self {
		self.substitutions.extend(&substitutions);

		self
	}

	/// Sets the tenant workspace; it also fills the `{{workspace}}` placeholder.
	pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
		self.workspace = Some(workspace.into());

		self
	}

	/// Provider-specific option; overrides the descriptor's value of the same key.
	pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.options.insert(key.into(), value.into());

		self
	}

	/// Uses `catalog` instead of the embedded one.
	pub fn with_catalog(mut self, catalog: Catalog) -> Self {
		self.catalog = Some(catalog);

		self
	}

	/// Replaces the provider's default error interpreter.
	pub fn with_error_interpreter(mut self, interpreter: impl ErrorInterpreter) -> Self {
		self.interpreter = Some(Arc::new(interpreter));

		self
	}

	/// Overrides the window before expiry in which tokens are refreshed.
	pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
		self.skew = skew;

		self
	}

	/// Sends requests (and token refreshes) through `transport`.
	pub fn with_transport<C, M>(mut self, transport: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		self.transport =
			Some(Arc::new(Bound::<C, M> { transport: transport.into(), mapper: mapper.into() }));

		self
	}

	/// Validates the options and assembles the handle.
	pub fn build(self) -> Result<ConnectorHandle> {
		const KIND: FlowKind = FlowKind::Assembly;

		let _guard = FlowSpan::new(KIND, "build").with_provider(&self.provider).entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		obs::observe(KIND, self.assemble())
	}

	fn assemble(mut self) -> Result<ConnectorHandle> {
		let requirements = providers::requirements(&self.provider);

		if let Some(ClientSource::Credentials(record)) = &self.source {
			if self.workspace.is_none() && record.has(CredentialField::Workspace) {
				self.workspace = Some(record.get(CredentialField::Workspace).into());
			}
			if self.substitutions.get(SUBDOMAIN_VAR).is_none() && record.has(CredentialField::Subdomain)
			{
				self.substitutions.insert(SUBDOMAIN_VAR, record.get(CredentialField::Subdomain));
			}
		}

		let workspace =
			self.workspace.as_deref().map(Workspace::new).transpose().map_err(ConfigError::from)?;

		if requirements.workspace && workspace.is_none() {
			return Err(ConfigError::MissingWorkspace { provider: self.provider }.into());
		}

		let catalog = match self.catalog.take() {
			Some(catalog) => Cow::Owned(catalog),
			None => Cow::Borrowed(Catalog::embedded()?),
		};
		let declared = catalog.descriptor(&self.provider)?.auth_type;

		if self.source.is_none() && declared != AuthType::None {
			return Err(ConfigError::MissingClient { provider: self.provider }.into());
		}
		if let Some(workspace) = &workspace {
			if self.substitutions.get(WORKSPACE_VAR).is_none() {
				self.substitutions.insert(WORKSPACE_VAR, workspace.to_string());
			}
		}

		let info = catalog.read_info(&self.provider, Some(&self.substitutions))?;
		let base_url = info.resolved_base_url()?;
		let mut options = BTreeMap::new();

		for key in requirements.options {
			let value = match self.options.remove(*key) {
				Some(value) => value,
				None => info.resolved_option(key)?.to_owned(),
			};

			options.insert((*key).to_owned(), value);
		}

		options.append(&mut self.options);

		let Authentication { client, refresh_metrics } = self.authenticate(&info)?;
		let interpreter = self.interpreter.unwrap_or_else(|| providers::default_interpreter(info.id()));
		let client = client
			.with_base(base_url.as_str())
			.with_shared_error_interpreter(interpreter);

		Ok(ConnectorHandle {
			info,
			client: JsonClient::new(client),
			base_url,
			workspace,
			options,
			refresh_metrics,
		})
	}

	fn authenticate(&mut self, info: &ProviderInfo) -> Result<Authentication> {
		let declared = info.auth_type;
		let source = match self.source.take() {
			Some(ClientSource::Credentials(record)) => self.from_credentials(info, &record)?,
			Some(source) => source,
			None => return Ok(Authentication { client: self.raw_client()?, refresh_metrics: None }),
		};
		let supplied = source.label();
		let mismatch = || -> Error {
			ConfigError::AuthTypeMismatch { provider: info.id().into(), declared: declared.as_str(), supplied }
				.into()
		};

		match (declared, source) {
			(_, ClientSource::Authenticated(client)) => {
				if client.authenticator().auth_type() != declared {
					return Err(mismatch());
				}

				Ok(Authentication { client, refresh_metrics: None })
			},
			(AuthType::Oauth2, ClientSource::OAuth(config)) => self.oauth(info, &config),
			(AuthType::ApiKey, ClientSource::ApiKey(key)) => {
				let opts = info.api_key_opts.as_ref().ok_or_else(|| ConfigError::MissingAuthOptions {
					provider: info.id().into(),
					auth_type: declared.as_str(),
				})?;
				let client = self.raw_client()?;
				let client = match opts.placement {
					ApiKeyPlacement::Header => client
						.with_authenticator(ApiKeyHeader::new(&opts.key_name, &opts.value_prefix, &key)?),
					ApiKeyPlacement::Query => client.with_authenticator(ApiKeyQuery::new(
						opts.key_name.clone(),
						TokenSecret::new(format!("{}{}", opts.value_prefix, key.expose())),
					)),
				};

				Ok(Authentication { client, refresh_metrics: None })
			},
			(AuthType::Basic, ClientSource::Basic { username, password }) => Ok(Authentication {
				client: self.raw_client()?.with_authenticator(BasicAuth::new(&username, &password)?),
				refresh_metrics: None,
			}),
			_ => Err(mismatch()),
		}
	}

	fn oauth(&self, info: &ProviderInfo, config: &OAuthClientConfig) -> Result<Authentication> {
		let supports_refresh = info.oauth_opts.as_ref().is_some_and(|opts| opts.supports_refresh);
		let binding = self.binding()?;

		if supports_refresh && config.token.can_refresh() {
			let (bearer, metrics) = binding.refreshing_bearer(config, info, self.skew)?;

			Ok(Authentication {
				client: binding.client().with_shared_authenticator(bearer),
				refresh_metrics: Some(metrics),
			})
		} else {
			Ok(Authentication {
				client: binding.client().with_authenticator(StaticBearer::new(&config.token)?),
				refresh_metrics: None,
			})
		}
	}

	fn from_credentials(&self, info: &ProviderInfo, record: &CredentialRecord) -> Result<ClientSource> {
		Ok(match info.auth_type {
			AuthType::Oauth2 => {
				let token = record.oauth_token()?;
				let refreshes = token.can_refresh()
					&& info.oauth_opts.as_ref().is_some_and(|opts| opts.supports_refresh);

				if refreshes {
					required(record, CredentialField::ClientId)?;
				}

				ClientSource::OAuth(Box::new(oauth_config(record, token)))
			},
			AuthType::ApiKey =>
				ClientSource::ApiKey(TokenSecret::new(required(record, CredentialField::ApiKey)?)),
			AuthType::Basic => ClientSource::Basic {
				username: required(record, CredentialField::Username)?.into(),
				password: TokenSecret::new(record.get(CredentialField::Password)),
			},
			AuthType::None => ClientSource::Authenticated(self.raw_client()?.with_authenticator(NoAuth)),
		})
	}

	fn raw_client(&self) -> Result<HttpClient> {
		Ok(self.binding()?.client())
	}

	fn binding(&self) -> Result<Arc<dyn TransportBinding>> {
		if let Some(binding) = &self.transport {
			return Ok(binding.clone());
		}

		default_binding().ok_or_else(|| ConfigError::MissingClient { provider: self.provider.clone() }.into())
	}
}
impl Debug for ConnectorBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectorBuilder")
			.field("provider", &self.provider)
			.field("source", &self.source.as_ref().map(ClientSource::label))
			.field("substitutions", &self.substitutions)
			.field("workspace", &self.workspace)
			.field("options", &self.options)
			.field("skew", &self.skew)
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "reqwest")]
fn default_binding() -> Option<Arc<dyn TransportBinding>> {
	Some(Arc::new(Bound::<ReqwestTransport, ReqwestTransportErrorMapper> {
		transport: Arc::new(ReqwestTransport::default()),
		mapper: Arc::new(ReqwestTransportErrorMapper),
	}))
}

#[cfg(not(feature = "reqwest"))]
fn default_binding() -> Option<Arc<dyn TransportBinding>> {
	None
}

fn required(record: &CredentialRecord, field: CredentialField) -> Result<&str> {
	if record.has(field) {
		Ok(record.get(field))
	} else {
		Err(CredentialsError::MissingField { field: field.as_str() }.into())
	}
}

fn oauth_config(record: &CredentialRecord, token: OAuthToken) -> OAuthClientConfig {
	let config = OAuthClientConfig::new(record.get(CredentialField::ClientId), token);

	if record.has(CredentialField::ClientSecret) {
		config.with_client_secret(record.get(CredentialField::ClientSecret))
	} else {
		config
	}
}
