//! OAuth2 client configuration and the refresh-token grant.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType as OAuthAuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{OAuthToken, ScopeSet, TokenSecret},
	catalog::{AuthStyle, ProviderInfo},
	error::{AuthError, ConfigError, TransientError},
	http::{
		HttpTransport, RefreshMetrics, ResponseMetadata, ResponseMetadataSlot,
		TransportErrorMapper,
		interpret::truncate_preview,
		transport::{meta_retry_after, meta_status},
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type RefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth client registration plus the tenant's current token.
///
/// Endpoint and auth style default to the provider descriptor; set them here only to
/// override what the catalog declares.
#[derive(Clone)]
pub struct OAuthClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	pub client_secret: Option<TokenSecret>,
	/// Token the connector starts with.
	pub token: OAuthToken,
	/// Token endpoint override.
	pub token_url: Option<Url>,
	/// Client authentication style override.
	pub auth_style: Option<AuthStyle>,
}
impl OAuthClientConfig {
	/// Public client (no secret) starting from `token`.
	pub fn new(client_id: impl Into<String>, token: OAuthToken) -> Self {
		Self { client_id: client_id.into(), client_secret: None, token, token_url: None, auth_style: None }
	}

	/// Attaches a client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the token endpoint.
	pub fn with_token_url(mut self, url: Url) -> Self {
		self.token_url = Some(url);

		self
	}

	/// Overrides how client credentials reach the token endpoint.
	pub fn with_auth_style(mut self, style: AuthStyle) -> Self {
		self.auth_style = Some(style);

		self
	}
}
impl Debug for OAuthClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("token", &self.token)
			.field("token_url", &self.token_url)
			.field("auth_style", &self.auth_style)
			.finish()
	}
}

/// Executes the refresh-token grant against one token endpoint.
///
/// The refresher is stateless apart from its counters; the caller owns the token and
/// decides when to refresh (see [`RefreshingBearer`](crate::http::RefreshingBearer)).
pub struct TokenRefresher<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: RefreshClient,
	transport: Arc<C>,
	mapper: Arc<M>,
	token_url: Url,
	expires_in_hint: Option<Duration>,
	metrics: Arc<RefreshMetrics>,
}
impl<C, M> TokenRefresher<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a refresher for `token_url`.
	pub fn new(
		client_id: &str,
		client_secret: Option<&TokenSecret>,
		token_url: Url,
		auth_style: AuthStyle,
		transport: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let oauth_token_url = TokenUrl::new(token_url.to_string()).map_err(|source| {
			ConfigError::InvalidUrl { url: token_url.to_string(), source }
		})?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(client_id.to_owned())).set_token_uri(oauth_token_url);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}

		oauth_client = oauth_client.set_auth_type(match auth_style {
			AuthStyle::InParams => OAuthAuthType::RequestBody,
			AuthStyle::InHeader => OAuthAuthType::BasicAuth,
		});

		Ok(Self {
			oauth_client,
			transport: transport.into(),
			mapper: mapper.into(),
			token_url,
			expires_in_hint: None,
			metrics: Default::default(),
		})
	}

	/// Builds a refresher from the client config, falling back to the descriptor's OAuth options.
	pub fn from_config(
		config: &OAuthClientConfig,
		info: &ProviderInfo,
		transport: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let opts = info.oauth_opts.as_ref();
		let token_url = match &config.token_url {
			Some(url) => url.clone(),
			None => info.resolved_token_url()?,
		};
		let auth_style = config.auth_style.or(opts.map(|opts| opts.auth_style)).unwrap_or_default();
		let hint = opts
			.and_then(|opts| opts.expires_in_hint)
			.and_then(|secs| i64::try_from(secs).ok())
			.map(Duration::seconds);

		Ok(Self::new(
			&config.client_id,
			config.client_secret.as_ref(),
			token_url,
			auth_style,
			transport,
			mapper,
		)?
		.with_expires_in_hint(hint))
	}

	/// Lifetime assumed when the token endpoint omits `expires_in`.
	pub fn with_expires_in_hint(mut self, hint: Option<Duration>) -> Self {
		self.expires_in_hint = hint;

		self
	}

	/// Shares counters with other refreshers.
	pub fn with_metrics(mut self, metrics: Arc<RefreshMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Token endpoint this refresher calls.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Exchanges the refresh token carried by `current` for a new token.
	///
	/// A response without a new refresh token keeps the current one. A response without
	/// `expires_in` falls back to the configured hint, then to no expiry.
	pub async fn refresh(&self, current: &OAuthToken) -> Result<OAuthToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.exchange(current)).await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		obs::observe(KIND, result)
	}

	async fn exchange(&self, current: &OAuthToken) -> Result<OAuthToken> {
		let refresh_secret = match &current.refresh_token {
			Some(secret) if !secret.is_empty() => RefreshToken::new(secret.expose().to_owned()),
			_ => return Err(ConfigError::MissingRefreshToken.into()),
		};
		let meta = ResponseMetadataSlot::default();
		let handle = self.transport.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.mapper.as_ref()))?;

		map_refresh_response(current, response, self.expires_in_hint, OffsetDateTime::now_utc())
	}
}
impl<C, M> Debug for TokenRefresher<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("token_url", &self.token_url.as_str())
			.field("expires_in_hint", &self.expires_in_hint)
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Classification of a failed refresh grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RefreshFailure {
	InvalidGrant,
	InvalidClient,
	InsufficientScope,
	Transient,
	Unclassified,
}

fn map_refresh_response(
	current: &OAuthToken,
	response: BasicTokenResponse,
	expires_in_hint: Option<Duration>,
	issued_at: OffsetDateTime,
) -> Result<OAuthToken> {
	let expires_in = match response.expires_in() {
		Some(expires_in) => {
			let secs =
				i64::try_from(expires_in.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			if secs <= 0 {
				return Err(ConfigError::NonPositiveExpiresIn.into());
			}

			Some(Duration::seconds(secs))
		},
		None => expires_in_hint,
	};
	let scope = match response.scopes() {
		Some(scopes) =>
			ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())).map_err(ConfigError::from)?,
		None => current.scope.clone(),
	};
	let mut builder = OAuthToken::builder()
		.token_type(current.token_type.clone())
		.access_token(response.access_token().secret().to_owned())
		.issued_at(issued_at)
		.scope(scope);

	if let Some(expires_in) = expires_in {
		builder = builder.expires_in(expires_in);
	}

	match (response.refresh_token(), &current.refresh_token) {
		(Some(rotated), _) => builder = builder.refresh_token(rotated.secret().to_owned()),
		(None, Some(kept)) => builder = builder.refresh_token(kept.expose()),
		(None, None) => (),
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(source, body) => match meta_status(meta_ref) {
			// Non-JSON error pages still carry a usable status.
			Some(status) if status >= 400 => {
				let preview = truncate_preview(&String::from_utf8_lossy(&body));
				let kind = classify_body(&preview).unwrap_or_else(|| classify_status(status));

				failure_to_error(
					kind,
					format!("Token endpoint returned HTTP {status}: {preview}"),
					meta_ref,
				)
			},
			status => TransientError::TokenResponseParse { source, status }.into(),
		},
		RequestTokenError::Other(message) => TransientError::Upstream {
			message: format!("Token endpoint returned an unexpected response: {message}"),
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> Error {
	let code = response.error().as_ref();
	let description = response.error_description().map(String::as_str);
	let kind = match_exact_value(code)
		.or_else(|| description.and_then(match_exact_value))
		.or_else(|| description.and_then(classify_body))
		.or_else(|| meta_status(meta).map(classify_status))
		.unwrap_or(RefreshFailure::Unclassified);
	let message = match description {
		Some(description) => format!("{code}: {description}"),
		None => code.to_owned(),
	};

	failure_to_error(kind, message, meta)
}

fn failure_to_error(kind: RefreshFailure, reason: String, meta: Option<&ResponseMetadata>) -> Error {
	match kind {
		RefreshFailure::InvalidGrant => AuthError::InvalidGrant { reason }.into(),
		RefreshFailure::InvalidClient => AuthError::InvalidClient { reason }.into(),
		RefreshFailure::InsufficientScope => AuthError::InsufficientScope { reason }.into(),
		RefreshFailure::Transient => TransientError::Upstream {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		RefreshFailure::Unclassified =>
			AuthError::RefreshFailed { reason, status: meta_status(meta) }.into(),
	}
}

fn match_exact_value(value: &str) -> Option<RefreshFailure> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(RefreshFailure::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(RefreshFailure::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(RefreshFailure::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(RefreshFailure::Transient)
	} else {
		None
	}
}

fn classify_body(body: &str) -> Option<RefreshFailure> {
	let lowered = body.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(RefreshFailure::InvalidGrant),
		text if text.contains("invalid_client") => Some(RefreshFailure::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(RefreshFailure::InsufficientScope),
		text if text.contains("temporarily_unavailable") => Some(RefreshFailure::Transient),
		_ => None,
	}
}

fn classify_status(status: u16) -> RefreshFailure {
	match status {
		400 | 404 | 410 => RefreshFailure::InvalidGrant,
		401 => RefreshFailure::InvalidClient,
		403 => RefreshFailure::InsufficientScope,
		429 | 500..=599 => RefreshFailure::Transient,
		_ => RefreshFailure::Unclassified,
	}
}
