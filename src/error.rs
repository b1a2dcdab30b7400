//! Error taxonomy shared by the catalog, credential registry, HTTP stack, and connectors.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type JsonPathError = serde_path_to_error::Error<serde_json::Error>;

/// Coarse classification every [`Error`] falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	/// Connector construction problem (catalog, substitutions, options, credentials).
	Configuration,
	/// Credentials were rejected or could not be refreshed.
	Authentication,
	/// Provider rejected the request itself (400, 404, 405, 409, 422, ...).
	ClientRequest,
	/// Rate limiting or a transient upstream outage; safe to retry.
	Throttling,
	/// Provider failed without a structured explanation.
	Server,
	/// Response body could not be decoded.
	Decoding,
	/// Caller cancelled the request or its deadline elapsed.
	Cancellation,
	/// Network or I/O failure below HTTP.
	Transport,
}
impl ErrorCategory {
	/// Returns a stable label suitable for logs or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Configuration => "configuration",
			Self::Authentication => "authentication",
			Self::ClientRequest => "client_request",
			Self::Throttling => "throttling",
			Self::Server => "server",
			Self::Decoding => "decoding",
			Self::Cancellation => "cancellation",
			Self::Transport => "transport",
		}
	}
}
impl Display for ErrorCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem, raised while assembling a connector.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential file could not be loaded or interpreted.
	#[error(transparent)]
	Credentials(#[from] CredentialsError),
	/// Token refresh or client authentication failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Provider answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Body encoding or decoding failure.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// The request's cancel signal fired.
	#[error("Request was cancelled.")]
	Cancelled,
	/// The request's deadline elapsed before it completed.
	#[error("Request deadline exceeded.")]
	DeadlineExceeded,
	/// The connector does not implement the requested operation.
	#[error("Connector `{provider}` does not support {operation}.")]
	Unsupported {
		/// Provider identifier of the connector.
		provider: String,
		/// Operation label.
		operation: &'static str,
	},
}
impl Error {
	/// Classifies the error into the connector taxonomy.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Config(_) | Self::Credentials(_) => ErrorCategory::Configuration,
			Self::Auth(_) => ErrorCategory::Authentication,
			Self::Api(e) => e.category(),
			Self::Transient(_) => ErrorCategory::Throttling,
			Self::Transport(_) => ErrorCategory::Transport,
			Self::Decode(_) => ErrorCategory::Decoding,
			Self::Cancelled | Self::DeadlineExceeded => ErrorCategory::Cancellation,
			Self::Unsupported { .. } => ErrorCategory::ClientRequest,
		}
	}

	/// Retryability hint; `None` means the failure gives no indication either way.
	pub fn is_retryable(&self) -> Option<bool> {
		match self {
			Self::Api(e) => e.retryable,
			Self::Transient(_) => Some(true),
			Self::Transport(_) => None,
			Self::Auth(AuthError::RefreshFailed { .. }) => None,
			_ => Some(false),
		}
	}

	/// HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(e) => Some(e.status),
			Self::Auth(AuthError::RefreshFailed { status, .. }) => *status,
			Self::Transient(TransientError::Upstream { status, .. })
			| Self::Transient(TransientError::TokenResponseParse { status, .. }) => *status,
			Self::Decode(e) => e.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while assembling connectors.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header name or value is not valid HTTP.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
		/// Underlying validation failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A URL could not be converted into a request URI.
	#[error("URL `{url}` cannot be used as a request URI.")]
	InvalidUri {
		/// Offending URL text.
		url: String,
		/// Underlying conversion failure.
		#[source]
		source: oauth2::http::uri::InvalidUri,
	},
	/// Provider or workspace identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Catalog document is malformed.
	#[error("Provider catalog is malformed.")]
	Catalog {
		/// Structured parsing failure with the offending JSON path.
		#[source]
		source: JsonPathError,
	},
	/// The embedded catalog failed to load.
	#[error("Embedded provider catalog failed to load: {message}.")]
	EmbeddedCatalog {
		/// Parsing failure rendered as text.
		message: String,
	},
	/// No descriptor exists for the provider.
	#[error("Provider `{provider}` is not in the catalog.")]
	ProviderConfigNotFound {
		/// Requested provider identifier.
		provider: String,
	},
	/// The descriptor does not define the requested option.
	#[error("Provider `{provider}` does not define option `{option}`.")]
	ProviderOptionNotFound {
		/// Provider identifier.
		provider: String,
		/// Requested option key.
		option: String,
	},
	/// A consumed descriptor field still carries `{{…}}` markers after substitution.
	#[error("Field `{field}` of provider `{provider}` has unresolved placeholders: {}.", placeholders.join(", "))]
	UnresolvedSubstitution {
		/// Provider identifier.
		provider: String,
		/// Descriptor field name.
		field: String,
		/// Placeholder names left in the field.
		placeholders: Vec<String>,
	},
	/// No authenticated client (or credentials to build one) was supplied.
	#[error("Connector for `{provider}` requires an authenticated client.")]
	MissingClient {
		/// Provider identifier.
		provider: String,
	},
	/// The provider requires a workspace and none was supplied.
	#[error("Connector for `{provider}` requires a workspace.")]
	MissingWorkspace {
		/// Provider identifier.
		provider: String,
	},
	/// Supplied credentials do not match the descriptor's auth type.
	#[error("Provider `{provider}` uses {declared} auth but {supplied} credentials were supplied.")]
	AuthTypeMismatch {
		/// Provider identifier.
		provider: String,
		/// Auth type declared by the descriptor.
		declared: &'static str,
		/// Auth flavor supplied by the caller.
		supplied: &'static str,
	},
	/// The descriptor's auth type requires an options block that is absent.
	#[error("Provider `{provider}` declares {auth_type} auth without its options block.")]
	MissingAuthOptions {
		/// Provider identifier.
		provider: String,
		/// Declared auth type.
		auth_type: &'static str,
	},
	/// A provider-specific connector was built for another provider.
	#[error("Connector expects provider `{expected}` but the handle targets `{found}`.")]
	ProviderMismatch {
		/// Provider the connector implements.
		expected: &'static str,
		/// Provider the handle was built for.
		found: String,
	},
	/// Token is missing a refresh secret.
	#[error("Token is missing a refresh token.")]
	MissingRefreshToken,
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token builder validation failed.
	#[error("Unable to build OAuth token.")]
	TokenBuild(#[from] crate::auth::OAuthTokenBuilderError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a header validation failure.
	pub fn invalid_header(
		name: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::InvalidHeader { name: name.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while loading or interpreting a credential file.
#[derive(Debug, ThisError)]
pub enum CredentialsError {
	/// The credential file could not be read.
	#[error("Failed to read credential file {}.", path.display())]
	Read {
		/// Resolved credential file path.
		path: PathBuf,
		/// Underlying I/O failure.
		#[source]
		source: std::io::Error,
	},
	/// The credential file is not valid JSON.
	#[error("Failed to parse credential file {}.", path.display())]
	Parse {
		/// Resolved credential file path.
		path: PathBuf,
		/// Structured parsing failure with the offending JSON path.
		#[source]
		source: JsonPathError,
	},
	/// A field required to materialize a token is absent.
	#[error("Credential field `{field}` is missing.")]
	MissingField {
		/// Missing field key.
		field: &'static str,
	},
	/// An expiry layout contains an unsupported construct.
	#[error("Expiry layout `{layout}` is invalid: {reason}.")]
	InvalidExpiryLayout {
		/// Layout as written in the credential record.
		layout: String,
		/// Why the layout was rejected.
		reason: String,
	},
	/// An expiry value does not match its layout.
	#[error("Expiry `{value}` does not match layout `{layout}`: {reason}.")]
	InvalidExpiry {
		/// Expiry value as written in the credential record.
		value: String,
		/// Layout the value was parsed against.
		layout: String,
		/// Why parsing failed.
		reason: String,
	},
}

/// Authentication failures raised by the token refresh path.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Provider rejected the refresh token.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Refresh failed for a reason outside the OAuth error vocabulary.
	#[error("Token refresh failed: {reason}.")]
	RefreshFailed {
		/// Failure summary.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Fine-grained classification of non-2xx provider responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
	/// HTTP 400.
	BadRequest,
	/// HTTP 401 after credentials were attached.
	Unauthorized,
	/// HTTP 403.
	Forbidden,
	/// HTTP 404.
	NotFound,
	/// HTTP 405.
	MethodNotAllowed,
	/// HTTP 409.
	Conflict,
	/// HTTP 422 or a provider-reported validation failure.
	Validation,
	/// HTTP 429 or a provider-reported request limit.
	RateLimited,
	/// HTTP 502.
	BadGateway,
	/// HTTP 503.
	ServiceUnavailable,
	/// HTTP 504.
	GatewayTimeout,
	/// HTTP 500 and other 5xx statuses.
	Server,
	/// Any other non-2xx status.
	Other,
}
impl ApiErrorKind {
	/// Maps an HTTP status to its default kind.
	pub fn from_status(status: u16) -> Self {
		match status {
			400 => Self::BadRequest,
			401 => Self::Unauthorized,
			403 => Self::Forbidden,
			404 => Self::NotFound,
			405 => Self::MethodNotAllowed,
			409 => Self::Conflict,
			422 => Self::Validation,
			429 => Self::RateLimited,
			502 => Self::BadGateway,
			503 => Self::ServiceUnavailable,
			504 => Self::GatewayTimeout,
			500..=599 => Self::Server,
			_ => Self::Other,
		}
	}

	/// Returns a stable label suitable for logs or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BadRequest => "bad_request",
			Self::Unauthorized => "unauthorized",
			Self::Forbidden => "forbidden",
			Self::NotFound => "not_found",
			Self::MethodNotAllowed => "method_not_allowed",
			Self::Conflict => "conflict",
			Self::Validation => "validation",
			Self::RateLimited => "rate_limited",
			Self::BadGateway => "bad_gateway",
			Self::ServiceUnavailable => "service_unavailable",
			Self::GatewayTimeout => "gateway_timeout",
			Self::Server => "server",
			Self::Other => "other",
		}
	}

	/// Default retryability for the kind.
	pub const fn default_retryable(self) -> Option<bool> {
		match self {
			Self::RateLimited | Self::BadGateway | Self::ServiceUnavailable | Self::GatewayTimeout =>
				Some(true),
			Self::Server | Self::Other => None,
			_ => Some(false),
		}
	}
}
impl Display for ApiErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classified non-2xx response produced by an error interpreter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Provider returned HTTP {status} ({kind}): {message}.")]
pub struct ApiError {
	/// Classification of the failure.
	pub kind: ApiErrorKind,
	/// HTTP status code.
	pub status: u16,
	/// Provider-returned message, or the status reason when none was returned.
	pub message: String,
	/// Provider-specific error code (e.g. `INVALID_FIELD`).
	pub provider_code: Option<String>,
	/// Whether retrying may succeed; `None` when unknown.
	pub retryable: Option<bool>,
	/// `Retry-After` hint from upstream.
	pub retry_after: Option<Duration>,
	/// Truncated response body for diagnostics.
	pub body_preview: Option<String>,
}
impl ApiError {
	/// Builds an error classified purely from the HTTP status.
	pub fn from_status(status: u16) -> Self {
		let kind = ApiErrorKind::from_status(status);

		Self {
			kind,
			status,
			message: default_message(status),
			provider_code: None,
			retryable: kind.default_retryable(),
			retry_after: None,
			body_preview: None,
		}
	}

	/// Reclassifies the error, resetting retryability to the new kind's default.
	pub fn with_kind(mut self, kind: ApiErrorKind) -> Self {
		self.kind = kind;
		self.retryable = kind.default_retryable();

		self
	}

	/// Replaces the message with the provider-returned one.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = message.into();

		self
	}

	/// Attaches the provider-specific error code.
	pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
		self.provider_code = Some(code.into());

		self
	}

	/// Overrides the retryability flag.
	pub fn with_retryable(mut self, retryable: bool) -> Self {
		self.retryable = Some(retryable);

		self
	}

	/// Attaches a `Retry-After` hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Attaches a body preview.
	pub fn with_body_preview(mut self, preview: impl Into<String>) -> Self {
		self.body_preview = Some(preview.into());

		self
	}

	/// Taxonomy category for this response.
	pub fn category(&self) -> ErrorCategory {
		match self.kind {
			ApiErrorKind::Unauthorized | ApiErrorKind::Forbidden => ErrorCategory::Authentication,
			ApiErrorKind::BadRequest
			| ApiErrorKind::NotFound
			| ApiErrorKind::MethodNotAllowed
			| ApiErrorKind::Conflict
			| ApiErrorKind::Validation => ErrorCategory::ClientRequest,
			ApiErrorKind::RateLimited
			| ApiErrorKind::BadGateway
			| ApiErrorKind::ServiceUnavailable
			| ApiErrorKind::GatewayTimeout => ErrorCategory::Throttling,
			ApiErrorKind::Server => ErrorCategory::Server,
			ApiErrorKind::Other if (400..500).contains(&self.status) => ErrorCategory::ClientRequest,
			ApiErrorKind::Other => ErrorCategory::Server,
		}
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response or timed out.
	#[error("Upstream returned an unexpected response: {message}.")]
	Upstream {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: JsonPathError,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Body encoding and decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// A JSON response body is malformed or does not fit the requested type.
	#[error("Response body (HTTP {status}) is not valid JSON for the expected shape.")]
	Json {
		/// HTTP status of the response.
		status: u16,
		/// Structured parsing failure with the offending JSON path.
		#[source]
		source: JsonPathError,
	},
	/// The response is not JSON but JSON was required.
	#[error("Response (HTTP {status}) has content type {} instead of JSON.", content_type.as_deref().unwrap_or("<none>"))]
	ContentType {
		/// HTTP status of the response.
		status: u16,
		/// Content-Type header, when present.
		content_type: Option<String>,
	},
	/// The request body could not be serialized.
	#[error("Request body could not be serialized to JSON.")]
	Serialize(#[source] serde_json::Error),
}
impl DecodeError {
	/// HTTP status associated with the decoding failure.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Json { status, .. } | Self::ContentType { status, .. } => Some(*status),
			Self::Serialize(_) => None,
		}
	}
}

fn default_message(status: u16) -> String {
	oauth2::http::StatusCode::from_u16(status)
		.ok()
		.and_then(|code| code.canonical_reason())
		.map(str::to_owned)
		.unwrap_or_else(|| format!("HTTP status {status}"))
}
