//! Authenticating layer: attaches credentials to outbound requests.
//!
//! Exactly one [`Authenticator`] sits between the raw client and the transport. All
//! schemes except [`RefreshingBearer`] are stateless and resolve immediately.

pub mod metrics;
pub mod refresh;

pub use metrics::*;
pub use refresh::*;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::{
	HttpRequest,
	http::{HeaderName, HeaderValue, Uri, header::AUTHORIZATION},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{OAuthToken, TokenSecret},
	catalog::AuthType,
	error::ConfigError,
};

/// Boxed future returned by [`Authenticator::authorize`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Attaches credentials to a request before it reaches the transport.
pub trait Authenticator
where
	Self: 'static + Send + Sync,
{
	/// Catalog auth type this scheme satisfies.
	fn auth_type(&self) -> AuthType;

	/// Mutates `request` so the provider accepts it.
	///
	/// Dropping the returned future must leave the authenticator in a consistent state.
	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a>;
}

/// Leaves requests untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;
impl Authenticator for NoAuth {
	fn auth_type(&self) -> AuthType {
		AuthType::None
	}

	fn authorize<'a>(&'a self, _: &'a mut HttpRequest) -> AuthFuture<'a> {
		Box::pin(async { Ok(()) })
	}
}

/// `Authorization: Basic base64(username:password)`.
#[derive(Clone)]
pub struct BasicAuth {
	header: HeaderValue,
}
impl BasicAuth {
	/// Encodes the credential pair once.
	pub fn new(username: &str, password: &TokenSecret) -> Result<Self> {
		let encoded = STANDARD.encode(format!("{username}:{}", password.expose()));

		Ok(Self { header: sensitive_value(AUTHORIZATION.as_str(), &format!("Basic {encoded}"))? })
	}
}
impl Authenticator for BasicAuth {
	fn auth_type(&self) -> AuthType {
		AuthType::Basic
	}

	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a> {
		request.headers_mut().insert(AUTHORIZATION, self.header.clone());

		Box::pin(async { Ok(()) })
	}
}
impl Debug for BasicAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("BasicAuth(<redacted>)")
	}
}

/// API key sent in a request header, optionally prefixed (`Klaviyo-API-Key pk_…`).
#[derive(Clone)]
pub struct ApiKeyHeader {
	name: HeaderName,
	value: HeaderValue,
}
impl ApiKeyHeader {
	/// Validates the header name and the prefixed value.
	pub fn new(name: &str, prefix: &str, key: &TokenSecret) -> Result<Self> {
		let header_name =
			HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::invalid_header(name, e))?;
		let value = sensitive_value(name, &format!("{prefix}{}", key.expose()))?;

		Ok(Self { name: header_name, value })
	}

	/// Header carrying the key.
	pub fn header_name(&self) -> &HeaderName {
		&self.name
	}
}
impl Authenticator for ApiKeyHeader {
	fn auth_type(&self) -> AuthType {
		AuthType::ApiKey
	}

	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a> {
		request.headers_mut().insert(self.name.clone(), self.value.clone());

		Box::pin(async { Ok(()) })
	}
}
impl Debug for ApiKeyHeader {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiKeyHeader").field("name", &self.name).finish_non_exhaustive()
	}
}

/// API key sent as a query parameter.
///
/// Existing parameters keep their order and encoding; any parameter already named like
/// the key is dropped so the key appears exactly once.
#[derive(Clone)]
pub struct ApiKeyQuery {
	name: String,
	key: TokenSecret,
}
impl ApiKeyQuery {
	/// Creates the scheme for parameter `name`.
	pub fn new(name: impl Into<String>, key: TokenSecret) -> Self {
		Self { name: name.into(), key }
	}

	/// Query parameter carrying the key.
	pub fn param_name(&self) -> &str {
		&self.name
	}

	fn rewrite(&self, request: &mut HttpRequest) -> Result<()> {
		let raw = request.uri().to_string();
		let mut url =
			Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { url: raw.clone(), source })?;
		let mut params = url
			.query()
			.unwrap_or_default()
			.split('&')
			.filter(|param| !param.is_empty())
			.filter(|param| {
				form_urlencoded::parse(param.as_bytes())
					.next()
					.is_none_or(|(name, _)| name != self.name.as_str())
			})
			.map(str::to_owned)
			.collect::<Vec<_>>();

		params.push(
			form_urlencoded::Serializer::new(String::new())
				.append_pair(&self.name, self.key.expose())
				.finish(),
		);
		url.set_query(Some(&params.join("&")));

		*request.uri_mut() = Uri::try_from(url.as_str())
			.map_err(|source| ConfigError::InvalidUri { url: redact_query(&url), source })?;

		Ok(())
	}
}
impl Authenticator for ApiKeyQuery {
	fn auth_type(&self) -> AuthType {
		AuthType::ApiKey
	}

	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a> {
		let result = self.rewrite(request);

		Box::pin(async move { result })
	}
}
impl Debug for ApiKeyQuery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiKeyQuery").field("name", &self.name).finish_non_exhaustive()
	}
}

/// Bearer token without refresh; a rejected token surfaces as the provider's 401.
#[derive(Clone)]
pub struct StaticBearer {
	value: HeaderValue,
}
impl StaticBearer {
	/// Wraps the token's access secret.
	pub fn new(token: &OAuthToken) -> Result<Self> {
		Ok(Self { value: sensitive_value(AUTHORIZATION.as_str(), &token.authorization_value())? })
	}
}
impl Authenticator for StaticBearer {
	fn auth_type(&self) -> AuthType {
		AuthType::Oauth2
	}

	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a> {
		request.headers_mut().insert(AUTHORIZATION, self.value.clone());

		Box::pin(async { Ok(()) })
	}
}
impl Debug for StaticBearer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StaticBearer(<redacted>)")
	}
}

pub(crate) fn sensitive_value(name: &str, value: &str) -> Result<HeaderValue> {
	let mut header = HeaderValue::from_str(value).map_err(|e| ConfigError::invalid_header(name, e))?;

	header.set_sensitive(true);

	Ok(header)
}

fn redact_query(url: &Url) -> String {
	let mut redacted = url.clone();

	redacted.set_query(None);

	redacted.into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn request(uri: &str) -> HttpRequest {
		let mut request = HttpRequest::new(Vec::new());

		*request.uri_mut() = Uri::try_from(uri).expect("Fixture URI should parse.");

		request
	}

	async fn authorize(auth: &dyn Authenticator, uri: &str) -> HttpRequest {
		let mut request = request(uri);

		auth.authorize(&mut request).await.expect("Authorization should succeed.");

		request
	}

	#[tokio::test]
	async fn basic_auth_encodes_credentials() {
		let auth = BasicAuth::new("user", &TokenSecret::new("pass")).expect("Header should build.");
		let request = authorize(&auth, "https://example.com/x").await;
		let header = &request.headers()[AUTHORIZATION];

		assert_eq!(header, "Basic dXNlcjpwYXNz");
		assert!(header.is_sensitive());
	}

	#[tokio::test]
	async fn api_key_header_applies_prefix() {
		let auth = ApiKeyHeader::new("Authorization", "Klaviyo-API-Key ", &TokenSecret::new("pk_1"))
			.expect("Header should build.");
		let request = authorize(&auth, "https://a.klaviyo.com/api/lists").await;

		assert_eq!(request.headers()[AUTHORIZATION], "Klaviyo-API-Key pk_1");
	}

	#[test]
	fn api_key_header_rejects_invalid_names() {
		let err = ApiKeyHeader::new("bad header", "", &TokenSecret::new("k"))
			.expect_err("Spaces are not valid in header names.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidHeader { .. })));
	}

	#[tokio::test]
	async fn api_key_query_preserves_existing_params() {
		let auth = ApiKeyQuery::new("api_token", TokenSecret::new("s3cr3t"));
		let request = authorize(&auth, "https://api.pipedrive.com/v1/deals?start=0&limit=50").await;

		assert_eq!(
			request.uri().to_string(),
			"https://api.pipedrive.com/v1/deals?start=0&limit=50&api_token=s3cr3t"
		);
	}

	#[tokio::test]
	async fn api_key_query_sets_key_exactly_once() {
		let auth = ApiKeyQuery::new("api_token", TokenSecret::new("fresh"));
		let request =
			authorize(&auth, "https://api.pipedrive.com/v1/deals?api_token=old&q=a%20b&api_token=x")
				.await;
		let query = request.uri().query().expect("Query should be present.");

		assert_eq!(query, "q=a%20b&api_token=fresh");
		assert_eq!(query.matches("api_token=").count(), 1);
	}

	#[tokio::test]
	async fn api_key_query_without_existing_query() {
		let auth = ApiKeyQuery::new("key", TokenSecret::new("a b"));
		let request = authorize(&auth, "https://example.com/items").await;

		assert_eq!(request.uri().query(), Some("key=a+b"));
	}

	#[tokio::test]
	async fn static_bearer_and_no_auth() {
		let bearer = StaticBearer::new(&OAuthToken::bearer("tok")).expect("Header should build.");
		let with_bearer = authorize(&bearer, "https://example.com/").await;
		let without = authorize(&NoAuth, "https://example.com/").await;

		assert_eq!(with_bearer.headers()[AUTHORIZATION], "Bearer tok");
		assert!(without.headers().get(AUTHORIZATION).is_none());
		assert_eq!(bearer.auth_type(), AuthType::Oauth2);
		assert!(!format!("{bearer:?}").contains("tok"));
	}
}
