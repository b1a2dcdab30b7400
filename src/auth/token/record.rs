//! Refreshable OAuth token record, lifecycle helpers, and builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Token type attached when the provider does not name one.
pub const BEARER: &str = "Bearer";

/// Lifecycle status for an [`OAuthToken`] relative to a refresh skew.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token carries no expiry and is treated as permanently valid.
	NonExpiring,
	/// Token is valid beyond the skew window.
	Active,
	/// Token is still valid but expires within the skew window.
	Expiring,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`OAuthTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum OAuthTokenBuilderError {
	/// Neither an access token nor a refresh token was provided.
	#[error("Either an access token or a refresh token is required.")]
	MissingSecret,
}

/// OAuth token owned by the authenticating layer.
///
/// A token without a refresh secret is never refreshed; when it also lacks an
/// expiry it is valid forever. A token with a refresh secret is refreshed once
/// its expiry falls inside the skew window.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthToken {
	/// Token type, `Bearer` unless the provider says otherwise.
	pub token_type: String,
	/// Access token secret; empty when only a refresh token is known.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant, if known.
	pub expiry: Option<OffsetDateTime>,
	/// Scopes granted to the token.
	#[serde(default)]
	pub scope: ScopeSet,
}
impl OAuthToken {
	/// Returns a builder.
	pub fn builder() -> OAuthTokenBuilder {
		OAuthTokenBuilder::default()
	}

	/// Creates a bearer token without refresh secret or expiry.
	pub fn bearer(access_token: impl Into<String>) -> Self {
		Self {
			token_type: BEARER.into(),
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			expiry: None,
			scope: ScopeSet::default(),
		}
	}

	/// Returns `true` when a non-empty refresh secret is present.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_empty())
	}

	/// Computes the lifecycle status at `instant`; the skew bound is inclusive.
	pub fn status_at(&self, instant: OffsetDateTime, skew: Duration) -> TokenStatus {
		match self.expiry {
			None => TokenStatus::NonExpiring,
			Some(expiry) if expiry <= instant => TokenStatus::Expired,
			Some(expiry) if expiry <= instant + skew => TokenStatus::Expiring,
			Some(_) => TokenStatus::Active,
		}
	}

	/// Returns `true` when the token must be refreshed before use at `instant`.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		self.can_refresh()
			&& matches!(self.status_at(instant, skew), TokenStatus::Expired | TokenStatus::Expiring)
	}

	/// Renders the `Authorization` header value.
	pub fn authorization_value(&self) -> String {
		let token_type = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case(BEARER)
		{
			BEARER
		} else {
			self.token_type.as_str()
		};

		format!("{token_type} {}", self.access_token.expose())
	}
}
impl PartialEq for OAuthToken {
	fn eq(&self, other: &Self) -> bool {
		self.token_type == other.token_type
			&& self.access_token == other.access_token
			&& self.refresh_token == other.refresh_token
			&& self.expiry == other.expiry
			&& self.scope == other.scope
	}
}
impl Eq for OAuthToken {}
impl Debug for OAuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthToken")
			.field("token_type", &self.token_type)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expiry", &self.expiry)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Builder for [`OAuthToken`].
#[derive(Clone, Debug, Default)]
pub struct OAuthTokenBuilder {
	token_type: Option<String>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scope: ScopeSet,
}
impl OAuthTokenBuilder {
	/// Overrides the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the instant relative expiries are measured from; defaults to now.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Consumes the builder and produces an [`OAuthToken`].
	pub fn build(self) -> Result<OAuthToken, OAuthTokenBuilderError> {
		let refresh_token = self.refresh_token.filter(|secret| !secret.is_empty());
		let access_token = match (self.access_token, &refresh_token) {
			(Some(access), _) if !access.is_empty() => access,
			(_, Some(_)) => TokenSecret::new(""),
			_ => return Err(OAuthTokenBuilderError::MissingSecret),
		};
		let expiry = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(self.issued_at.unwrap_or_else(OffsetDateTime::now_utc) + delta),
			(None, None) => None,
		};

		Ok(OAuthToken {
			token_type: self.token_type.unwrap_or_else(|| BEARER.into()),
			access_token,
			refresh_token,
			expiry,
			scope: self.scope,
		})
	}
}
