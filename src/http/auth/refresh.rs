//! Bearer authenticator that refreshes its token on demand.

// crates.io
use oauth2::{HttpRequest, http::header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::OAuthToken,
	catalog::AuthType,
	http::{
		AuthFuture, Authenticator, HttpTransport, RefreshMetrics, TransportErrorMapper,
		auth::sensitive_value,
	},
	oauth::TokenRefresher,
};

/// Window before nominal expiry in which a token is already treated as expired.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::seconds(60);

/// OAuth2 bearer that refreshes before each request when the token is (nearly) expired.
///
/// At most one refresh is in flight at a time. Callers that arrive while a refresh is
/// running wait on the guard, then re-check the slot and reuse the fresh token instead
/// of issuing their own grant. No lock is held across an `.await` except the async guard,
/// and the slot is only written after a successful refresh, so a cancelled or failed
/// refresh leaves the previous token intact.
pub struct RefreshingBearer<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	token: RwLock<OAuthToken>,
	guard: AsyncMutex<()>,
	refresher: TokenRefresher<C, M>,
	skew: Duration,
}
impl<C, M> RefreshingBearer<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts from `token`, refreshing through `refresher`.
	pub fn new(token: OAuthToken, refresher: TokenRefresher<C, M>) -> Self {
		Self { token: RwLock::new(token), guard: AsyncMutex::new(()), refresher, skew: DEFAULT_REFRESH_SKEW }
	}

	/// Overrides the refresh skew.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = skew;

		self
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	/// Snapshot of the stored token.
	pub fn token(&self) -> OAuthToken {
		self.token.read().clone()
	}

	/// Returns a token valid beyond the skew window, refreshing if needed.
	///
	/// Tokens without a refresh secret are returned as-is; the provider decides whether
	/// they are still accepted.
	pub async fn current_token(&self) -> Result<OAuthToken> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		let _guard = self.guard.lock().await;

		if let Some(token) = self.fresh_token() {
			self.metrics().record_coalesced();

			return Ok(token);
		}

		let stale = self.token.read().clone();
		let fresh = self.refresher.refresh(&stale).await?;

		*self.token.write() = fresh.clone();

		Ok(fresh)
	}

	fn fresh_token(&self) -> Option<OAuthToken> {
		let token = self.token.read();

		(!token.needs_refresh_at(OffsetDateTime::now_utc(), self.skew)).then(|| token.clone())
	}
}
impl<C, M> Authenticator for RefreshingBearer<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn auth_type(&self) -> AuthType {
		AuthType::Oauth2
	}

	fn authorize<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a> {
		Box::pin(async move {
			let token = self.current_token().await?;
			let value = sensitive_value(AUTHORIZATION.as_str(), &token.authorization_value())?;

			request.headers_mut().insert(AUTHORIZATION, value);

			Ok(())
		})
	}
}
impl<C, M> Debug for RefreshingBearer<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshingBearer")
			.field("token", &*self.token.read())
			.field("refresher", &self.refresher)
			.field("skew", &self.skew)
			.finish()
	}
}
