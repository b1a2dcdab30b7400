//! Raw client: base URL resolution, authentication, dispatch, and error interpretation.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{HeaderMap, Method, Uri},
};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{
		Authenticator, DefaultErrorInterpreter, ErrorInterpreter, ErrorResponse, HttpTransport,
		NoAuth, RequestContext, ResponseMetadataSlot, TransportErrorMapper, parse_retry_after,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestTransport, ReqwestTransportErrorMapper};

type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Object-safe view over a transport and its error mapper.
trait Dispatch
where
	Self: 'static + Send + Sync,
{
	fn dispatch(&self, request: HttpRequest) -> DispatchFuture<'_>;
}

struct Transported<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	transport: Arc<C>,
	mapper: Arc<M>,
}
impl<C, M> Dispatch for Transported<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn dispatch(&self, request: HttpRequest) -> DispatchFuture<'_> {
		Box::pin(async move {
			let meta = ResponseMetadataSlot::default();
			let handle = self.transport.with_metadata(meta.clone());

			handle
				.call(request)
				.await
				.map_err(|e| self.mapper.map_transport_error(meta.take().as_ref(), e))
		})
	}
}

/// Authenticated HTTP client bound to one provider.
///
/// Cloning is cheap; clones share the transport, authenticator, and interpreter.
#[derive(Clone)]
pub struct HttpClient {
	dispatch: Arc<dyn Dispatch>,
	authenticator: Arc<dyn Authenticator>,
	interpreter: Arc<dyn ErrorInterpreter>,
	base: Option<String>,
}
impl HttpClient {
	/// Unauthenticated client over `transport` with the default error interpreter.
	pub fn new<C, M>(transport: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		Self {
			dispatch: Arc::new(Transported { transport: transport.into(), mapper: mapper.into() }),
			authenticator: Arc::new(NoAuth),
			interpreter: Arc::new(DefaultErrorInterpreter),
			base: None,
		}
	}

	/// Replaces the authenticating layer.
	pub fn with_authenticator(self, authenticator: impl Authenticator) -> Self {
		self.with_shared_authenticator(Arc::new(authenticator))
	}

	/// Replaces the authenticating layer with one shared elsewhere.
	pub fn with_shared_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
		self.authenticator = authenticator;

		self
	}

	/// Replaces the error interpreter.
	pub fn with_error_interpreter(self, interpreter: impl ErrorInterpreter) -> Self {
		self.with_shared_error_interpreter(Arc::new(interpreter))
	}

	/// Replaces the error interpreter with one shared elsewhere.
	pub fn with_shared_error_interpreter(mut self, interpreter: Arc<dyn ErrorInterpreter>) -> Self {
		self.interpreter = interpreter;

		self
	}

	/// Sets the prefix prepended to relative paths.
	pub fn with_base(mut self, base: impl Into<String>) -> Self {
		self.base = Some(base.into());

		self
	}

	/// Prefix prepended to relative paths.
	pub fn base(&self) -> Option<&str> {
		self.base.as_deref()
	}

	/// Active authenticating layer.
	pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
		&self.authenticator
	}

	/// Active error interpreter.
	pub fn error_interpreter(&self) -> &Arc<dyn ErrorInterpreter> {
		&self.interpreter
	}

	/// Resolves `path` against the base.
	///
	/// Absolute `http(s)` URLs pass through untouched. Relative paths are joined to the
	/// base with exactly one `/` between them.
	pub fn resolve_url(&self, path: &str) -> Result<Url> {
		if path.starts_with("http://") || path.starts_with("https://") {
			return parse_url(path);
		}

		let Some(base) = self.base.as_deref() else {
			return Err(ConfigError::InvalidUrl {
				url: path.to_owned(),
				source: url::ParseError::RelativeUrlWithoutBase,
			}
			.into());
		};
		let base = base.trim_end_matches('/');
		let path = path.trim_start_matches('/');

		if path.is_empty() {
			parse_url(base)
		} else if path.starts_with('?') {
			parse_url(&format!("{base}{path}"))
		} else {
			parse_url(&format!("{base}/{path}"))
		}
	}

	/// Builds and executes a request for `path`.
	pub async fn send(
		&self,
		ctx: &RequestContext,
		method: Method,
		path: &str,
		headers: Option<&HeaderMap>,
		body: Vec<u8>,
	) -> Result<HttpResponse> {
		let url = self.resolve_url(path)?;
		let mut request = HttpRequest::new(body);

		*request.method_mut() = method;
		*request.uri_mut() = Uri::try_from(url.as_str())
			.map_err(|source| ConfigError::InvalidUri { url: url.to_string(), source })?;

		if let Some(headers) = headers {
			for (name, value) in headers {
				request.headers_mut().append(name, value.clone());
			}
		}

		self.execute(ctx, request).await
	}

	/// Authenticates and dispatches a prepared request.
	///
	/// Non-2xx responses are handed to the error interpreter and returned as errors; the
	/// request is never retried. The context's deadline and cancel signal cover both the
	/// authentication step (including any token refresh) and the dispatch.
	pub async fn execute(&self, ctx: &RequestContext, request: HttpRequest) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(ctx.run(self.authorize_and_dispatch(request))).await;

		obs::observe(KIND, result)
	}

	async fn authorize_and_dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		self.authenticator.authorize(&mut request).await?;

		let response = self.dispatch.dispatch(request).await?;

		self.check(response)
	}

	fn check(&self, response: HttpResponse) -> Result<HttpResponse> {
		if response.status().is_success() {
			return Ok(response);
		}

		let headers = response.headers();
		let failure = ErrorResponse::new(
			response.status().as_u16(),
			headers,
			response.body(),
			parse_retry_after(headers),
		);

		Err(self.interpreter.interpret(&failure))
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient {
	/// Unauthenticated client over a fresh reqwest transport.
	pub fn reqwest() -> Self {
		Self::new::<ReqwestTransport, ReqwestTransportErrorMapper>(
			ReqwestTransport::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl Debug for HttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpClient")
			.field("base", &self.base)
			.field("auth_type", &self.authenticator.auth_type())
			.finish_non_exhaustive()
	}
}

fn parse_url(raw: &str) -> Result<Url> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { url: raw.to_owned(), source }.into())
}
