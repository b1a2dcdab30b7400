//! JSON codec layer over [`HttpClient`].

// crates.io
use oauth2::{
	HttpResponse,
	http::{
		HeaderMap, HeaderValue, Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::DecodeError,
	http::{HttpClient, RequestContext},
};

/// Field holding the body of a non-JSON response after [`JsonResponse::into_value`].
pub const RAW_FIELD: &str = "raw";

const APPLICATION_JSON: &str = "application/json";

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
	/// JSON body with key order preserved.
	Json(JsonValue),
	/// Non-JSON body, as received.
	Raw(Vec<u8>),
	/// No body (e.g. `204 No Content`).
	Empty,
}

/// Successful response from [`JsonClient`].
#[derive(Clone, Debug)]
pub struct JsonResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Decoded body.
	pub body: ResponseBody,
}
impl JsonResponse {
	fn from_http(response: HttpResponse) -> Result<Self> {
		let status = response.status().as_u16();
		let (parts, bytes) = response.into_parts();
		let body = if bytes.iter().all(u8::is_ascii_whitespace) {
			ResponseBody::Empty
		} else if is_json(&parts.headers) {
			let de = &mut serde_json::Deserializer::from_slice(&bytes);

			ResponseBody::Json(
				serde_path_to_error::deserialize(de)
					.map_err(|source| DecodeError::Json { status, source })?,
			)
		} else {
			ResponseBody::Raw(bytes)
		};

		Ok(Self { status, headers: parts.headers, body })
	}

	/// JSON body, if the response carried one.
	pub fn json(&self) -> Option<&JsonValue> {
		match &self.body {
			ResponseBody::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Converts the body into a value; raw bodies land under [`RAW_FIELD`].
	pub fn into_value(self) -> JsonValue {
		match self.body {
			ResponseBody::Json(value) => value,
			ResponseBody::Raw(bytes) => {
				let mut map = JsonMap::new();

				map.insert(RAW_FIELD.into(), JsonValue::String(String::from_utf8_lossy(&bytes).into()));

				JsonValue::Object(map)
			},
			ResponseBody::Empty => JsonValue::Null,
		}
	}

	/// Decodes the body into `T`, reporting the failing JSON path on mismatch.
	pub fn decode<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let status = self.status;
		let value = match self.body {
			ResponseBody::Json(value) => value,
			ResponseBody::Empty => JsonValue::Null,
			ResponseBody::Raw(_) => {
				let content_type = self
					.headers
					.get(CONTENT_TYPE)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned);

				return Err(DecodeError::ContentType { status, content_type }.into());
			},
		};

		serde_path_to_error::deserialize(value)
			.map_err(|source| DecodeError::Json { status, source }.into())
	}
}

/// JSON client: serializes request bodies and decodes responses.
#[derive(Clone, Debug)]
pub struct JsonClient {
	http: HttpClient,
}
impl JsonClient {
	/// Wraps a raw client.
	pub fn new(http: HttpClient) -> Self {
		Self { http }
	}

	/// Underlying raw client.
	pub fn http(&self) -> &HttpClient {
		&self.http
	}

	/// `GET path`.
	pub async fn get_json(
		&self,
		ctx: &RequestContext,
		path: &str,
		headers: Option<&HeaderMap>,
	) -> Result<JsonResponse> {
		self.request(ctx, Method::GET, path, headers, None).await
	}

	/// `GET path`, decoded into `T`.
	pub async fn get_as<T>(
		&self,
		ctx: &RequestContext,
		path: &str,
		headers: Option<&HeaderMap>,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.get_json(ctx, path, headers).await?.decode()
	}

	/// `POST path` with a JSON body.
	pub async fn post_json<B>(
		&self,
		ctx: &RequestContext,
		path: &str,
		body: &B,
		headers: Option<&HeaderMap>,
	) -> Result<JsonResponse>
	where
		B: ?Sized + Serialize,
	{
		self.request(ctx, Method::POST, path, headers, Some(encode(body)?)).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put_json<B>(
		&self,
		ctx: &RequestContext,
		path: &str,
		body: &B,
		headers: Option<&HeaderMap>,
	) -> Result<JsonResponse>
	where
		B: ?Sized + Serialize,
	{
		self.request(ctx, Method::PUT, path, headers, Some(encode(body)?)).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch_json<B>(
		&self,
		ctx: &RequestContext,
		path: &str,
		body: &B,
		headers: Option<&HeaderMap>,
	) -> Result<JsonResponse>
	where
		B: ?Sized + Serialize,
	{
		self.request(ctx, Method::PATCH, path, headers, Some(encode(body)?)).await
	}

	/// `DELETE path`.
	pub async fn delete(
		&self,
		ctx: &RequestContext,
		path: &str,
		headers: Option<&HeaderMap>,
	) -> Result<JsonResponse> {
		self.request(ctx, Method::DELETE, path, headers, None).await
	}

	async fn request(
		&self,
		ctx: &RequestContext,
		method: Method,
		path: &str,
		extra: Option<&HeaderMap>,
		body: Option<Vec<u8>>,
	) -> Result<JsonResponse> {
		let mut headers = HeaderMap::new();

		headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

		if body.is_some() {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
		}
		if let Some(extra) = extra {
			for name in extra.keys() {
				headers.remove(name);
			}
			for (name, value) in extra {
				headers.append(name, value.clone());
			}
		}

		let response =
			self.http.send(ctx, method, path, Some(&headers), body.unwrap_or_default()).await?;

		JsonResponse::from_http(response)
	}
}
impl From<HttpClient> for JsonClient {
	fn from(http: HttpClient) -> Self {
		Self::new(http)
	}
}

fn encode<B>(body: &B) -> Result<Vec<u8>>
where
	B: ?Sized + Serialize,
{
	serde_json::to_vec(body).map_err(|e| DecodeError::Serialize(e).into())
}

fn is_json(headers: &HeaderMap) -> bool {
	headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.split(';').next())
		.map(|mime| {
			let mime = mime.trim().to_ascii_lowercase();

			mime == APPLICATION_JSON || mime.ends_with("+json")
		})
		.unwrap_or(false)
}
