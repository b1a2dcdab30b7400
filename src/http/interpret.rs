//! Conversion of non-2xx responses into classified errors.

// crates.io
use oauth2::http::{HeaderMap, header::CONTENT_TYPE};
// self
use crate::{_prelude::*, error::ApiError};

const PREVIEW_LIMIT: usize = 256;

/// Borrowed view of a non-2xx response handed to an [`ErrorInterpreter`].
#[derive(Clone, Copy, Debug)]
pub struct ErrorResponse<'a> {
	status: u16,
	headers: &'a HeaderMap,
	body: &'a [u8],
	retry_after: Option<Duration>,
}
impl<'a> ErrorResponse<'a> {
	/// Wraps the parts of a failed response.
	pub fn new(
		status: u16,
		headers: &'a HeaderMap,
		body: &'a [u8],
		retry_after: Option<Duration>,
	) -> Self {
		Self { status, headers, body, retry_after }
	}

	/// HTTP status code.
	pub fn status(&self) -> u16 {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &'a HeaderMap {
		self.headers
	}

	/// Raw response body.
	pub fn body(&self) -> &'a [u8] {
		self.body
	}

	/// Parsed `Retry-After` hint.
	pub fn retry_after(&self) -> Option<Duration> {
		self.retry_after
	}

	/// Content-Type header value.
	pub fn content_type(&self) -> Option<&'a str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	/// Parses the body as JSON, ignoring the content type.
	pub fn json(&self) -> Option<JsonValue> {
		serde_json::from_slice(self.body).ok()
	}

	/// Body text truncated for diagnostics.
	pub fn body_preview(&self) -> Option<String> {
		let text = String::from_utf8_lossy(self.body);
		let text = text.trim();

		if text.is_empty() {
			return None;
		}

		Some(truncate_preview(text))
	}

	/// Status-derived [`ApiError`] with the retry hint and body preview attached.
	///
	/// Interpreters start from this value and enrich it with provider context.
	pub fn api_error(&self) -> ApiError {
		let error = ApiError::from_status(self.status).with_retry_after(self.retry_after);

		match self.body_preview() {
			Some(preview) => error.with_body_preview(preview),
			None => error,
		}
	}
}

/// Converts a non-2xx response into an [`Error`].
///
/// Implemented for plain functions and closures, so connectors can install
/// `fn(&ErrorResponse) -> Error` values directly.
pub trait ErrorInterpreter
where
	Self: 'static + Send + Sync,
{
	/// Classifies the response.
	fn interpret(&self, response: &ErrorResponse<'_>) -> Error;
}
impl<F> ErrorInterpreter for F
where
	F: 'static + Send + Sync + Fn(&ErrorResponse<'_>) -> Error,
{
	fn interpret(&self, response: &ErrorResponse<'_>) -> Error {
		self(response)
	}
}

/// Parses the generic `{error, message, code}` envelope.
///
/// `error` may be a string or a nested object carrying `message` and `code`.
/// Anything unparseable falls back to status-only classification.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorInterpreter;
impl ErrorInterpreter for DefaultErrorInterpreter {
	fn interpret(&self, response: &ErrorResponse<'_>) -> Error {
		let mut error = response.api_error();

		if let Some(JsonValue::Object(envelope)) = response.json() {
			let (message, code) = read_envelope(&envelope);

			if let Some(message) = message {
				error = error.with_message(message);
			}
			if let Some(code) = code {
				error = error.with_provider_code(code);
			}
		}

		error.into()
	}
}

fn read_envelope(envelope: &JsonMap<String, JsonValue>) -> (Option<String>, Option<String>) {
	let mut message = envelope.get("message").and_then(scalar_text);
	let mut code = envelope.get("code").and_then(scalar_text);

	match envelope.get("error") {
		Some(JsonValue::Object(nested)) => {
			let (nested_message, nested_code) = read_envelope(nested);

			message = message.or(nested_message);
			code = code.or(nested_code);
		},
		Some(value) => {
			if let Some(text) = scalar_text(value) {
				// `{error: "not_found"}` alone is the message; next to `message` it is the code.
				if message.is_none() {
					message = Some(text);
				} else if code.is_none() {
					code = Some(text);
				}
			}
		},
		None => (),
	}

	(message, code)
}

pub(crate) fn scalar_text(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
		JsonValue::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

pub(crate) fn truncate_preview(body: &str) -> String {
	let mut preview = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= PREVIEW_LIMIT {
			preview.push('…');

			break;
		}

		preview.push(ch);
	}

	preview
}
