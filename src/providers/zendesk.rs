//! Zendesk Support connector: cursor-paginated and incremental reads, envelope writes.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	connector::{
		Connector, ConnectorFuture, ConnectorHandle, ListObjectMetadataResult, ReadParams,
		ReadResult, ReadResultRow, WriteParams, WriteResult,
	},
	error::ApiErrorKind,
	http::{ErrorResponse, JsonResponse, RequestContext, interpret::scalar_text},
	providers::ProviderRequirements,
};

/// Catalog identifier.
pub const PROVIDER: &str = "zendesk";
/// Option holding the API path below the instance URL.
pub const OPTION_API_PATH: &str = "apiPath";
/// Records per cursor page.
pub const PAGE_SIZE: u32 = 100;
/// Objects exposed through the cursor-based incremental export.
pub const INCREMENTAL_OBJECTS: &[&str] = &["tickets", "users"];

pub(crate) const REQUIREMENTS: ProviderRequirements =
	ProviderRequirements { workspace: true, options: &[OPTION_API_PATH] };

/// Zendesk connector over an assembled handle.
#[derive(Clone, Debug)]
pub struct ZendeskConnector {
	handle: ConnectorHandle,
	api_path: String,
}
impl ZendeskConnector {
	/// Reads the API path off `handle`.
	pub fn new(handle: ConnectorHandle) -> Result<Self> {
		handle.ensure_provider(PROVIDER)?;

		let api_path = handle.option(OPTION_API_PATH)?.trim_matches('/').to_owned();

		Ok(Self { handle, api_path })
	}

	/// Underlying handle.
	pub fn handle(&self) -> &ConnectorHandle {
		&self.handle
	}

	async fn read_page(&self, ctx: &RequestContext, params: &ReadParams) -> Result<ReadResult> {
		let incremental = params.since.is_some();

		if incremental && !INCREMENTAL_OBJECTS.contains(&params.object_name.as_str()) {
			return Err(Error::Unsupported { provider: PROVIDER.into(), operation: "incremental read" });
		}

		let url = match (&params.next_page, params.since) {
			(Some(next), _) => next.clone(),
			(None, Some(since)) => format!(
				"{}/incremental/{}/cursor.json?start_time={}",
				self.api_path,
				params.object_name,
				since.unix_timestamp()
			),
			(None, None) => {
				let query = form_urlencoded::Serializer::new(String::new())
					.append_pair("page[size]", &PAGE_SIZE.to_string())
					.finish();

				format!("{}/{}.json?{query}", self.api_path, params.object_name)
			},
		};
		let page = self.handle.client().get_json(ctx, &url, None).await?.into_value();
		let next_page = if incremental { incremental_next(&page) } else { cursor_next(&page) };
		let data = records(page, &params.object_name)
			.into_iter()
			.map(|record| ReadResultRow::project(record, &params.fields))
			.collect();

		Ok(ReadResult { data, done: next_page.is_none(), next_page })
	}

	async fn write_record(&self, ctx: &RequestContext, params: &WriteParams) -> Result<WriteResult> {
		let envelope_key = singular(&params.object_name);
		let mut envelope = JsonMap::new();

		envelope.insert(envelope_key.clone(), params.record_data.clone());

		let client = self.handle.client();
		let response = match &params.record_id {
			None => {
				let url = format!("{}/{}.json", self.api_path, params.object_name);

				client.post_json(ctx, &url, &envelope, None).await?
			},
			Some(id) => {
				let url = format!("{}/{}/{id}.json", self.api_path, params.object_name);

				client.put_json(ctx, &url, &envelope, None).await?
			},
		};
		let data = unwrap_envelope(response, &envelope_key);
		let record_id =
			data.get("id").and_then(scalar_text).or_else(|| params.record_id.clone());

		Ok(WriteResult { success: true, record_id, data })
	}
}
impl Connector for ZendeskConnector {
	fn provider(&self) -> &str {
		PROVIDER
	}

	fn list_object_metadata<'a>(
		&'a self,
		_: &'a RequestContext,
		_: &'a [String],
	) -> ConnectorFuture<'a, ListObjectMetadataResult> {
		Box::pin(async {
			Err(Error::Unsupported { provider: PROVIDER.into(), operation: "list_object_metadata" })
		})
	}

	fn read<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a ReadParams,
	) -> ConnectorFuture<'a, ReadResult> {
		Box::pin(self.read_page(ctx, params))
	}

	fn write<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a WriteParams,
	) -> ConnectorFuture<'a, WriteResult> {
		Box::pin(self.write_record(ctx, params))
	}
}

/// Classifies Zendesk error bodies.
///
/// Handles `{error, description}`, `{error: {title, message}}`, and OAuth
/// `{error, error_description}` shapes.
pub fn interpret_error(response: &ErrorResponse<'_>) -> Error {
	let mut error = response.api_error();
	let Some(JsonValue::Object(body)) = response.json() else {
		return error.into();
	};
	let (code, message) = match body.get("error") {
		Some(JsonValue::Object(nested)) => (
			nested.get("title").and_then(scalar_text),
			nested.get("message").and_then(scalar_text),
		),
		Some(value) => (
			scalar_text(value),
			body.get("description")
				.or_else(|| body.get("error_description"))
				.and_then(scalar_text),
		),
		None => (None, body.get("description").and_then(scalar_text)),
	};

	if let Some(message) = message {
		error = error.with_message(message);
	}
	if let Some(code) = code {
		if let Some(kind) = classify_code(&code) {
			error = error.with_kind(kind);
		}

		error = error.with_provider_code(code);
	}

	error.into()
}

fn classify_code(code: &str) -> Option<ApiErrorKind> {
	Some(match code {
		"RecordNotFound" | "InvalidEndpoint" => ApiErrorKind::NotFound,
		"RecordInvalid" | "InvalidValue" => ApiErrorKind::Validation,
		"invalid_token" | "Couldn't authenticate you" => ApiErrorKind::Unauthorized,
		"Forbidden" | "PermissionDenied" => ApiErrorKind::Forbidden,
		"DuplicateValue" => ApiErrorKind::Conflict,
		"TooManyRequests" => ApiErrorKind::RateLimited,
		_ => return None,
	})
}

fn cursor_next(page: &JsonValue) -> Option<String> {
	let has_more = page.pointer("/meta/has_more").and_then(JsonValue::as_bool).unwrap_or(false);

	if !has_more {
		return None;
	}

	page.pointer("/links/next").and_then(JsonValue::as_str).map(str::to_owned)
}

fn incremental_next(page: &JsonValue) -> Option<String> {
	if page.get("end_of_stream").and_then(JsonValue::as_bool).unwrap_or(true) {
		return None;
	}

	page.get("after_url").and_then(JsonValue::as_str).map(str::to_owned)
}

fn records(page: JsonValue, object: &str) -> Vec<JsonMap<String, JsonValue>> {
	let JsonValue::Object(mut page) = page else {
		return Vec::new();
	};

	match page.remove(object) {
		Some(JsonValue::Array(items)) => items
			.into_iter()
			.filter_map(|item| match item {
				JsonValue::Object(record) => Some(record),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

fn unwrap_envelope(response: JsonResponse, key: &str) -> JsonMap<String, JsonValue> {
	match response.into_value() {
		JsonValue::Object(mut body) => match body.remove(key) {
			Some(JsonValue::Object(record)) => record,
			Some(other) => {
				body.insert(key.to_owned(), other);

				body
			},
			None => body,
		},
		_ => JsonMap::new(),
	}
}

/// Envelope key for an object collection (`tickets` → `ticket`).
fn singular(object: &str) -> String {
	if let Some(stem) = object.strip_suffix("ies") {
		format!("{stem}y")
	} else if let Some(stem) = object.strip_suffix('s') {
		stem.to_owned()
	} else {
		object.to_owned()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderMap;
	use serde_json::json;
	// self
	use super::*;
	use crate::error::{ApiError, ErrorCategory};

	fn interpret(status: u16, body: &str) -> ApiError {
		let headers = HeaderMap::new();

		match interpret_error(&ErrorResponse::new(status, &headers, body.as_bytes(), None)) {
			Error::Api(error) => error,
			other => panic!("Expected an API error, got {other:?}."),
		}
	}

	#[test]
	fn flat_envelopes_are_classified() {
		let error = interpret(422, r#"{"error":"RecordInvalid","description":"Record validation errors"}"#);

		assert_eq!(error.kind, ApiErrorKind::Validation);
		assert_eq!(error.message, "Record validation errors");
		assert_eq!(error.provider_code.as_deref(), Some("RecordInvalid"));

		let error = interpret(404, r#"{"error":"RecordNotFound","description":"Not found"}"#);

		assert_eq!(error.kind, ApiErrorKind::NotFound);
	}

	#[test]
	fn nested_envelopes_are_classified() {
		let error = interpret(
			403,
			r#"{"error":{"title":"Forbidden","message":"You do not have access to this page."}}"#,
		);

		assert_eq!(error.category(), ErrorCategory::Authentication);
		assert_eq!(error.message, "You do not have access to this page.");
	}

	#[test]
	fn oauth_errors_read_the_description() {
		let error = interpret(
			401,
			r#"{"error":"invalid_token","error_description":"The access token provided is expired."}"#,
		);

		assert_eq!(error.kind, ApiErrorKind::Unauthorized);
		assert_eq!(error.message, "The access token provided is expired.");
	}

	#[test]
	fn cursor_pages_stop_without_more() {
		let more = json!({ "meta": { "has_more": true }, "links": { "next": "https://a/next" } });
		let last = json!({ "meta": { "has_more": false }, "links": { "next": "https://a/next" } });

		assert_eq!(cursor_next(&more).as_deref(), Some("https://a/next"));
		assert_eq!(cursor_next(&last), None);
	}

	#[test]
	fn incremental_pages_stop_at_end_of_stream() {
		let more = json!({ "after_url": "https://a/after", "end_of_stream": false });
		let last = json!({ "after_url": "https://a/after", "end_of_stream": true });

		assert_eq!(incremental_next(&more).as_deref(), Some("https://a/after"));
		assert_eq!(incremental_next(&last), None);
	}

	#[test]
	fn envelope_keys_are_singular() {
		assert_eq!(singular("tickets"), "ticket");
		assert_eq!(singular("ticket_fields"), "ticket_field");
		assert_eq!(singular("categories"), "category");
		assert_eq!(singular("search"), "search");
	}
}
