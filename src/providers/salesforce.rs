//! Salesforce REST connector: sObject describe, SOQL reads, and sObject writes.

// crates.io
use time::UtcOffset;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	connector::{
		Connector, ConnectorFuture, ConnectorHandle, ListObjectMetadataResult, ObjectMetadata,
		ReadParams, ReadResult, ReadResultRow, WriteParams, WriteResult,
	},
	error::ApiErrorKind,
	http::{ErrorResponse, RequestContext, interpret::scalar_text},
	providers::{ProviderRequirements, is_fatal},
};

/// Catalog identifier.
pub const PROVIDER: &str = "salesforce";
/// Option holding the versioned REST root (`https://acme.salesforce.com/services/data/v59.0`).
pub const OPTION_REST_API_URL: &str = "restApiUrl";
/// Option holding the instance host.
pub const OPTION_DOMAIN: &str = "domain";

pub(crate) const REQUIREMENTS: ProviderRequirements =
	ProviderRequirements { workspace: false, options: &[OPTION_REST_API_URL, OPTION_DOMAIN] };

/// Field compared against `since` for incremental reads.
const MODIFIED_FIELD: &str = "SystemModstamp";
/// Projection used when the caller names no fields.
const DEFAULT_PROJECTION: &str = "FIELDS(STANDARD)";

#[derive(Debug, Deserialize)]
struct Describe {
	label: String,
	#[serde(default)]
	fields: Vec<DescribeField>,
}

#[derive(Debug, Deserialize)]
struct DescribeField {
	name: String,
	label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
	done: bool,
	#[serde(default)]
	next_records_url: Option<String>,
	#[serde(default)]
	records: Vec<JsonMap<String, JsonValue>>,
}

/// Salesforce connector over an assembled handle.
#[derive(Clone, Debug)]
pub struct SalesforceConnector {
	handle: ConnectorHandle,
	rest_api_url: String,
	domain: String,
}
impl SalesforceConnector {
	/// Reads the REST root and instance domain off `handle`.
	pub fn new(handle: ConnectorHandle) -> Result<Self> {
		handle.ensure_provider(PROVIDER)?;

		let rest_api_url = handle.option(OPTION_REST_API_URL)?.trim_end_matches('/').to_owned();
		let domain = handle.option(OPTION_DOMAIN)?.to_owned();

		Ok(Self { handle, rest_api_url, domain })
	}

	/// Underlying handle.
	pub fn handle(&self) -> &ConnectorHandle {
		&self.handle
	}

	/// Versioned REST root.
	pub fn rest_api_url(&self) -> &str {
		&self.rest_api_url
	}

	/// Instance host.
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Describes one sObject.
	pub async fn describe(&self, ctx: &RequestContext, object: &str) -> Result<ObjectMetadata> {
		let url = self.rest_url(&format!("sobjects/{object}/describe"));
		let describe = self.handle.client().get_as::<Describe>(ctx, &url, None).await?;

		Ok(ObjectMetadata {
			display_name: describe.label,
			fields: describe.fields.into_iter().map(|field| (field.name, field.label)).collect(),
		})
	}

	async fn list(&self, ctx: &RequestContext, objects: &[String]) -> Result<ListObjectMetadataResult> {
		let mut outcome = ListObjectMetadataResult::default();

		for object in objects {
			match self.describe(ctx, object).await {
				Ok(metadata) => {
					outcome.result.insert(object.clone(), metadata);
				},
				Err(e) if is_fatal(&e) => return Err(e),
				Err(e) => {
					outcome.errors.insert(object.clone(), e);
				},
			}
		}

		Ok(outcome)
	}

	async fn read_page(&self, ctx: &RequestContext, params: &ReadParams) -> Result<ReadResult> {
		// `nextRecordsUrl` is instance-relative, so it resolves against the handle's base URL.
		let url = match &params.next_page {
			Some(next) => next.clone(),
			None => {
				let query = form_urlencoded::Serializer::new(String::new())
					.append_pair("q", &soql(params))
					.finish();

				format!("{}?{query}", self.rest_url("query"))
			},
		};
		let page = self.handle.client().get_as::<QueryPage>(ctx, &url, None).await?;
		let next_page = if page.done { None } else { page.next_records_url };

		Ok(ReadResult {
			data: page
				.records
				.into_iter()
				.map(|record| ReadResultRow::project(record, &params.fields))
				.collect(),
			done: next_page.is_none(),
			next_page,
		})
	}

	async fn write_record(&self, ctx: &RequestContext, params: &WriteParams) -> Result<WriteResult> {
		let client = self.handle.client();

		match &params.record_id {
			None => {
				let url = self.rest_url(&format!("sobjects/{}", params.object_name));
				let data = into_object(client.post_json(ctx, &url, &params.record_data, None).await?.into_value());
				let record_id = data.get("id").and_then(JsonValue::as_str).map(str::to_owned);
				let success = data.get("success").and_then(JsonValue::as_bool).unwrap_or(true);

				Ok(WriteResult { success, record_id, data })
			},
			Some(id) => {
				let url = self.rest_url(&format!("sobjects/{}/{id}", params.object_name));
				let data =
					into_object(client.patch_json(ctx, &url, &params.record_data, None).await?.into_value());

				Ok(WriteResult { success: true, record_id: Some(id.clone()), data })
			},
		}
	}

	fn rest_url(&self, path: &str) -> String {
		format!("{}/{}", self.rest_api_url, path.trim_start_matches('/'))
	}
}
impl Connector for SalesforceConnector {
	fn provider(&self) -> &str {
		PROVIDER
	}

	fn list_object_metadata<'a>(
		&'a self,
		ctx: &'a RequestContext,
		objects: &'a [String],
	) -> ConnectorFuture<'a, ListObjectMetadataResult> {
		Box::pin(self.list(ctx, objects))
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

/// Classifies Salesforce's `[{errorCode, message}]` bodies.
///
/// OAuth-style `{error, error_description}` bodies (returned for expired sessions on some
/// endpoints) are read as well; anything else falls back to the status.
pub fn interpret_error(response: &ErrorResponse<'_>) -> Error {
	let mut error = response.api_error();
	let first = match response.json() {
		Some(JsonValue::Array(items)) => items.into_iter().next(),
		Some(object @ JsonValue::Object(_)) => Some(object),
		_ => None,
	};

	if let Some(JsonValue::Object(item)) = first {
		let code = item.get("errorCode").or_else(|| item.get("error")).and_then(scalar_text);
		let message =
			item.get("message").or_else(|| item.get("error_description")).and_then(scalar_text);

		if let Some(message) = message {
			error = error.with_message(message);
		}
		if let Some(code) = code {
			if let Some(kind) = classify_code(&code) {
				error = error.with_kind(kind);
			}

			error = error.with_provider_code(code);
		}
	}

	error.into()
}

fn classify_code(code: &str) -> Option<ApiErrorKind> {
	Some(match code {
		"REQUEST_LIMIT_EXCEEDED" => ApiErrorKind::RateLimited,
		"INVALID_SESSION_ID" | "invalid_grant" => ApiErrorKind::Unauthorized,
		"INSUFFICIENT_ACCESS" | "INSUFFICIENT_ACCESS_OR_READONLY" | "API_DISABLED_FOR_ORG" =>
			ApiErrorKind::Forbidden,
		"NOT_FOUND" | "ENTITY_IS_DELETED" | "INVALID_TYPE" => ApiErrorKind::NotFound,
		"METHOD_NOT_ALLOWED" => ApiErrorKind::MethodNotAllowed,
		"DUPLICATE_VALUE" | "DUPLICATES_DETECTED" => ApiErrorKind::Conflict,
		"INVALID_FIELD" | "MALFORMED_QUERY" | "MALFORMED_ID" | "INVALID_QUERY_FILTER_OPERATOR"
		| "INVALID_QUERY_LOCATOR" | "JSON_PARSER_ERROR" => ApiErrorKind::BadRequest,
		"REQUIRED_FIELD_MISSING"
		| "FIELD_CUSTOM_VALIDATION_EXCEPTION"
		| "FIELD_INTEGRITY_EXCEPTION"
		| "INVALID_FIELD_FOR_INSERT_UPDATE"
		| "INVALID_EMAIL_ADDRESS"
		| "STRING_TOO_LONG" => ApiErrorKind::Validation,
		"SERVER_UNAVAILABLE" => ApiErrorKind::ServiceUnavailable,
		_ => return None,
	})
}

fn soql(params: &ReadParams) -> String {
	let projection =
		if params.fields.is_empty() { DEFAULT_PROJECTION.to_owned() } else { params.fields.join(",") };
	let mut query = format!("SELECT {projection} FROM {}", params.object_name);

	if let Some(since) = params.since {
		query.push_str(&format!(" WHERE {MODIFIED_FIELD} > {}", soql_datetime(since)));
	}

	query
}

/// SOQL datetime literal in UTC with whole seconds.
fn soql_datetime(instant: OffsetDateTime) -> String {
	let utc = instant.to_offset(UtcOffset::UTC);

	format!(
		"{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
		utc.year(),
		u8::from(utc.month()),
		utc.day(),
		utc.hour(),
		utc.minute(),
		utc.second()
	)
}

fn into_object(value: JsonValue) -> JsonMap<String, JsonValue> {
	match value {
		JsonValue::Object(map) => map,
		_ => JsonMap::new(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderMap;
	use time::macros::datetime;
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
	fn soql_filters_on_the_modification_stamp() {
		let params = ReadParams::new("Account")
			.with_fields(["Id", "Name"])
			.with_since(datetime!(2024-03-05 10:20:30.5 +02:00));

		assert_eq!(
			soql(&params),
			"SELECT Id,Name FROM Account WHERE SystemModstamp > 2024-03-05T08:20:30Z"
		);
		assert_eq!(soql(&ReadParams::new("Lead")), "SELECT FIELDS(STANDARD) FROM Lead");
	}

	#[test]
	fn request_limit_is_throttling() {
		let error = interpret(
			403,
			r#"[{"message":"TotalRequests Limit exceeded.","errorCode":"REQUEST_LIMIT_EXCEEDED"}]"#,
		);

		assert_eq!(error.kind, ApiErrorKind::RateLimited);
		assert_eq!(error.category(), ErrorCategory::Throttling);
		assert_eq!(error.retryable, Some(true));
		assert_eq!(error.status, 403);
		assert_eq!(error.provider_code.as_deref(), Some("REQUEST_LIMIT_EXCEEDED"));
	}

	#[test]
	fn field_errors_keep_the_provider_message() {
		let error = interpret(
			400,
			r#"[{"message":"No such column 'Foo' on entity 'Account'.","errorCode":"INVALID_FIELD","fields":[]}]"#,
		);

		assert_eq!(error.kind, ApiErrorKind::BadRequest);
		assert_eq!(error.message, "No such column 'Foo' on entity 'Account'.");
	}

	#[test]
	fn expired_sessions_are_authentication_failures() {
		let error = interpret(
			401,
			r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#,
		);

		assert_eq!(error.category(), ErrorCategory::Authentication);
	}

	#[test]
	fn unstructured_bodies_fall_back_to_status() {
		let error = interpret(500, "<html>oops</html>");

		assert_eq!(error.kind, ApiErrorKind::Server);
		assert_eq!(error.retryable, None);
		assert_eq!(error.body_preview.as_deref(), Some("<html>oops</html>"));
	}
}
