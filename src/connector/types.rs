//! Request and result shapes of the connector surface.

// self
use crate::_prelude::*;

/// Display metadata for one object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
	/// Human label of the object.
	pub display_name: String,
	/// Field API name → field label.
	pub fields: BTreeMap<String, String>,
}

/// Outcome of [`Connector::list_object_metadata`](crate::connector::Connector::list_object_metadata).
///
/// Per-object failures are collected instead of aborting the whole call.
#[derive(Debug, Default)]
pub struct ListObjectMetadataResult {
	/// Metadata keyed by object name.
	pub result: BTreeMap<String, ObjectMetadata>,
	/// Failures keyed by object name.
	pub errors: BTreeMap<String, Error>,
}

/// Parameters of a read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadParams {
	/// Provider object to read (e.g. `Account`, `tickets`).
	pub object_name: String,
	/// Fields to project into [`ReadResultRow::fields`].
	pub fields: Vec<String>,
	/// Only return records modified after this instant.
	pub since: Option<OffsetDateTime>,
	/// Opaque cursor returned by a previous page.
	pub next_page: Option<String>,
}
impl ReadParams {
	/// Reads `object_name` with no projection.
	pub fn new(object_name: impl Into<String>) -> Self {
		Self { object_name: object_name.into(), ..Default::default() }
	}

	/// Projects the given fields.
	pub fn with_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = fields.into_iter().map(Into::into).collect();

		self
	}

	/// Restricts the read to records modified after `since`.
	pub fn with_since(mut self, since: OffsetDateTime) -> Self {
		self.since = Some(since);

		self
	}

	/// Continues from a previous page.
	pub fn with_next_page(mut self, next_page: impl Into<String>) -> Self {
		self.next_page = Some(next_page.into());

		self
	}
}

/// One record of a read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadResultRow {
	/// Requested fields, keyed by the lowercased field name.
	pub fields: JsonMap<String, JsonValue>,
	/// The record as returned by the provider.
	pub raw: JsonMap<String, JsonValue>,
}
impl ReadResultRow {
	/// Projects `fields` out of `record`, matching names case-insensitively.
	pub fn project(record: JsonMap<String, JsonValue>, fields: &[String]) -> Self {
		let mut projected = JsonMap::new();

		for field in fields {
			let value = record
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(field))
				.map(|(_, value)| value.clone());

			if let Some(value) = value {
				projected.insert(field.to_ascii_lowercase(), value);
			}
		}

		Self { fields: projected, raw: record }
	}
}

/// One page of a read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadResult {
	/// Records on this page.
	pub data: Vec<ReadResultRow>,
	/// Cursor for the next page; `None` once `done`.
	pub next_page: Option<String>,
	/// Whether this is the last page.
	pub done: bool,
}
impl ReadResult {
	/// Number of records on this page.
	pub fn rows(&self) -> usize {
		self.data.len()
	}
}

/// Parameters of a write. A present `record_id` updates; otherwise a record is created.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteParams {
	/// Provider object to write.
	pub object_name: String,
	/// Record to update.
	pub record_id: Option<String>,
	/// Field values.
	pub record_data: JsonValue,
}
impl WriteParams {
	/// Creates a new record.
	pub fn create(object_name: impl Into<String>, record_data: JsonValue) -> Self {
		Self { object_name: object_name.into(), record_id: None, record_data }
	}

	/// Updates `record_id`.
	pub fn update(
		object_name: impl Into<String>,
		record_id: impl Into<String>,
		record_data: JsonValue,
	) -> Self {
		Self { object_name: object_name.into(), record_id: Some(record_id.into()), record_data }
	}
}

/// Outcome of a write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteResult {
	/// Whether the provider accepted the write.
	pub success: bool,
	/// Identifier of the created or updated record.
	pub record_id: Option<String>,
	/// Provider response body, if any.
	pub data: JsonMap<String, JsonValue>,
}
