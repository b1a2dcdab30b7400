//! Tenant credential records loaded from disk and turned into OAuth tokens.
//!
//! A record is a flat JSON object. Its path defaults to
//! `./<kebab(provider)>-creds.json` and is overridden by
//! `<SCREAMING_SNAKE(provider)>_CRED_FILE` when that variable is non-empty.

pub mod expiry;
pub mod path;

pub use expiry::{ExpiryLayout, NAMED_LAYOUTS, parse_expiry};
pub use path::{credential_path, credential_path_with, env_var_name};

// self
use crate::{
	_prelude::*,
	auth::{OAuthToken, ScopeSet},
	error::{ConfigError, CredentialsError},
};

/// Age given to a refreshable token whose stored expiry is missing or unreadable.
pub const STALE_AGE: Duration = Duration::hours(1);

const INLINE_SOURCE: &str = "<inline>";

/// Recognized credential file keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialField {
	/// `access_token`
	AccessToken,
	/// `refresh_token`
	RefreshToken,
	/// `expiry`
	Expiry,
	/// `expiry_format`
	ExpiryFormat,
	/// `client_id`
	ClientId,
	/// `client_secret`
	ClientSecret,
	/// `api_key`
	ApiKey,
	/// `subdomain`
	Subdomain,
	/// `workspace`
	Workspace,
	/// `username`
	Username,
	/// `password`
	Password,
	/// `scopes`
	Scopes,
	/// `realm_id`
	RealmId,
}
impl CredentialField {
	/// Every recognized field.
	pub const ALL: [Self; 13] = [
		Self::AccessToken,
		Self::RefreshToken,
		Self::Expiry,
		Self::ExpiryFormat,
		Self::ClientId,
		Self::ClientSecret,
		Self::ApiKey,
		Self::Subdomain,
		Self::Workspace,
		Self::Username,
		Self::Password,
		Self::Scopes,
		Self::RealmId,
	];

	/// JSON key of the field.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "access_token",
			Self::RefreshToken => "refresh_token",
			Self::Expiry => "expiry",
			Self::ExpiryFormat => "expiry_format",
			Self::ClientId => "client_id",
			Self::ClientSecret => "client_secret",
			Self::ApiKey => "api_key",
			Self::Subdomain => "subdomain",
			Self::Workspace => "workspace",
			Self::Username => "username",
			Self::Password => "password",
			Self::Scopes => "scopes",
			Self::RealmId => "realm_id",
		}
	}

	/// Returns `true` for fields that must never be printed.
	pub const fn is_secret(self) -> bool {
		matches!(
			self,
			Self::AccessToken
				| Self::RefreshToken
				| Self::ClientSecret
				| Self::ApiKey
				| Self::Password
		)
	}
}
impl Display for CredentialField {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential record for one provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
	fields: BTreeMap<String, String>,
	source: Option<PathBuf>,
}
impl CredentialRecord {
	/// Creates an empty record.
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads the record for `provider` from its resolved path.
	pub fn load(provider: &str) -> Result<Self> {
		Self::load_from(credential_path(provider))
	}

	/// Loads a record from an explicit path.
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let bytes = std::fs::read(path)
			.map_err(|source| CredentialsError::Read { path: path.to_owned(), source })?;

		Self::parse(&bytes, path)
	}

	/// Parses a record from JSON bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self> {
		let mut record = Self::parse(bytes, Path::new(INLINE_SOURCE))?;

		record.source = None;

		Ok(record)
	}

	/// Sets a field, returning the updated record.
	pub fn with(mut self, field: CredentialField, value: impl Into<String>) -> Self {
		self.set(field, value);

		self
	}

	/// Sets a field in place.
	pub fn set(&mut self, field: CredentialField, value: impl Into<String>) {
		self.fields.insert(field.as_str().into(), value.into());
	}

	/// Returns the field value, or `""` when missing.
	pub fn get(&self, field: CredentialField) -> &str {
		self.get_raw(field.as_str()).unwrap_or_default()
	}

	/// Returns any key present in the file, including unrecognized ones.
	pub fn get_raw(&self, key: &str) -> Option<&str> {
		self.fields.get(key).map(String::as_str)
	}

	/// Returns `true` when the field is present and non-empty.
	pub fn has(&self, field: CredentialField) -> bool {
		!self.get(field).is_empty()
	}

	/// File the record was loaded from.
	pub fn source(&self) -> Option<&Path> {
		self.source.as_deref()
	}

	/// Parses the `scopes` field (space- or comma-delimited).
	pub fn scopes(&self) -> Result<ScopeSet> {
		Ok(ScopeSet::parse_delimited(self.get(CredentialField::Scopes))
			.map_err(ConfigError::from)?)
	}

	/// Parses the `(expiry, expiry_format)` pair, if both are present.
	pub fn expiry(&self) -> Option<Result<OffsetDateTime, CredentialsError>> {
		let value = self.get(CredentialField::Expiry);
		let format = self.get(CredentialField::ExpiryFormat);

		if value.is_empty() || format.is_empty() {
			return None;
		}

		Some(parse_expiry(value, format))
	}

	/// Materializes the token at the current instant.
	pub fn oauth_token(&self) -> Result<OAuthToken> {
		self.oauth_token_at(OffsetDateTime::now_utc())
	}

	/// Materializes the token as of `now`.
	///
	/// Without a refresh token the access token is returned with no expiry. With
	/// one, the expiry is the parsed `(expiry, expiry_format)` pair, or
	/// `now - 1h` when that pair is absent or malformed so the first request
	/// refreshes.
	pub fn oauth_token_at(&self, now: OffsetDateTime) -> Result<OAuthToken> {
		let access = self.get(CredentialField::AccessToken);
		let refresh = self.get(CredentialField::RefreshToken);

		if access.is_empty() && refresh.is_empty() {
			return Err(CredentialsError::MissingField {
				field: CredentialField::AccessToken.as_str(),
			}
			.into());
		}

		let scope = self.scopes()?;
		let builder = OAuthToken::builder().access_token(access).scope(scope);
		let builder = if refresh.is_empty() {
			builder
		} else {
			let expiry = self.expiry().and_then(Result::ok).unwrap_or(now - STALE_AGE);

			builder.refresh_token(refresh).expires_at(expiry)
		};

		Ok(builder.build().map_err(ConfigError::from)?)
	}

	fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_slice(bytes);
		let object: JsonMap<String, JsonValue> = serde_path_to_error::deserialize(de)
			.map_err(|source| CredentialsError::Parse { path: path.to_owned(), source })?;
		let fields = object
			.into_iter()
			.filter_map(|(key, value)| {
				let text = match value {
					JsonValue::String(s) => s,
					JsonValue::Number(n) => n.to_string(),
					JsonValue::Bool(b) => b.to_string(),
					JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => return None,
				};

				Some((key, text))
			})
			.collect();

		Ok(Self { fields, source: Some(path.to_owned()) })
	}
}
impl FromIterator<(CredentialField, String)> for CredentialRecord {
	fn from_iter<I: IntoIterator<Item = (CredentialField, String)>>(iter: I) -> Self {
		let mut record = Self::default();

		for (field, value) in iter {
			record.set(field, value);
		}

		record
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.fields {
			let secret = CredentialField::ALL
				.iter()
				.any(|field| field.is_secret() && field.as_str() == key);

			if secret {
				map.entry(key, &"<redacted>");
			} else {
				map.entry(key, value);
			}
		}

		map.finish()
	}
}
