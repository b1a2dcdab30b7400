//! Provider descriptor data structures and the checks applied when a field is consumed.

// self
use crate::{_prelude::*, catalog::substitution, error::ConfigError};

/// Authentication model a provider declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
	/// OAuth 2.0 bearer tokens.
	Oauth2,
	/// Static API key in a header or query parameter.
	ApiKey,
	/// HTTP Basic with username and password.
	Basic,
	/// Unauthenticated.
	None,
}
impl AuthType {
	/// Returns the catalog spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Oauth2 => "oauth2",
			Self::ApiKey => "apiKey",
			Self::Basic => "basic",
			Self::None => "none",
		}
	}
}
impl Display for AuthType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Where client credentials travel during the refresh grant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStyle {
	#[default]
	/// `client_id`/`client_secret` as form parameters.
	InParams,
	/// HTTP Basic `Authorization` header.
	InHeader,
}

/// Where an API key is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiKeyPlacement {
	/// Request header named by [`ApiKeyOpts::key_name`].
	Header,
	/// Query parameter named by [`ApiKeyOpts::key_name`].
	Query,
}

/// Connector maturity declared by the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorType {
	/// Connector implements list/read/write.
	Full,
	#[default]
	/// Only the authenticated JSON client is provided.
	Basic,
}
impl ConnectorType {
	/// Returns the catalog spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Full => "full",
			Self::Basic => "basic",
		}
	}
}

/// OAuth 2.0 endpoints and behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthOpts {
	/// Authorization endpoint (informational; this crate never runs the consent flow).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_url: Option<String>,
	/// Token endpoint used for the refresh grant.
	pub token_url: String,
	/// How client credentials are sent to the token endpoint.
	#[serde(default)]
	pub auth_style: AuthStyle,
	/// Token type attached to requests.
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Scopes requested at consent time.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Whether the provider issues refresh tokens.
	#[serde(default = "default_true")]
	pub supports_refresh: bool,
	/// Lifetime in seconds assumed when a token response omits `expires_in`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in_hint: Option<u64>,
}

/// API key placement options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyOpts {
	/// Header or query placement.
	pub placement: ApiKeyPlacement,
	/// Header name or query parameter name.
	pub key_name: String,
	/// Prefix prepended to the key (e.g. `Bearer `).
	#[serde(default)]
	pub value_prefix: String,
}

/// Immutable provider descriptor from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
	#[serde(skip)]
	pub(crate) provider: String,
	/// Human label.
	pub display_name: String,
	/// Declared authentication model.
	pub auth_type: AuthType,
	/// OAuth options, present when `auth_type` is `oauth2`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oauth_opts: Option<OAuthOpts>,
	/// API key options, present when `auth_type` is `apiKey`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub api_key_opts: Option<ApiKeyOpts>,
	/// Base URL template.
	pub base_url: String,
	/// Provider-specific options.
	#[serde(default)]
	pub options: BTreeMap<String, String>,
	/// Provider API version.
	#[serde(default)]
	pub version: String,
	/// Connector maturity.
	#[serde(default)]
	pub connector_type: ConnectorType,
	/// Connector version.
	#[serde(default)]
	pub connector_version: String,
	#[serde(flatten, skip_serializing)]
	extra: BTreeMap<String, JsonValue>,
}
impl ProviderInfo {
	/// Catalog key this descriptor was loaded under.
	pub fn id(&self) -> &str {
		&self.provider
	}

	/// Looks up an option without checking for unresolved placeholders.
	pub fn option(&self, key: &str) -> Result<&str> {
		self.options.get(key).map(String::as_str).ok_or_else(|| {
			ConfigError::ProviderOptionNotFound {
				provider: self.provider.clone(),
				option: key.into(),
			}
			.into()
		})
	}

	/// Looks up an option the caller is about to consume.
	pub fn resolved_option(&self, key: &str) -> Result<&str> {
		let value = self.option(key)?;

		self.ensure_resolved(&format!("options.{key}"), value)?;

		Ok(value)
	}

	/// Parses the base URL after checking that substitution resolved it.
	pub fn resolved_base_url(&self) -> Result<Url> {
		self.ensure_resolved("baseUrl", &self.base_url)?;

		parse_url(&self.base_url)
	}

	/// Parses the token endpoint after checking that substitution resolved it.
	pub fn resolved_token_url(&self) -> Result<Url> {
		let opts = self.oauth_opts.as_ref().ok_or_else(|| ConfigError::MissingAuthOptions {
			provider: self.provider.clone(),
			auth_type: AuthType::Oauth2.as_str(),
		})?;

		self.ensure_resolved("oauthOpts.tokenUrl", &opts.token_url)?;

		parse_url(&opts.token_url)
	}

	pub(crate) fn with_id(mut self, provider: &str) -> Self {
		self.provider = provider.to_owned();

		for (key, value) in std::mem::take(&mut self.extra) {
			let rendered = match value {
				JsonValue::String(s) => s,
				other => other.to_string(),
			};

			self.options.entry(key).or_insert(rendered);
		}

		self
	}

	fn ensure_resolved(&self, field: &str, value: &str) -> Result<()> {
		let placeholders = substitution::unresolved_placeholders(value);

		if placeholders.is_empty() {
			Ok(())
		} else {
			Err(ConfigError::UnresolvedSubstitution {
				provider: self.provider.clone(),
				field: field.into(),
				placeholders,
			}
			.into())
		}
	}
}

fn parse_url(raw: &str) -> Result<Url> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { url: raw.into(), source }.into())
}

fn default_token_type() -> String {
	crate::auth::BEARER.into()
}

fn default_true() -> bool {
	true
}
