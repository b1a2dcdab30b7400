//! Read-only provider catalog with per-tenant `{{var}}` substitution.
//!
//! The catalog ships embedded in the crate (`providers.json`) and loads once per
//! process through [`Catalog::embedded`]. Callers that need different data build
//! their own value with [`Catalog::from_json`] and inject it into
//! [`ConnectorBuilder`](crate::connector::ConnectorBuilder).

pub mod descriptor;
pub mod substitution;

pub use descriptor::*;
pub use substitution::*;

// std
use std::sync::OnceLock;
// self
use crate::{_prelude::*, auth::ProviderId, error::ConfigError};

/// `read_config` key holding the connector maturity.
pub const KEY_CONNECTOR_TYPE: &str = "connector_type";
/// `read_config` key holding the connector version.
pub const KEY_CONNECTOR_VERSION: &str = "connector_version";
/// `read_config` key holding the declared auth type.
pub const KEY_PROVIDER_AUTH_TYPE: &str = "provider_auth_type";
/// `read_config` key holding the substituted base URL.
pub const KEY_PROVIDER_BASE_URL: &str = "provider_base_url";
/// `read_config` key holding the provider API version.
pub const KEY_PROVIDER_VERSION: &str = "provider_version";

const EMBEDDED_JSON: &str = include_str!("catalog/providers.json");

static EMBEDDED: OnceLock<Result<Catalog, String>> = OnceLock::new();

/// Immutable registry of provider descriptors keyed by provider identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
	providers: BTreeMap<ProviderId, ProviderInfo>,
}
impl Catalog {
	/// Returns the process-wide catalog compiled into the crate.
	pub fn embedded() -> Result<&'static Self> {
		EMBEDDED
			.get_or_init(|| {
				Self::from_json(EMBEDDED_JSON).map_err(|e| match e.source() {
					Some(source) => source.to_string(),
					None => e.to_string(),
				})
			})
			.as_ref()
			.map_err(|message| ConfigError::EmbeddedCatalog { message: message.clone() }.into())
	}

	/// Parses a catalog document keyed by provider identifier.
	pub fn from_json(json: &str) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let raw: BTreeMap<ProviderId, ProviderInfo> = serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::Catalog { source })?;
		let providers = raw
			.into_iter()
			.map(|(id, info)| {
				let info = info.with_id(&id);

				(id, info)
			})
			.collect();

		Ok(Self { providers })
	}

	/// Iterates over the known provider identifiers in sorted order.
	pub fn providers(&self) -> impl Iterator<Item = &ProviderId> {
		self.providers.keys()
	}

	/// Returns `true` if the catalog has a descriptor for `provider`.
	pub fn contains(&self, provider: &str) -> bool {
		self.providers.contains_key(provider)
	}

	/// Returns the unsubstituted descriptor.
	pub fn descriptor(&self, provider: &str) -> Result<&ProviderInfo> {
		self.providers.get(provider).ok_or_else(|| {
			ConfigError::ProviderConfigNotFound { provider: provider.to_owned() }.into()
		})
	}

	/// Returns the descriptor with every string field substituted.
	pub fn read_info(
		&self,
		provider: &str,
		substitutions: Option<&Substitutions>,
	) -> Result<ProviderInfo> {
		let info = self.descriptor(provider)?;

		Ok(match substitutions {
			Some(substitutions) => info.substituted(substitutions),
			None => info.clone(),
		})
	}

	/// Returns a flat view of the substituted descriptor.
	///
	/// Descriptor options come first; the conventional keys overwrite any option
	/// sharing their name.
	pub fn read_config(
		&self,
		provider: &str,
		substitutions: Option<&Substitutions>,
	) -> Result<BTreeMap<String, String>> {
		let info = self.read_info(provider, substitutions)?;
		let mut config = info.options.clone();

		config.insert(KEY_CONNECTOR_TYPE.into(), info.connector_type.as_str().into());
		config.insert(KEY_CONNECTOR_VERSION.into(), info.connector_version.clone());
		config.insert(KEY_PROVIDER_AUTH_TYPE.into(), info.auth_type.as_str().into());
		config.insert(KEY_PROVIDER_BASE_URL.into(), info.base_url.clone());
		config.insert(KEY_PROVIDER_VERSION.into(), info.version.clone());

		Ok(config)
	}
}

/// [`Catalog::read_info`] against the embedded catalog.
pub fn read_info(provider: &str, substitutions: Option<&Substitutions>) -> Result<ProviderInfo> {
	Catalog::embedded()?.read_info(provider, substitutions)
}

/// [`Catalog::read_config`] against the embedded catalog.
pub fn read_config(
	provider: &str,
	substitutions: Option<&Substitutions>,
) -> Result<BTreeMap<String, String>> {
	Catalog::embedded()?.read_config(provider, substitutions)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn embedded_catalog_loads_every_auth_flavor() {
		let catalog = Catalog::embedded().expect("Embedded catalog should parse.");

		for provider in [
			"salesforce",
			"hubspot",
			"linkedin",
			"zendesk",
			"dynamicsCRM",
			"pipedrive",
			"klaviyo",
			"greenhouse",
			"hackerNews",
		] {
			assert!(catalog.contains(provider), "Catalog should define {provider}.");
		}

		let flavors = catalog
			.providers()
			.map(|id| catalog.descriptor(id).map(|info| info.auth_type))
			.collect::<Result<Vec<_>>>()
			.expect("Every listed provider should resolve.");

		for auth_type in [AuthType::Oauth2, AuthType::ApiKey, AuthType::Basic, AuthType::None] {
			assert!(flavors.contains(&auth_type), "Catalog should cover {auth_type} auth.");
		}
	}

	#[test]
	fn read_config_resolves_salesforce_subdomain() {
		let subs = Substitutions::new().with("subdomain", "example");
		let config = read_config("salesforce", Some(&subs)).expect("Salesforce config should load.");

		assert_eq!(config[KEY_PROVIDER_BASE_URL], "https://example.salesforce.com");
		assert_eq!(config[KEY_PROVIDER_AUTH_TYPE], "oauth2");
		assert_eq!(config[KEY_PROVIDER_VERSION], "v59.0");
		assert_eq!(config[KEY_CONNECTOR_TYPE], "full");
		assert_eq!(config[KEY_CONNECTOR_VERSION], "1.0.0");
		assert_eq!(config["restApiUrl"], "https://example.salesforce.com/services/data/v59.0");
	}

	#[test]
	fn read_config_rejects_unknown_provider() {
		let subs = Substitutions::new().with("subdomain", "test");
		let err = read_config("nonexistent", Some(&subs)).expect_err("Unknown provider must fail.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::ProviderConfigNotFound { ref provider }) if provider == "nonexistent"
		));
	}

	#[test]
	fn read_config_ignores_unused_substitutions() {
		let subs = Substitutions::new().with("nonexistentvar", "test");
		let config = read_config("hubspot", Some(&subs)).expect("HubSpot config should load.");

		assert_eq!(config[KEY_PROVIDER_BASE_URL], "https://api.hubapi.com");
		assert_eq!(config[KEY_PROVIDER_AUTH_TYPE], "oauth2");
	}

	#[test]
	fn read_config_reports_basic_connectors() {
		let config = read_config("linkedin", None).expect("LinkedIn config should load.");

		assert_eq!(config[KEY_CONNECTOR_TYPE], "basic");
		assert_eq!(config[KEY_CONNECTOR_VERSION], "0.1.0");
		assert_eq!(config[KEY_PROVIDER_BASE_URL], "https://api.linkedin.com");
		assert_eq!(config[KEY_PROVIDER_VERSION], "2");
		assert_eq!(config["restliProtocolVersion"], "2.0.0");
	}

	#[test]
	fn covered_placeholders_leave_no_markers() {
		let subs = Substitutions::new().with("subdomain", "acme").with("workspace", "acme");

		for id in Catalog::embedded().expect("Embedded catalog should parse.").providers() {
			let info = read_info(id, Some(&subs)).expect("Embedded provider should load.");

			info.resolved_base_url().expect("Base URL should resolve once covered.");

			for key in info.options.keys() {
				info.resolved_option(key).expect("Options should resolve once covered.");
			}
			if info.oauth_opts.is_some() {
				info.resolved_token_url().expect("Token URL should resolve once covered.");
			}
		}
	}

	#[test]
	fn injected_catalogs_report_json_paths() {
		let err = Catalog::from_json(r#"{ "acme": { "displayName": "Acme", "authType": "carrier-pigeon", "baseUrl": "x" } }"#)
			.expect_err("Unknown auth type must fail.");
		let Error::Config(ConfigError::Catalog { source }) = err else {
			panic!("Expected a catalog parse error, got {err:?}.");
		};

		assert!(source.path().to_string().starts_with("acme"), "Path should name the provider.");
	}
}
