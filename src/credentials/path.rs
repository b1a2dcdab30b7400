//! Credential file path resolution and identifier case conversion.

// self
use crate::_prelude::*;

/// Suffix appended to the screaming-snake provider id to form the override variable.
pub const ENV_SUFFIX: &str = "_CRED_FILE";
/// Suffix appended to the kebab-case provider id to form the default file name.
pub const FILE_SUFFIX: &str = "-creds.json";

/// Splits an identifier into words.
///
/// Boundaries are separators (`-`, `_`, `.`, whitespace), lower→upper and
/// digit→upper transitions, and the end of an acronym (`CRMData` → `CRM`, `Data`).
pub fn split_words(ident: &str) -> Vec<String> {
	let chars = ident.chars().collect::<Vec<_>>();
	let mut words = Vec::new();
	let mut current = String::new();

	for (i, &c) in chars.iter().enumerate() {
		if c == '-' || c == '_' || c == '.' || c.is_whitespace() {
			if !current.is_empty() {
				words.push(std::mem::take(&mut current));
			}

			continue;
		}
		if let Some(&prev) = current.chars().last().as_ref() {
			let next = chars.get(i + 1).copied();
			let boundary = c.is_uppercase()
				&& (prev.is_lowercase()
					|| prev.is_ascii_digit()
					|| (prev.is_uppercase() && next.is_some_and(char::is_lowercase)));

			if boundary {
				words.push(std::mem::take(&mut current));
			}
		}

		current.push(c);
	}

	if !current.is_empty() {
		words.push(current);
	}

	words
}

/// `dynamicsCRM` → `dynamics-crm`.
pub fn kebab_case(ident: &str) -> String {
	split_words(ident).iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("-")
}

/// `dynamicsCRM` → `DYNAMICS_CRM`.
pub fn screaming_snake_case(ident: &str) -> String {
	split_words(ident).iter().map(|w| w.to_uppercase()).collect::<Vec<_>>().join("_")
}

/// Name of the variable that overrides the credential path for `provider`.
pub fn env_var_name(provider: &str) -> String {
	format!("{}{ENV_SUFFIX}", screaming_snake_case(provider))
}

/// Conventional credential path used when no override is set.
pub fn default_credential_path(provider: &str) -> PathBuf {
	PathBuf::from(format!("./{}{FILE_SUFFIX}", kebab_case(provider)))
}

/// Resolves the credential path with a caller-supplied variable lookup.
///
/// An unset or empty variable falls back to [`default_credential_path`]; any other
/// value is used verbatim.
pub fn credential_path_with<F>(provider: &str, lookup: F) -> PathBuf
where
	F: FnOnce(&str) -> Option<String>,
{
	match lookup(&env_var_name(provider)) {
		Some(path) if !path.is_empty() => PathBuf::from(path),
		_ => default_credential_path(provider),
	}
}

/// Resolves the credential path from the process environment.
pub fn credential_path(provider: &str) -> PathBuf {
	credential_path_with(provider, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn words_split_on_case_and_separators() {
		assert_eq!(split_words("dynamicsCRM"), ["dynamics", "CRM"]);
		assert_eq!(split_words("HTTPServer"), ["HTTP", "Server"]);
		assert_eq!(split_words("zoho_desk-v2.api"), ["zoho", "desk", "v2", "api"]);
		assert_eq!(split_words("office365Mail"), ["office365", "Mail"]);
		assert!(split_words("--").is_empty());
	}

	#[test]
	fn case_conversions_match_conventions() {
		assert_eq!(kebab_case("dynamicsCRM"), "dynamics-crm");
		assert_eq!(screaming_snake_case("dynamicsCRM"), "DYNAMICS_CRM");
		assert_eq!(kebab_case("salesforce"), "salesforce");
		assert_eq!(env_var_name("hackerNews"), "HACKER_NEWS_CRED_FILE");
	}

	#[test]
	fn path_defaults_when_variable_is_unset_or_empty() {
		let unset = credential_path_with("dynamicsCRM", |name| {
			assert_eq!(name, "DYNAMICS_CRM_CRED_FILE");

			None
		});

		assert_eq!(unset, PathBuf::from("./dynamics-crm-creds.json"));
		assert_eq!(
			credential_path_with("dynamicsCRM", |_| Some(String::new())),
			PathBuf::from("./dynamics-crm-creds.json")
		);
	}

	#[test]
	fn path_override_is_used_verbatim() {
		assert_eq!(
			credential_path_with("dynamicsCRM", |_| Some("/tmp/x.json".into())),
			PathBuf::from("/tmp/x.json")
		);
	}
}
