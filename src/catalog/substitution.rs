//! Single-pass `{{name}}` replacement over provider descriptors.

// self
use crate::{_prelude::*, catalog::ProviderInfo};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Tenant substitution map.
///
/// Keys the descriptor never references are ignored; references the map cannot
/// satisfy stay literal and surface when the field is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Substitutions(BTreeMap<String, String>);
impl Substitutions {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a variable.
	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(name, value);

		self
	}

	/// Adds or replaces a variable in place.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.0.insert(name.into(), value.into());
	}

	/// Looks up a variable.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	/// Returns `true` when no variables are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Copies every variable of `other` into `self`, overwriting duplicates.
	pub fn extend(&mut self, other: &Self) {
		self.0.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
	}
}
impl<K, V> FromIterator<(K, V)> for Substitutions
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
impl From<BTreeMap<String, String>> for Substitutions {
	fn from(value: BTreeMap<String, String>) -> Self {
		Self(value)
	}
}

/// Replaces each `{{name}}` in `template` with its value from `substitutions`.
///
/// Replacement text is copied verbatim and never re-scanned. Unknown names and an
/// unterminated `{{` are left as written.
pub fn substitute_str(template: &str, substitutions: &Substitutions) -> String {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = rest.find(OPEN) {
		out.push_str(&rest[..start]);

		let after_open = &rest[start + OPEN.len()..];
		let Some(end) = after_open.find(CLOSE) else {
			out.push_str(&rest[start..]);

			return out;
		};
		let name = &after_open[..end];

		match substitutions.get(name) {
			Some(value) => out.push_str(value),
			None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
		}

		rest = &after_open[end + CLOSE.len()..];
	}

	out.push_str(rest);

	out
}

/// Lists the placeholder names still present in `text`, in order of appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
	let mut names = Vec::new();
	let mut rest = text;

	while let Some(start) = rest.find(OPEN) {
		let after_open = &rest[start + OPEN.len()..];
		let Some(end) = after_open.find(CLOSE) else { break };

		names.push(after_open[..end].to_owned());

		rest = &after_open[end + CLOSE.len()..];
	}

	names
}

impl ProviderInfo {
	/// Returns a copy with every string field substituted.
	pub fn substituted(&self, substitutions: &Substitutions) -> Self {
		let apply = |s: &str| substitute_str(s, substitutions);
		let mut info = self.clone();

		info.display_name = apply(&self.display_name);
		info.base_url = apply(&self.base_url);
		info.version = apply(&self.version);
		info.connector_version = apply(&self.connector_version);

		for value in info.options.values_mut() {
			*value = apply(value);
		}
		if let Some(opts) = info.oauth_opts.as_mut() {
			opts.auth_url = opts.auth_url.as_deref().map(apply);
			opts.token_url = apply(&opts.token_url);
			opts.token_type = apply(&opts.token_type);

			for scope in opts.scopes.iter_mut() {
				*scope = apply(scope);
			}
		}
		if let Some(opts) = info.api_key_opts.as_mut() {
			opts.key_name = apply(&opts.key_name);
			opts.value_prefix = apply(&opts.value_prefix);
		}

		info
	}
}
