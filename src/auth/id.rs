//! Strongly typed identifiers for catalog providers and tenant workspaces.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $label:literal, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				Self::try_from(value.as_ref().to_owned())
			}

			/// Borrows the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($label, &value).map(|()| Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.as_str()
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.as_str()
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.as_str()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(self.as_str())
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple($label).field(&self.0).finish()
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (provider, workspace).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (provider, workspace).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (provider, workspace).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ProviderId, "Provider", "Catalog key of a SaaS provider (e.g. `salesforce`, `dynamicsCRM`)." }
def_id! { Workspace, "Workspace", "Tenant workspace or subdomain (e.g. the `acme` in `acme.zendesk.com`)." }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_blanks() {
		assert!(ProviderId::new(" salesforce").is_err(), "Leading whitespace must be rejected.");
		assert!(Workspace::new("acme ").is_err(), "Trailing whitespace must be rejected.");
		assert!(Workspace::new("").is_err());

		let provider =
			ProviderId::new("dynamicsCRM").expect("Provider fixture should be considered valid.");

		assert_eq!(provider.as_ref(), "dynamicsCRM");
		assert_eq!(format!("{provider:?}"), r#"Provider("dynamicsCRM")"#);
	}

	#[test]
	fn serde_enforces_validation() {
		let workspace: Workspace =
			serde_json::from_str("\"acme\"").expect("Workspace should deserialize successfully.");

		assert_eq!(workspace.to_string(), "acme");
		assert!(serde_json::from_str::<Workspace>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		ProviderId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(matches!(
			ProviderId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { kind: "Provider", .. })
		));
	}

	#[test]
	fn borrow_supports_str_lookup() {
		let map: BTreeMap<ProviderId, u8> = BTreeMap::from_iter([(
			ProviderId::new("hubspot").expect("Provider used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("hubspot"), Some(&7));
	}
}
