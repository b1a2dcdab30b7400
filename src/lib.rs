//! Provider catalog, credential registry, and authenticated HTTP stack for building
//! multi-tenant SaaS API connectors.
//!
//! Every connector is a thin assembly over three pieces:
//!
//! - [`catalog`]: declarative provider descriptors with per-tenant `{{var}}` substitution.
//! - [`credentials`]: tenant secrets loaded from disk (or an environment override) and turned
//!   into OAuth tokens.
//! - [`http`]: transport → authenticator → JSON codec → error interpreter.
//!
//! [`connector::ConnectorBuilder`] binds them for a provider and hands back an opaque
//! [`connector::ConnectorHandle`].

#![deny(clippy::all, unused_crate_dependencies)]
#![warn(missing_docs)]

pub mod auth;
pub mod catalog;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod providers;

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
