//! OAuth token secrets and the refreshable token record.

pub mod record;
pub mod secret;
