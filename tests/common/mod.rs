//! Helpers shared by the reqwest-backed integration tests.

#![allow(dead_code)]

// self
use saas_connectors::{
	connector::ConnectorBuilder,
	http::{HttpClient, ReqwestTransport, ReqwestTransportErrorMapper},
	reqwest::Client,
};

/// Builds a reqwest transport that accepts the self-signed certificates served by `httpmock`.
pub fn test_reqwest_transport() -> ReqwestTransport {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestTransport::with_client(client)
}

/// Unauthenticated HTTP client over [`test_reqwest_transport`].
pub fn test_http_client() -> HttpClient {
	HttpClient::new::<ReqwestTransport, ReqwestTransportErrorMapper>(
		test_reqwest_transport(),
		ReqwestTransportErrorMapper,
	)
}

/// Points a connector builder at [`test_reqwest_transport`].
pub fn with_test_transport(builder: ConnectorBuilder) -> ConnectorBuilder {
	builder.with_transport::<ReqwestTransport, ReqwestTransportErrorMapper>(
		test_reqwest_transport(),
		ReqwestTransportErrorMapper,
	)
}
