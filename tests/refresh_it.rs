#![cfg(feature = "reqwest")]

mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use saas_connectors::{
	auth::OAuthToken,
	catalog::{Catalog, Substitutions},
	connector::{ConnectorBuilder, ConnectorHandle},
	error::{AuthError, Error, ErrorCategory},
	http::{CancelToken, RequestContext},
	oauth::OAuthClientConfig,
};

const CLIENT_ID: &str = "client-acme";
const CLIENT_SECRET: &str = "secret-acme";
const CATALOG: &str = r#"{
	"acme": {
		"displayName": "Acme CRM",
		"authType": "oauth2",
		"oauthOpts": { "tokenUrl": "{{server}}/oauth/token", "expiresInHint": 600 },
		"baseUrl": "{{server}}/api"
	}
}"#;

fn build_handle(server: &MockServer, token: OAuthToken) -> ConnectorHandle {
	common::with_test_transport(ConnectorBuilder::new("acme"))
		.with_catalog(Catalog::from_json(CATALOG).expect("Refresh catalog should parse."))
		.with_catalog_substitutions(Substitutions::new().with("server", server.base_url()))
		.with_client(OAuthClientConfig::new(CLIENT_ID, token).with_client_secret(CLIENT_SECRET))
		.build()
		.expect("OAuth connector should assemble against the mock server.")
}

fn stale_token() -> OAuthToken {
	OAuthToken::builder()
		.access_token("access-stale")
		.refresh_token("refresh-acme")
		.expires_at(OffsetDateTime::now_utc() - Duration::minutes(5))
		.build()
		.expect("Stale token fixture should build.")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_refresh() -> Result<()> {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(200))
				.body(r#"{"access_token":"access-fresh","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping").header("authorization", "Bearer access-fresh");
			then.status(200).header("content-type", "application/json").body(r#"{"ok":true}"#);
		})
		.await;
	let handle = build_handle(&server, stale_token());
	let mut tasks = Vec::new();

	for _ in 0..8 {
		let client = handle.client().clone();

		tasks.push(tokio::spawn(async move {
			client.get_json(&RequestContext::background(), "ping", None).await
		}));
	}
	for task in tasks {
		let response = task.await??;

		assert_eq!(response.json(), Some(&serde_json::json!({ "ok": true })));
	}

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(8).await;

	let metrics = handle.refresh_metrics().expect("Refreshing connectors expose metrics.");

	assert_eq!(metrics.attempts(), 1);
	assert_eq!(metrics.successes(), 1);
	assert_eq!(metrics.failures(), 0);

	Ok(())
}

#[tokio::test]
async fn fresh_tokens_are_reused_across_requests() -> Result<()> {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"access-fresh","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping").header("authorization", "Bearer access-fresh");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let handle = build_handle(&server, stale_token());
	let ctx = RequestContext::background();

	handle.client().get_json(&ctx, "ping", None).await?;
	handle.client().get_json(&ctx, "ping", None).await?;

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(2).await;

	Ok(())
}

#[tokio::test]
async fn invalid_grant_is_an_authentication_error() -> Result<()> {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"expired refresh token"}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping");
			then.status(200).body("{}");
		})
		.await;
	let handle = build_handle(&server, stale_token());
	let err = handle
		.client()
		.get_json(&RequestContext::background(), "ping", None)
		.await
		.expect_err("A rejected refresh token must fail the request.");

	assert!(matches!(err, Error::Auth(AuthError::InvalidGrant { .. })), "Unexpected error: {err:?}.");
	assert_eq!(err.category(), ErrorCategory::Authentication);

	token_mock.assert_async().await;
	api_mock.assert_calls_async(0).await;

	let metrics = handle.refresh_metrics().expect("Refreshing connectors expose metrics.");

	assert_eq!(metrics.failures(), 1);

	Ok(())
}

#[tokio::test]
async fn tokens_without_refresh_secret_are_used_as_is() -> Result<()> {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping").header("authorization", "Bearer access-static");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let handle = build_handle(&server, OAuthToken::bearer("access-static"));

	handle.client().get_json(&RequestContext::background(), "ping", None).await?;

	token_mock.assert_calls_async(0).await;
	api_mock.assert_async().await;
	assert!(handle.refresh_metrics().is_none());

	Ok(())
}

#[tokio::test]
async fn unauthorized_after_refresh_is_not_retried() -> Result<()> {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"access-fresh","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"message":"Session expired"}"#);
		})
		.await;
	let handle = build_handle(&server, stale_token());
	let err = handle
		.client()
		.get_json(&RequestContext::background(), "ping", None)
		.await
		.expect_err("A 401 must surface to the caller.");

	assert_eq!(err.status(), Some(401));
	assert_eq!(err.category(), ErrorCategory::Authentication);

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn cancelled_refresh_releases_the_lock_for_the_next_request() -> Result<()> {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(500))
				.body(r#"{"access_token":"access-fresh","token_type":"bearer","expires_in":3600}"#);
		})
		.await;

	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/ping").header("authorization", "Bearer access-fresh");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let handle = build_handle(&server, stale_token());
	let token = CancelToken::new();
	let ctx = RequestContext::background().with_cancel(token.clone());
	let canceller = tokio::spawn(async move {
		tokio::time::sleep(StdDuration::from_millis(50)).await;
		token.cancel();
	});
	let err = handle
		.client()
		.get_json(&ctx, "ping", None)
		.await
		.expect_err("Cancellation must end the in-flight refresh.");

	canceller.await?;

	assert!(matches!(err, Error::Cancelled), "Unexpected error: {err:?}.");
	api_mock.assert_calls_async(0).await;

	handle.client().get_json(&RequestContext::background(), "ping", None).await?;

	api_mock.assert_calls_async(1).await;

	Ok(())
}
