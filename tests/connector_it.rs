#![cfg(feature = "reqwest")]

mod common;

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use time::OffsetDateTime;
// self
use saas_connectors::{
	auth::OAuthToken,
	catalog::{Catalog, Substitutions},
	connector::{Connector, ConnectorBuilder, ReadParams, WriteParams},
	credentials::CredentialRecord,
	error::{ApiErrorKind, ConfigError, Error, ErrorCategory},
	http::RequestContext,
	oauth::OAuthClientConfig,
};

const CATALOG: &str = r#"{
	"salesforce": {
		"displayName": "Salesforce",
		"authType": "oauth2",
		"oauthOpts": { "tokenUrl": "{{server}}/services/oauth2/token" },
		"baseUrl": "{{server}}",
		"options": {
			"domain": "{{subdomain}}.salesforce.com",
			"restApiUrl": "{{server}}/services/data/v59.0"
		}
	},
	"zendesk": {
		"displayName": "Zendesk Support",
		"authType": "oauth2",
		"oauthOpts": { "tokenUrl": "{{server}}/oauth/tokens", "supportsRefresh": false },
		"baseUrl": "{{server}}",
		"options": { "apiPath": "api/v2" }
	},
	"legacy": {
		"displayName": "Legacy Salesforce",
		"authType": "oauth2",
		"oauthOpts": { "tokenUrl": "{{server}}/token" },
		"baseUrl": "{{server}}"
	}
}"#;

fn builder(server: &MockServer, provider: &str) -> ConnectorBuilder {
	common::with_test_transport(ConnectorBuilder::new(provider))
		.with_catalog(Catalog::from_json(CATALOG).expect("Connector catalog should parse."))
		.with_catalog_substitutions(
			Substitutions::new().with("server", server.base_url()).with("subdomain", "acme"),
		)
		.with_client(OAuthClientConfig::new("client-acme", OAuthToken::bearer("access-acme")))
}

fn salesforce(server: &MockServer) -> Box<dyn Connector> {
	builder(server, "salesforce")
		.build()
		.and_then(|handle| handle.into_connector())
		.expect("Salesforce connector should assemble against the mock server.")
}

fn zendesk(server: &MockServer) -> Box<dyn Connector> {
	builder(server, "zendesk")
		.with_workspace("acme")
		.build()
		.and_then(|handle| handle.into_connector())
		.expect("Zendesk connector should assemble against the mock server.")
}

#[tokio::test]
async fn zendesk_without_workspace_fails_before_any_request() -> Result<()> {
	let server = MockServer::start_async().await;
	let err = builder(&server, "zendesk").build().expect_err("Zendesk needs a workspace.");

	assert!(matches!(err, Error::Config(ConfigError::MissingWorkspace { .. })), "Unexpected error: {err:?}.");
	assert_eq!(err.category(), ErrorCategory::Configuration);

	Ok(())
}

#[tokio::test]
async fn credential_files_seed_the_workspace() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/groups.json").header("authorization", "Bearer access-file");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"groups":[{"id":1,"name":"Support"}],"meta":{"has_more":false}}"#);
		})
		.await;
	let record =
		CredentialRecord::from_slice(br#"{"access_token":"access-file","workspace":"acme"}"#)?;
	let handle = common::with_test_transport(ConnectorBuilder::new("zendesk"))
		.with_catalog(Catalog::from_json(CATALOG)?)
		.with_catalog_substitutions(Substitutions::new().with("server", server.base_url()))
		.with_credentials(record)
		.build()?;

	assert_eq!(handle.workspace().map(ToString::to_string).as_deref(), Some("acme"));

	let page = handle.into_connector()?.read(&RequestContext::background(), &ReadParams::new("groups")).await?;

	assert_eq!(page.rows(), 1);
	assert!(page.done);

	mock.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn missing_connector_options_are_reported() -> Result<()> {
	let server = MockServer::start_async().await;
	let catalog = Catalog::from_json(
		r#"{
			"salesforce": {
				"displayName": "Salesforce",
				"authType": "oauth2",
				"oauthOpts": { "tokenUrl": "{{server}}/token" },
				"baseUrl": "{{server}}",
				"options": { "restApiUrl": "{{server}}/services/data/v59.0" }
			}
		}"#,
	)?;
	let err = builder(&server, "salesforce")
		.with_catalog(catalog)
		.build()
		.expect_err("Salesforce without a domain option must fail.");

	assert!(
		matches!(
			err,
			Error::Config(ConfigError::ProviderOptionNotFound { ref option, .. }) if option == "domain"
		),
		"Unexpected error: {err:?}."
	);

	Ok(())
}

#[tokio::test]
async fn providers_without_reference_connectors_are_unsupported() -> Result<()> {
	let server = MockServer::start_async().await;
	let handle = builder(&server, "legacy").build()?;
	let err = handle.into_connector().err().expect("Legacy has no reference connector.");

	assert!(matches!(err, Error::Unsupported { ref provider, .. } if provider == "legacy"));

	Ok(())
}

#[tokio::test]
async fn salesforce_describes_objects_and_collects_failures() -> Result<()> {
	let server = MockServer::start_async().await;
	let account = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/services/data/v59.0/sobjects/Account/describe")
				.header("authorization", "Bearer access-acme");
			then.status(200).header("content-type", "application/json").body(
				r#"{"label":"Account","fields":[{"name":"Id","label":"Account ID"},{"name":"Name","label":"Account Name"}]}"#,
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/v59.0/sobjects/Widget__c/describe");
			then.status(404)
				.header("content-type", "application/json")
				.body(r#"[{"errorCode":"NOT_FOUND","message":"The requested resource does not exist"}]"#);
		})
		.await;

	let connector = salesforce(&server);
	let objects = vec!["Account".to_owned(), "Widget__c".to_owned()];
	let outcome = connector.list_object_metadata(&RequestContext::background(), &objects).await?;
	let metadata = &outcome.result["Account"];

	assert_eq!(metadata.display_name, "Account");
	assert_eq!(metadata.fields["Name"], "Account Name");
	assert_eq!(outcome.errors.len(), 1);

	let failure = &outcome.errors["Widget__c"];

	assert_eq!(failure.status(), Some(404));
	assert_eq!(failure.category(), ErrorCategory::ClientRequest);

	account.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn salesforce_reads_follow_next_records_url() -> Result<()> {
	let server = MockServer::start_async().await;
	let first = server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/v59.0/query").query_param_exists("q");
			then.status(200).header("content-type", "application/json").body(
				r#"{
					"totalSize": 3,
					"done": false,
					"nextRecordsUrl": "/services/data/v59.0/query/01gD0000002HU6KIAW-2000",
					"records": [
						{ "attributes": { "type": "Account" }, "Id": "001A", "Name": "Acme" },
						{ "attributes": { "type": "Account" }, "Id": "001B", "Name": "Globex" }
					]
				}"#,
			);
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/v59.0/query/01gD0000002HU6KIAW-2000");
			then.status(200).header("content-type", "application/json").body(
				r#"{"totalSize":3,"done":true,"records":[{"Id":"001C","Name":"Initech"}]}"#,
			);
		})
		.await;
	let connector = salesforce(&server);
	let ctx = RequestContext::background();
	let params = ReadParams::new("Account").with_fields(["id", "name"]);
	let page = connector.read(&ctx, &params).await?;

	assert_eq!(page.rows(), 2);
	assert!(!page.done);
	assert_eq!(page.data[0].fields["name"], json!("Acme"));
	assert_eq!(page.data[0].raw["Id"], json!("001A"));

	let next = page.next_page.expect("The first page must carry a cursor.");
	let page = connector.read(&ctx, &params.clone().with_next_page(next)).await?;

	assert_eq!(page.rows(), 1);
	assert!(page.done);
	assert_eq!(page.next_page, None);
	assert_eq!(page.data[0].fields["id"], json!("001C"));

	first.assert_async().await;
	second.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn salesforce_session_errors_are_classified() -> Result<()> {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/v59.0/query");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"[{"errorCode":"INVALID_SESSION_ID","message":"Session expired or invalid"}]"#);
		})
		.await;

	let err = salesforce(&server)
		.read(&RequestContext::background(), &ReadParams::new("Account"))
		.await
		.expect_err("An expired session must fail the read.");
	let Error::Api(api) = err else {
		panic!("Expected an API error, got {err:?}.");
	};

	assert_eq!(api.kind, ApiErrorKind::Unauthorized);
	assert_eq!(api.provider_code.as_deref(), Some("INVALID_SESSION_ID"));
	assert_eq!(api.message, "Session expired or invalid");

	Ok(())
}

#[tokio::test]
async fn salesforce_writes_create_and_update() -> Result<()> {
	let server = MockServer::start_async().await;
	let create = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/services/data/v59.0/sobjects/Account")
				.json_body(json!({ "Name": "Acme" }));
			then.status(201)
				.header("content-type", "application/json")
				.body(r#"{"id":"001D000000IqhSLIAZ","success":true,"errors":[]}"#);
		})
		.await;
	let update = server
		.mock_async(|when, then| {
			when.method(PATCH)
				.path("/services/data/v59.0/sobjects/Account/001D000000IqhSLIAZ")
				.json_body(json!({ "Name": "Acme Corp" }));
			then.status(204);
		})
		.await;
	let connector = salesforce(&server);
	let ctx = RequestContext::background();
	let created =
		connector.write(&ctx, &WriteParams::create("Account", json!({ "Name": "Acme" }))).await?;

	assert!(created.success);
	assert_eq!(created.record_id.as_deref(), Some("001D000000IqhSLIAZ"));

	let updated = connector
		.write(&ctx, &WriteParams::update("Account", "001D000000IqhSLIAZ", json!({ "Name": "Acme Corp" })))
		.await?;

	assert!(updated.success);
	assert_eq!(updated.record_id.as_deref(), Some("001D000000IqhSLIAZ"));
	assert!(updated.data.is_empty());

	create.assert_async().await;
	update.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn zendesk_cursor_reads_follow_links() -> Result<()> {
	let server = MockServer::start_async().await;
	let next_url = server.url("/api/v2/tickets.json?page[after]=xyz");
	let first_body = json!({
		"tickets": [
			{ "id": 1, "subject": "Printer on fire", "status": "open" },
			{ "id": 2, "subject": "Password reset", "status": "pending" }
		],
		"meta": { "has_more": true, "after_cursor": "xyz" },
		"links": { "next": next_url }
	});
	let first = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/tickets.json")
				.query_param("page[size]", "100")
				.header("authorization", "Bearer access-acme");
			then.status(200).header("content-type", "application/json").json_body(first_body);
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/tickets.json").query_param("page[after]", "xyz");
			then.status(200).header("content-type", "application/json").body(
				r#"{"tickets":[{"id":3,"subject":"New laptop"}],"meta":{"has_more":false},"links":{"next":null}}"#,
			);
		})
		.await;
	let connector = zendesk(&server);
	let ctx = RequestContext::background();
	let params = ReadParams::new("tickets").with_fields(["Subject"]);
	let page = connector.read(&ctx, &params).await?;

	assert_eq!(page.rows(), 2);
	assert!(!page.done);
	assert_eq!(page.data[1].fields["subject"], json!("Password reset"));

	let next = page.next_page.expect("A page with more records must carry a cursor.");
	let page = connector.read(&ctx, &params.clone().with_next_page(next)).await?;

	assert_eq!(page.rows(), 1);
	assert!(page.done);

	first.assert_async().await;
	second.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn zendesk_incremental_reads_use_the_export_cursor() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/incremental/tickets/cursor.json")
				.query_param("start_time", "1700000000");
			then.status(200).header("content-type", "application/json").body(
				r#"{"tickets":[{"id":9,"subject":"Changed"}],"after_url":null,"after_cursor":null,"end_of_stream":true}"#,
			);
		})
		.await;
	let since = OffsetDateTime::from_unix_timestamp(1_700_000_000)?;
	let page = zendesk(&server)
		.read(&RequestContext::background(), &ReadParams::new("tickets").with_since(since))
		.await?;

	assert_eq!(page.rows(), 1);
	assert!(page.done);
	assert_eq!(page.data[0].raw["id"], json!(9));

	mock.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn zendesk_incremental_reads_reject_other_objects() -> Result<()> {
	let server = MockServer::start_async().await;
	let err = zendesk(&server)
		.read(
			&RequestContext::background(),
			&ReadParams::new("groups").with_since(OffsetDateTime::UNIX_EPOCH),
		)
		.await
		.expect_err("Groups have no incremental export.");

	assert!(matches!(err, Error::Unsupported { .. }), "Unexpected error: {err:?}.");

	Ok(())
}

#[tokio::test]
async fn zendesk_writes_use_singular_envelopes() -> Result<()> {
	let server = MockServer::start_async().await;
	let create = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v2/tickets.json")
				.json_body(json!({ "ticket": { "subject": "Help", "comment": { "body": "Broken" } } }));
			then.status(201)
				.header("content-type", "application/json")
				.body(r#"{"ticket":{"id":35436,"subject":"Help","status":"new"}}"#);
		})
		.await;
	let update = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/api/v2/tickets/35436.json")
				.json_body(json!({ "ticket": { "status": "solved" } }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"ticket":{"id":35436,"subject":"Help","status":"solved"}}"#);
		})
		.await;
	let connector = zendesk(&server);
	let ctx = RequestContext::background();
	let created = connector
		.write(
			&ctx,
			&WriteParams::create("tickets", json!({ "subject": "Help", "comment": { "body": "Broken" } })),
		)
		.await?;

	assert!(created.success);
	assert_eq!(created.record_id.as_deref(), Some("35436"));
	assert_eq!(created.data["status"], json!("new"));

	let updated = connector
		.write(&ctx, &WriteParams::update("tickets", "35436", json!({ "status": "solved" })))
		.await?;

	assert_eq!(updated.record_id.as_deref(), Some("35436"));
	assert_eq!(updated.data["status"], json!("solved"));

	create.assert_async().await;
	update.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn zendesk_record_errors_are_classified() -> Result<()> {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v2/tickets.json");
			then.status(422).header("content-type", "application/json").body(
				r#"{"error":"RecordInvalid","description":"Record validation errors","details":{"subject":[{"description":"Subject: cannot be blank"}]}}"#,
			);
		})
		.await;

	let err = zendesk(&server)
		.write(&RequestContext::background(), &WriteParams::create("tickets", json!({})))
		.await
		.expect_err("An invalid ticket must fail the write.");

	assert_eq!(err.category(), ErrorCategory::ClientRequest);
	assert_eq!(err.is_retryable(), Some(false));

	Ok(())
}

#[tokio::test]
async fn zendesk_metadata_is_unsupported() -> Result<()> {
	let server = MockServer::start_async().await;
	let err = zendesk(&server)
		.list_object_metadata(&RequestContext::background(), &["tickets".to_owned()])
		.await
		.expect_err("Zendesk exposes no metadata listing.");

	assert!(matches!(err, Error::Unsupported { ref provider, .. } if provider == "zendesk"));

	Ok(())
}
