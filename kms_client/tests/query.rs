use std::{
	net::TcpListener,
	time::{Duration, Instant},
};

use kms_client::{
	config::ClientConfig,
	error::ClientError,
	identity_store,
	msg::QueryMsg,
	orchestrator::{self, EndpointOrchestrator},
	request::UreqTransport,
};
use kms_test_primitives::{
	find_free_port, EnclaveNode, FakeEnclave, PathWrapper, Reply,
};
use serde_json::json;

const CONTRACT: &str = "secret1w500qy39wtwaghwn9e5qu5sx23k2xtjfkj20as";
const CODE_HASH: &str = "af74387e";
const TIMEOUT: Duration = Duration::from_secs(5);

fn enclave_server(reply: Reply) -> EnclaveNode {
	EnclaveNode::spawn(FakeEnclave::new(CODE_HASH, reply))
}

fn query() -> QueryMsg {
	QueryMsg::GetSecretKeyByImage { collateral: vec![1, 2], quote: vec![3, 4] }
}

#[test]
fn round_trip_over_http() {
	let server = enclave_server(Reply::Data(json!({ "secret_key": "beef" })));
	let dir = PathWrapper::random("kms_client_round_trip");
	let identity = identity_store::load_or_create(dir.join("id.json")).unwrap();
	let orchestrator = EndpointOrchestrator::new(
		UreqTransport::new(TIMEOUT),
		vec![server.url()],
		CONTRACT,
	);

	let result = orchestrator.query(&identity, &query()).unwrap();

	assert_eq!(result["secret_key"], "beef");
	let requests = server.requests();
	assert_eq!(requests.len(), 3);
	assert_eq!(
		requests[0],
		format!("/compute/v1beta1/code_hash/by_contract_address/{CONTRACT}")
	);
	assert_eq!(requests[1], "/registration/v1beta1/tx-key");
	assert!(requests[2]
		.starts_with(&format!("/compute/v1beta1/query/{CONTRACT}?query=")));
}

#[test]
fn unreachable_endpoint_falls_through() {
	let server = enclave_server(Reply::Echo);
	let dead = format!("http://127.0.0.1:{}", find_free_port().unwrap());
	let orchestrator = EndpointOrchestrator::new(
		UreqTransport::new(TIMEOUT),
		vec![dead, server.url()],
		CONTRACT,
	);

	let result = orchestrator
		.query(&kms_crypto::IdentityKeyPair::generate(), &query())
		.unwrap();

	assert_eq!(
		result["echo"],
		json!({ "get_secret_key_by_image": { "collateral": [1, 2], "quote": [3, 4] } })
	);
}

#[test]
fn unresponsive_endpoint_times_out_and_falls_through() {
	// Connections are queued in the backlog but never accepted or answered.
	let silent = TcpListener::bind(("127.0.0.1", 0)).unwrap();
	let silent_url = format!("http://{}", silent.local_addr().unwrap());
	let server = enclave_server(Reply::Data(json!({ "secret_key": "beef" })));
	let orchestrator = EndpointOrchestrator::new(
		UreqTransport::new(Duration::from_secs(1)),
		vec![silent_url, server.url()],
		CONTRACT,
	);

	let started = Instant::now();
	let result = orchestrator
		.query(&kms_crypto::IdentityKeyPair::generate(), &query())
		.unwrap();

	assert_eq!(result["secret_key"], "beef");
	let elapsed = started.elapsed();
	assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
	assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
	assert_eq!(server.requests().len(), 3);
}

#[test]
fn enclave_error_is_read_from_error_status() {
	let server = enclave_server(Reply::Message("quote expired".to_string()));
	let orchestrator = EndpointOrchestrator::new(
		UreqTransport::new(TIMEOUT),
		vec![server.url()],
		CONTRACT,
	);

	let result = orchestrator
		.query(&kms_crypto::IdentityKeyPair::generate(), &query())
		.unwrap();

	assert_eq!(result["message"], "quote expired");
}

#[test]
fn every_endpoint_failing_reports_the_first() {
	let mut not_found = mockito::Server::new();
	let lookup = not_found
		.mock("GET", mockito::Matcher::Any)
		.with_status(404)
		.with_header("content-type", "application/json")
		.with_body(r#"{"code":5,"message":"not found"}"#)
		.expect(1)
		.create();
	let dead = format!("http://127.0.0.1:{}", find_free_port().unwrap());
	let orchestrator = EndpointOrchestrator::new(
		UreqTransport::new(TIMEOUT),
		vec![not_found.url(), dead],
		CONTRACT,
	);

	let err = orchestrator
		.query(&kms_crypto::IdentityKeyPair::generate(), &query())
		.unwrap_err();

	// The first endpoint answered the code hash lookup with a json error.
	assert!(
		matches!(&err, ClientError::AllEndpointsFailed(first)
			if matches!(**first, ClientError::Protocol(_))),
		"{err:?}"
	);
	lookup.assert();
}

#[test]
fn run_query_creates_identity_once() {
	let server = enclave_server(Reply::Echo);
	let dir = PathWrapper::random("kms_client_run_query");
	let mut config = ClientConfig::new(Vec::<String>::new(), dir.join("id.json"));
	config.endpoints = vec![server.url()];
	config.timeout = TIMEOUT;

	orchestrator::run_query(&config, &query()).unwrap();
	let first = identity_store::load_or_create(&config.identity_path).unwrap();
	orchestrator::run_query(&config, &query()).unwrap();
	let second = identity_store::load_or_create(&config.identity_path).unwrap();

	assert_eq!(first.public_bytes(), second.public_bytes());
}

#[test]
fn unreadable_identity_is_fatal() {
	let server = enclave_server(Reply::Echo);
	let dir = PathWrapper::random("kms_client_bad_identity");
	std::fs::create_dir_all(&*dir).unwrap();
	let path = dir.join("id.json");
	std::fs::write(&path, "garbage").unwrap();

	let mut config = ClientConfig::new(Vec::<String>::new(), path);
	config.endpoints = vec![server.url()];

	assert!(matches!(
		orchestrator::run_query(&config, &query()).unwrap_err(),
		ClientError::Storage(_)
	));
	assert!(server.requests().is_empty());
}
