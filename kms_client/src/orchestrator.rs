//! Running a query against a list of nodes until one of them answers.

use kms_crypto::{IdentityKeyPair, QuerySession};

use crate::{
	config::ClientConfig,
	consensus,
	envelope::{self, QueryResult},
	error::ClientError,
	identity_store,
	msg::QueryMsg,
	request::{Transport, UreqTransport},
};

/// Tries each endpoint once, in order, and returns the first successful
/// result.
///
/// There is no delay between endpoints and no second pass. Every attempt
/// gets its own [`QuerySession`], so no nonce is reused across endpoints.
#[derive(Debug)]
pub struct EndpointOrchestrator<T> {
	transport: T,
	endpoints: Vec<String>,
	contract_address: String,
}

impl EndpointOrchestrator<UreqTransport> {
	/// Orchestrator over HTTP using the endpoints, contract and timeout from
	/// `config`.
	#[must_use]
	pub fn from_config(config: &ClientConfig) -> Self {
		Self::new(
			UreqTransport::new(config.timeout),
			config.endpoints.clone(),
			config.contract_address.clone(),
		)
	}
}

impl<T: Transport> EndpointOrchestrator<T> {
	/// Create a new orchestrator.
	pub fn new(
		transport: T,
		endpoints: Vec<String>,
		contract_address: impl Into<String>,
	) -> Self {
		Self { transport, endpoints, contract_address: contract_address.into() }
	}

	/// Endpoints in the order they are tried.
	#[must_use]
	pub fn endpoints(&self) -> &[String] {
		&self.endpoints
	}

	/// Run `query` as `identity`.
	///
	/// If every endpoint fails the error from the first one is returned,
	/// wrapped in [`ClientError::AllEndpointsFailed`]; later errors are only
	/// logged.
	pub fn query(
		&self,
		identity: &IdentityKeyPair,
		query: &QueryMsg,
	) -> Result<QueryResult, ClientError> {
		let mut first_error = None;

		for base in &self.endpoints {
			tracing::debug!(endpoint = %base, "trying endpoint");
			match self.try_endpoint(base, identity, query) {
				Ok(result) => {
					tracing::info!(endpoint = %base, "query succeeded");
					return Ok(result);
				}
				Err(e) => {
					tracing::warn!(endpoint = %base, error = %e, "endpoint failed");
					first_error.get_or_insert(e);
				}
			}
		}

		Err(first_error.map_or(ClientError::NoEndpoints, |e| {
			ClientError::AllEndpointsFailed(Box::new(e))
		}))
	}

	/// One full attempt against the node at `base`: look up the code hash and
	/// enclave key, seal, send and open the response.
	pub fn try_endpoint(
		&self,
		base: &str,
		identity: &IdentityKeyPair,
		query: &QueryMsg,
	) -> Result<QueryResult, ClientError> {
		let code_hash = consensus::fetch_code_hash(
			&self.transport,
			base,
			&self.contract_address,
		)?;

		let session = QuerySession::new(identity);
		let enclave_key =
			consensus::fetch_enclave_public_key(&self.transport, base)?;
		let key = session.derive_key(&enclave_key)?;

		let payload = envelope::seal_query(&session, &key, &code_hash, query)?;
		let url = envelope::query_url(base, &self.contract_address, &payload);
		let response = self.transport.get(&url)?;
		tracing::debug!(
			endpoint = %base,
			status = response.status,
			"query response"
		);

		envelope::parse_response(&response.body, &key)
	}
}

/// Load (or create) the identity at `config.identity_path` and run `query`
/// over HTTP.
///
/// The identity is loaded before any endpoint is contacted; failing to load
/// it fails the whole query.
pub fn run_query(
	config: &ClientConfig,
	query: &QueryMsg,
) -> Result<QueryResult, ClientError> {
	let identity = identity_store::load_or_create(&config.identity_path)?;
	EndpointOrchestrator::from_config(config).query(&identity, query)
}
