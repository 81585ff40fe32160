//! Client for encrypted queries to a Secret Network KMS contract.
//!
//! The flow for every endpoint is: fetch the contract code hash and the
//! enclave's consensus IO key ([`consensus`]), seal the query
//! ([`envelope`]), send it, and open whichever response envelope comes back.
//! [`orchestrator::EndpointOrchestrator`] repeats that across endpoints until
//! one succeeds.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod consensus;
pub mod envelope;
pub mod error;
pub mod identity_store;
pub mod msg;
pub mod orchestrator;

/// Blocking HTTP helpers.
pub mod request {
	use std::{io::Read, time::Duration};

	use crate::error::ClientError;

	const MAX_SIZE: u64 = 16 * 1024 * 1024;

	/// Status and body of an HTTP response.
	#[derive(Debug, Clone, PartialEq, Eq)]
	pub struct HttpResponse {
		/// HTTP status code.
		pub status: u16,
		/// Response body.
		pub body: String,
	}

	/// Something that can `GET` a URL.
	///
	/// Non-2xx responses are returned as `Ok`: nodes report enclave errors
	/// with an error status and a JSON body that still needs parsing. Only
	/// failing to get any response at all is an error.
	pub trait Transport {
		/// Get the resource at `url`.
		fn get(&self, url: &str) -> Result<HttpResponse, ClientError>;
	}

	/// [`Transport`] backed by a [`ureq::Agent`].
	#[derive(Debug, Clone)]
	pub struct UreqTransport {
		agent: ureq::Agent,
	}

	impl UreqTransport {
		/// Create a transport where every request times out after `timeout`.
		#[must_use]
		pub fn new(timeout: Duration) -> Self {
			Self { agent: ureq::AgentBuilder::new().timeout(timeout).build() }
		}
	}

	impl Transport for UreqTransport {
		fn get(&self, url: &str) -> Result<HttpResponse, ClientError> {
			let response = match self.agent.get(url).call() {
				Ok(response) | Err(ureq::Error::Status(_, response)) => {
					response
				}
				Err(ureq::Error::Transport(e)) => {
					return Err(ClientError::Transport(format!(
						"GET {url} failed: {e}"
					)))
				}
			};

			let status = response.status();
			let mut body = String::new();
			response
				.into_reader()
				.take(MAX_SIZE)
				.read_to_string(&mut body)
				.map_err(|e| {
					ClientError::Transport(format!(
						"GET {url} failed to read body: {e}"
					))
				})?;

			Ok(HttpResponse { status, body })
		}
	}
}
