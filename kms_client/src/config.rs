//! Client configuration.

use std::{path::PathBuf, time::Duration};

use crate::error::ClientError;

/// Nodes that are tried after any user supplied endpoints.
pub const DEFAULT_ENDPOINTS: [&str; 5] = [
	"https://lcd.secret.tactus.starshell.net",
	"https://rpc.ankr.com/http/scrt_cosmos",
	"https://1rpc.io/scrt-lcd",
	"https://secretnetwork-api.lavenderfive.com:443",
	"https://rest-secret.01node.com",
];

/// The KMS contract queried by default.
pub const DEFAULT_CONTRACT_ADDRESS: &str =
	"secret1w500qy39wtwaghwn9e5qu5sx23k2xtjfkj20as";

/// Timeout applied to every HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the identity file inside the home directory.
pub const IDENTITY_FILE_NAME: &str = "id_tx_io.json";

/// Everything needed to run a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URLs of the nodes, in the order they are tried.
	pub endpoints: Vec<String>,
	/// Address of the contract to query.
	pub contract_address: String,
	/// Timeout for each HTTP request.
	pub timeout: Duration,
	/// Where the client identity key pair is persisted.
	pub identity_path: PathBuf,
}

impl ClientConfig {
	/// Configuration using the default contract and timeout, with
	/// `extra_endpoints` tried before the built-in ones.
	#[must_use]
	pub fn new<I, S>(extra_endpoints: I, identity_path: PathBuf) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		Self {
			endpoints: endpoint_list(extra_endpoints),
			contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
			timeout: DEFAULT_TIMEOUT,
			identity_path,
		}
	}
}

/// User endpoints first, then [`DEFAULT_ENDPOINTS`]. Trailing slashes are
/// dropped so paths can be appended directly.
pub fn endpoint_list<I, S>(extra_endpoints: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	extra_endpoints
		.into_iter()
		.map(|e| normalize_base(e.as_ref()))
		.chain(DEFAULT_ENDPOINTS.iter().map(|e| normalize_base(e)))
		.collect()
}

/// `<home>/id_tx_io.json`.
pub fn default_identity_path() -> Result<PathBuf, ClientError> {
	dirs::home_dir().map(|home| home.join(IDENTITY_FILE_NAME)).ok_or_else(
		|| ClientError::Storage("could not determine home directory".into()),
	)
}

fn normalize_base(base: &str) -> String {
	base.trim_end_matches('/').to_string()
}
