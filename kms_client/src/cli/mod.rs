//! `kms_query` command line interface.
//!
//! ```shell
//! kms_query [--contract <addr>] [--identity-path <path>] [--timeout-secs <n>] \
//!     [<endpoint>...] <command> <args>...
//! ```
//!
//! See [`Command`] for the commands and their arguments.

use std::{env, fmt};

use crate::{
	config::{self, ClientConfig},
	envelope::QueryResult,
	error::ClientError,
	msg::QueryMsg,
};

pub mod parser;

use parser::{hex_arg, u64_arg, Invocation, ParserError, QueryArgs};

const USAGE: &str = "\
Usage: kms_query [options] [<endpoint>...] get_secret_key <service_id> <quoteHex> <collateralHex>
       kms_query [options] [<endpoint>...] get_env_by_image <quoteHex> <collateralHex>
       kms_query [options] [<endpoint>...] get_secret_key_by_image <quoteHex> <collateralHex>

Endpoints given on the command line are tried before the built-in ones.

Options:
	--contract <addr>       Contract to query [default: secret1w500qy39wtwaghwn9e5qu5sx23k2xtjfkj20as]
	--identity-path <path>  Identity key file [default: ~/id_tx_io.json]
	--timeout-secs <n>      Per request timeout [default: 10]
	--help                  Display this message
	--version               Display the version";

/// Commands for the CLI. Each builds one [`QueryMsg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	/// `get_secret_key <service_id> <quoteHex> <collateralHex>`
	GetSecretKey,
	/// `get_env_by_image <quoteHex> <collateralHex>`
	GetEnvByImage,
	/// `get_secret_key_by_image <quoteHex> <collateralHex>`
	GetSecretKeyByImage,
}

impl Command {
	/// Look up a command by its command line name.
	#[must_use]
	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"get_secret_key" => Some(Self::GetSecretKey),
			"get_env_by_image" => Some(Self::GetEnvByImage),
			"get_secret_key_by_image" => Some(Self::GetSecretKeyByImage),
			_ => None,
		}
	}

	/// Command line name.
	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			Self::GetSecretKey => "get_secret_key",
			Self::GetEnvByImage => "get_env_by_image",
			Self::GetSecretKeyByImage => "get_secret_key_by_image",
		}
	}

	fn arg_count(self) -> usize {
		match self {
			Self::GetSecretKey => 3,
			Self::GetEnvByImage | Self::GetSecretKeyByImage => 2,
		}
	}

	/// Build the query from the positional arguments following the command.
	pub fn build(self, args: &[&str]) -> Result<QueryMsg, ParserError> {
		Ok(match (self, args) {
			(Self::GetSecretKey, [service_id, quote, collateral]) => {
				QueryMsg::GetSecretKey {
					collateral: hex_arg("collateralHex", collateral)?,
					quote: hex_arg("quoteHex", quote)?,
					service_id: u64_arg("service_id", service_id)?,
				}
			}
			(Self::GetEnvByImage, [quote, collateral]) => QueryMsg::GetEnvByImage {
				collateral: hex_arg("collateralHex", collateral)?,
				quote: hex_arg("quoteHex", quote)?,
			},
			(Self::GetSecretKeyByImage, [quote, collateral]) => {
				QueryMsg::GetSecretKeyByImage {
					collateral: hex_arg("collateralHex", collateral)?,
					quote: hex_arg("quoteHex", quote)?,
				}
			}
			(command, args) => {
				return Err(ParserError::WrongArgumentCount {
					command,
					expected: command.arg_count(),
					actual: args.len(),
				})
			}
		})
	}
}

/// Why the CLI did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
	/// The command line could not be parsed.
	Usage(ParserError),
	/// The query failed.
	Query(ClientError),
}

impl fmt::Display for CliError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Usage(e) => write!(f, "{e}"),
			Self::Query(e) => write!(f, "{e}"),
		}
	}
}

impl std::error::Error for CliError {}

impl From<ParserError> for CliError {
	fn from(e: ParserError) -> Self {
		Self::Usage(e)
	}
}

impl From<ClientError> for CliError {
	fn from(e: ClientError) -> Self {
		Self::Query(e)
	}
}

/// Client command line interface
pub struct CLI;

impl CLI {
	/// Execute the command line interface with the process arguments and
	/// return the exit code.
	#[must_use]
	pub fn execute() -> i32 {
		let args: Vec<String> = env::args().skip(1).collect();

		match Self::run(&args) {
			Ok(output) => {
				println!("{output}");
				0
			}
			Err(CliError::Usage(e)) => {
				eprintln!("Error: {e}");
				eprintln!("{USAGE}");
				1
			}
			Err(CliError::Query(e)) => {
				eprintln!("Error: {e}");
				1
			}
		}
	}

	/// Run the command line `args` (without the program name) and return
	/// what should be printed to stdout.
	pub fn run(args: &[String]) -> Result<String, CliError> {
		match parser::parse(args)? {
			Invocation::Help => Ok(USAGE.to_string()),
			Invocation::Version => {
				Ok(format!("version: {}", env!("CARGO_PKG_VERSION")))
			}
			Invocation::Query(args) => {
				let result = handlers::query(args)?;
				handlers::render(&result).map_err(CliError::from)
			}
		}
	}
}

mod handlers {
	use super::{config, ClientConfig, ClientError, QueryArgs, QueryResult};
	use crate::orchestrator;

	pub(super) fn query(args: QueryArgs) -> Result<QueryResult, ClientError> {
		let identity_path = match args.identity_path {
			Some(path) => path,
			None => config::default_identity_path()?,
		};

		let mut config = ClientConfig::new(&args.endpoints, identity_path);
		if let Some(contract) = args.contract {
			config.contract_address = contract;
		}
		if let Some(timeout) = args.timeout {
			config.timeout = timeout;
		}

		tracing::debug!(
			endpoints = config.endpoints.len(),
			contract = %config.contract_address,
			"running query"
		);
		orchestrator::run_query(&config, &args.query)
	}

	pub(super) fn render(result: &QueryResult) -> Result<String, ClientError> {
		Ok(serde_json::to_string_pretty(result)?)
	}
}
