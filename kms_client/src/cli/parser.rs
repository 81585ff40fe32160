//! Command line token parser.
//!
//! Inputs are read left to right: `--name value` options, then any number of
//! endpoint base URLs, then a command followed by exactly its positional
//! arguments.

use std::{collections::HashMap, fmt, path::PathBuf, time::Duration};

use super::Command;
use crate::msg::QueryMsg;

const HELP_INPUT: &str = "--help";
const VERSION_INPUT: &str = "--version";
const INPUT_PREFIX: &str = "--";

/// `--contract <addr>`
pub const CONTRACT: &str = "contract";
/// `--identity-path <path>`
pub const IDENTITY_PATH: &str = "identity-path";
/// `--timeout-secs <n>`
pub const TIMEOUT_SECS: &str = "timeout-secs";

const VALUE_OPTIONS: [&str; 3] = [CONTRACT, IDENTITY_PATH, TIMEOUT_SECS];

/// Token parsing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
	/// The input was not expected.
	UnexpectedInput(String),
	/// A value for the input was not provided.
	MissingValue(String),
	/// The input was provided more than once.
	DuplicateInput(String),
	/// None of the commands was given.
	MissingCommand,
	/// The command got the wrong number of positional arguments.
	WrongArgumentCount {
		/// The command.
		command: Command,
		/// Number of arguments it takes.
		expected: usize,
		/// Number of arguments given.
		actual: usize,
	},
	/// A value could not be parsed.
	InvalidValue {
		/// Name of the argument.
		name: String,
		/// Why it was rejected.
		reason: String,
	},
}

impl fmt::Display for ParserError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UnexpectedInput(i) => write!(f, "unexpected input `{i}`"),
			Self::MissingValue(name) => write!(f, "missing value for --{name}"),
			Self::DuplicateInput(name) => {
				write!(f, "--{name} given more than once")
			}
			Self::MissingCommand => write!(f, "missing command"),
			Self::WrongArgumentCount { command, expected, actual } => write!(
				f,
				"{} takes {expected} arguments, got {actual}",
				command.name()
			),
			Self::InvalidValue { name, reason } => {
				write!(f, "invalid {name}: {reason}")
			}
		}
	}
}

impl std::error::Error for ParserError {}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
	/// Print usage.
	Help,
	/// Print the version.
	Version,
	/// Run a query.
	Query(QueryArgs),
}

/// A parsed query invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
	/// Endpoints given on the command line, tried before the defaults.
	pub endpoints: Vec<String>,
	/// `--contract`, if given.
	pub contract: Option<String>,
	/// `--identity-path`, if given.
	pub identity_path: Option<PathBuf>,
	/// `--timeout-secs`, if given.
	pub timeout: Option<Duration>,
	/// The query built from the command and its arguments.
	pub query: QueryMsg,
}

/// Parse the command line inputs, not including the program name.
///
/// # Special Cases
///
/// * If `--help` is present, we ignore all the inputs.
/// * If `--version` is present, we ignore all other inputs except help.
pub fn parse(inputs: &[String]) -> Result<Invocation, ParserError> {
	if inputs.iter().any(|i| i == HELP_INPUT) {
		return Ok(Invocation::Help);
	}
	if inputs.iter().any(|i| i == VERSION_INPUT) {
		return Ok(Invocation::Version);
	}

	let mut options: HashMap<&str, String> = HashMap::new();
	let mut endpoints = Vec::new();
	let mut iter = inputs.iter();

	let command = loop {
		let input = iter.next().ok_or(ParserError::MissingCommand)?;

		if let Some(name) = input.strip_prefix(INPUT_PREFIX) {
			let name = VALUE_OPTIONS
				.into_iter()
				.find(|option| *option == name)
				.ok_or_else(|| ParserError::UnexpectedInput(input.clone()))?;
			let value = iter
				.next()
				.filter(|i| !i.starts_with(INPUT_PREFIX))
				.ok_or_else(|| ParserError::MissingValue(name.to_string()))?;
			if options.insert(name, value.clone()).is_some() {
				return Err(ParserError::DuplicateInput(name.to_string()));
			}
		} else if let Some(command) = Command::from_name(input) {
			break command;
		} else {
			endpoints.push(input.clone());
		}
	};

	let args: Vec<&str> = iter.map(String::as_str).collect();
	let query = command.build(&args)?;

	Ok(Invocation::Query(QueryArgs {
		endpoints,
		contract: options.remove(CONTRACT),
		identity_path: options.remove(IDENTITY_PATH).map(PathBuf::from),
		timeout: options
			.remove(TIMEOUT_SECS)
			.map(|secs| parse_timeout(&secs))
			.transpose()?,
		query,
	}))
}

/// Parse a hex encoded argument.
pub fn hex_arg(name: &str, value: &str) -> Result<Vec<u8>, ParserError> {
	hex::decode(value).map_err(|e| ParserError::InvalidValue {
		name: name.to_string(),
		reason: e.to_string(),
	})
}

/// Parse a decimal integer argument.
pub fn u64_arg(name: &str, value: &str) -> Result<u64, ParserError> {
	value.parse().map_err(|e: std::num::ParseIntError| {
		ParserError::InvalidValue {
			name: name.to_string(),
			reason: e.to_string(),
		}
	})
}

fn parse_timeout(secs: &str) -> Result<Duration, ParserError> {
	match u64_arg(TIMEOUT_SECS, secs)? {
		0 => Err(ParserError::InvalidValue {
			name: TIMEOUT_SECS.to_string(),
			reason: "must be at least 1".to_string(),
		}),
		secs => Ok(Duration::from_secs(secs)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn inputs(s: &str) -> Vec<String> {
		s.split_whitespace().map(String::from).collect()
	}

	fn query_args(s: &str) -> QueryArgs {
		match parse(&inputs(s)).unwrap() {
			Invocation::Query(args) => args,
			other => panic!("expected a query, got {other:?}"),
		}
	}

	#[test]
	fn get_secret_key_with_endpoints() {
		let args =
			query_args("http://a:1317 http://b get_secret_key 42 cafe 0102");

		assert_eq!(args.endpoints, vec!["http://a:1317", "http://b"]);
		assert_eq!(
			args.query,
			QueryMsg::GetSecretKey {
				collateral: vec![1, 2],
				quote: vec![0xca, 0xfe],
				service_id: 42,
			}
		);
		assert_eq!(args.contract, None);
		assert_eq!(args.timeout, None);
	}

	#[test]
	fn by_image_commands() {
		assert_eq!(
			query_args("get_env_by_image aa bb").query,
			QueryMsg::GetEnvByImage { collateral: vec![0xbb], quote: vec![0xaa] }
		);
		assert_eq!(
			query_args("get_secret_key_by_image aa bb").query,
			QueryMsg::GetSecretKeyByImage {
				collateral: vec![0xbb],
				quote: vec![0xaa],
			}
		);
	}

	#[test]
	fn options_before_endpoints() {
		let args = query_args(
			"--contract secret1x --timeout-secs 3 --identity-path /tmp/id.json \
			 http://a get_env_by_image aa bb",
		);

		assert_eq!(args.contract.as_deref(), Some("secret1x"));
		assert_eq!(args.timeout, Some(Duration::from_secs(3)));
		assert_eq!(args.identity_path, Some(PathBuf::from("/tmp/id.json")));
		assert_eq!(args.endpoints, vec!["http://a"]);
	}

	#[test]
	fn help_and_version_win() {
		assert_eq!(
			parse(&inputs("get_secret_key --help")).unwrap(),
			Invocation::Help
		);
		assert_eq!(
			parse(&inputs("--version --bogus")).unwrap(),
			Invocation::Version
		);
	}

	#[test]
	fn usage_errors() {
		for (line, expected) in [
			("", ParserError::MissingCommand),
			("http://a", ParserError::MissingCommand),
			("--bogus x get_env_by_image aa bb", ParserError::UnexpectedInput(
				"--bogus".to_string(),
			)),
			("--contract", ParserError::MissingValue(CONTRACT.to_string())),
			(
				"--contract a --contract b get_env_by_image aa bb",
				ParserError::DuplicateInput(CONTRACT.to_string()),
			),
			(
				"get_env_by_image aa",
				ParserError::WrongArgumentCount {
					command: Command::GetEnvByImage,
					expected: 2,
					actual: 1,
				},
			),
		] {
			assert_eq!(parse(&inputs(line)).unwrap_err(), expected, "{line}");
		}
	}

	#[test]
	fn malformed_values_are_rejected() {
		for line in [
			"get_secret_key abc aa bb",
			"get_secret_key -1 aa bb",
			"get_secret_key 1 zz bb",
			"get_env_by_image aa abc",
			"--timeout-secs 0 get_env_by_image aa bb",
			"--timeout-secs ten get_env_by_image aa bb",
		] {
			assert!(
				matches!(
					parse(&inputs(line)).unwrap_err(),
					ParserError::InvalidValue { .. }
				),
				"{line}"
			);
		}
	}
}
