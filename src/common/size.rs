//! Parsing of human-readable byte-size strings (`"100kb"`, `"1mb"`) used by body
//! parser `limit` options.

// ----------

use super::ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Debug, ImplError)]
#[error("invalid size string {0:?}")]
pub(crate) struct SizeParseError(String);

/// A parsed byte-count limit. `Bytes(usize)` is the always-available form produced by
/// a bare number; `from_str` additionally understands the common unit suffixes.
pub(crate) fn parse_size(input: &str) -> Result<usize, SizeParseError> {
	let trimmed = input.trim();

	if let Ok(n) = trimmed.parse::<usize>() {
		return Ok(n);
	}

	let lower = trimmed.to_ascii_lowercase();
	let split_at = lower.find(|c: char| !c.is_ascii_digit() && c != '.');

	let Some(split_at) = split_at else {
		return Err(SizeParseError(input.to_owned()));
	};

	let (number_part, unit_part) = lower.split_at(split_at);

	let number: f64 = number_part
		.parse()
		.map_err(|_| SizeParseError(input.to_owned()))?;

	let multiplier: f64 = match unit_part.trim() {
		"b" => 1.0,
		"kb" | "k" => 1024.0,
		"mb" | "m" => 1024.0 * 1024.0,
		"gb" | "g" => 1024.0 * 1024.0 * 1024.0,
		_ => return Err(SizeParseError(input.to_owned())),
	};

	Ok((number * multiplier).round() as usize)
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_plain_numbers() {
		assert_eq!(parse_size("100").unwrap(), 100);
	}

	#[test]
	fn parses_units() {
		assert_eq!(parse_size("1kb").unwrap(), 1024);
		assert_eq!(parse_size("2mb").unwrap(), 2 * 1024 * 1024);
		assert_eq!(parse_size("1.5kb").unwrap(), 1536);
	}

	#[test]
	fn rejects_garbage() {
		assert!(parse_size("not-a-size").is_err());
	}
}
