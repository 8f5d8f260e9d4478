//! Parsing of the query string into `req.query`.

// ----------

use std::collections::HashMap;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// A parsed query parameter value. A key seen once yields `Single`; a key repeated
/// (`?tag=a&tag=b`) yields `Multi`, mirroring the array-accumulation behavior of
/// Express's query-string parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
	Single(String),
	Multi(Vec<String>),
}

impl QueryValue {
	/// The first (or only) value.
	pub fn as_str(&self) -> &str {
		match self {
			QueryValue::Single(value) => value,
			QueryValue::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
		}
	}

	pub fn as_vec(&self) -> Vec<&str> {
		match self {
			QueryValue::Single(value) => vec![value.as_str()],
			QueryValue::Multi(values) => values.iter().map(String::as_str).collect(),
		}
	}
}

/// Parses a raw query string (without the leading `?`) into a key -> value(s) map.
pub(crate) fn parse_query(raw: &str) -> HashMap<String, QueryValue> {
	let mut map: HashMap<String, QueryValue> = HashMap::new();

	for pair in raw.split('&').filter(|p| !p.is_empty()) {
		let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
		let key = decode(raw_key);
		let value = decode(raw_value);

		map
			.entry(key)
			.and_modify(|existing| match existing {
				QueryValue::Single(first) => {
					*existing = QueryValue::Multi(vec![std::mem::take(first), value.clone()]);
				}
				QueryValue::Multi(values) => values.push(value.clone()),
			})
			.or_insert(QueryValue::Single(value));
	}

	map
}

fn decode(raw: &str) -> String {
	let replaced = raw.replace('+', " ");
	percent_encoding::percent_decode_str(&replaced)
		.decode_utf8()
		.map(|cow| cow.into_owned())
		.unwrap_or(replaced)
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn single_and_repeated_keys() {
		let parsed = parse_query("a=1&b=2&a=3");
		assert_eq!(
			parsed.get("a"),
			Some(&QueryValue::Multi(vec!["1".into(), "3".into()]))
		);
		assert_eq!(parsed.get("b"), Some(&QueryValue::Single("2".into())));
	}

	#[test]
	fn decodes_plus_and_percent_encoding() {
		let parsed = parse_query("q=hello+world%21");
		assert_eq!(parsed.get("q").unwrap().as_str(), "hello world!");
	}
}
