//! Compiles the `trust proxy` setting into a predicate over `(remote_addr, hop_index)`,
//! used to decide how far into `X-Forwarded-*` headers `req.ip`/`req.ips`/`req.protocol`
//! are allowed to look.

// ----------

use std::{net::IpAddr, sync::Arc};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Subnet {
	network: IpAddr,
	prefix_len: u8,
}

impl Subnet {
	fn new(network: &str, prefix_len: u8) -> Self {
		Self {
			network: network.parse().expect("hardcoded subnet literal"),
			prefix_len,
		}
	}

	fn contains(&self, addr: IpAddr) -> bool {
		match (self.network, addr) {
			(IpAddr::V4(net), IpAddr::V4(addr)) => {
				let mask = if self.prefix_len == 0 {
					0
				} else {
					u32::MAX << (32 - self.prefix_len)
				};
				(u32::from(net) & mask) == (u32::from(addr) & mask)
			}
			(IpAddr::V6(net), IpAddr::V6(addr)) => {
				let mask = if self.prefix_len == 0 {
					0u128
				} else {
					u128::MAX << (128 - self.prefix_len)
				};
				(u128::from(net) & mask) == (u128::from(addr) & mask)
			}
			_ => false,
		}
	}

	fn parse_cidr(spec: &str) -> Option<Subnet> {
		if let Some((network, prefix)) = spec.split_once('/') {
			let network = network.parse().ok()?;
			let prefix_len = prefix.parse().ok()?;
			Some(Subnet { network, prefix_len })
		} else {
			let network = spec.parse().ok()?;
			let prefix_len = match network {
				IpAddr::V4(_) => 32,
				IpAddr::V6(_) => 128,
			};
			Some(Subnet { network, prefix_len })
		}
	}

	fn named(name: &str) -> Option<Vec<Subnet>> {
		match name {
			"loopback" => Some(vec![Subnet::new("127.0.0.1", 8), Subnet::new("::1", 128)]),
			"linklocal" => Some(vec![
				Subnet::new("169.254.0.0", 16),
				Subnet::new("fe80::", 10),
			]),
			"uniquelocal" => Some(vec![
				Subnet::new("10.0.0.0", 8),
				Subnet::new("172.16.0.0", 12),
				Subnet::new("192.168.0.0", 16),
				Subnet::new("fc00::", 7),
			]),
			_ => None,
		}
	}
}

// --------------------------------------------------------------------------------

/// A parsed `trust proxy` setting value, as supplied through `Application::set`.
pub enum TrustProxySetting {
	Boolean(bool),
	HopCount(usize),
	/// Comma-separated list of named subnets (`loopback`, `linklocal`, `uniquelocal`),
	/// bare IPs, or CIDR ranges.
	List(String),
	Custom(Arc<dyn Fn(IpAddr, usize) -> bool + Send + Sync>),
}

#[derive(Clone)]
pub(crate) enum TrustProxy {
	Never,
	Always,
	HopCount(usize),
	Subnets(Vec<Subnet>),
	Custom(Arc<dyn Fn(IpAddr, usize) -> bool + Send + Sync>),
}

impl TrustProxy {
	pub(crate) fn compile(setting: &TrustProxySetting) -> TrustProxy {
		match setting {
			TrustProxySetting::Boolean(true) => TrustProxy::Always,
			TrustProxySetting::Boolean(false) => TrustProxy::Never,
			TrustProxySetting::HopCount(n) => TrustProxy::HopCount(*n),
			TrustProxySetting::Custom(f) => TrustProxy::Custom(Arc::clone(f)),
			TrustProxySetting::List(list) => {
				let subnets = list
					.split(',')
					.map(str::trim)
					.filter(|s| !s.is_empty())
					.flat_map(|entry| Subnet::named(entry).unwrap_or_else(|| Subnet::parse_cidr(entry).into_iter().collect()))
					.collect();
				TrustProxy::Subnets(subnets)
			}
		}
	}

	pub(crate) fn trusts(&self, remote: IpAddr, hop_index: usize) -> bool {
		match self {
			TrustProxy::Never => false,
			TrustProxy::Always => true,
			TrustProxy::HopCount(n) => hop_index < *n,
			TrustProxy::Subnets(subnets) => subnets.iter().any(|s| s.contains(remote)),
			TrustProxy::Custom(f) => f(remote, hop_index),
		}
	}
}

impl Default for TrustProxy {
	fn default() -> Self {
		TrustProxy::Never
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hop_count_trusts_only_up_to_n() {
		let trust = TrustProxy::HopCount(2);
		assert!(trust.trusts("10.0.0.1".parse().unwrap(), 0));
		assert!(trust.trusts("10.0.0.1".parse().unwrap(), 1));
		assert!(!trust.trusts("10.0.0.1".parse().unwrap(), 2));
	}

	#[test]
	fn named_subnet_matches_loopback() {
		let trust = TrustProxy::compile(&TrustProxySetting::List("loopback".into()));
		assert!(trust.trusts("127.0.0.1".parse().unwrap(), 0));
		assert!(!trust.trusts("8.8.8.8".parse().unwrap(), 0));
	}

	#[test]
	fn cidr_range_matches() {
		let trust = TrustProxy::compile(&TrustProxySetting::List("192.168.1.0/24".into()));
		assert!(trust.trusts("192.168.1.42".parse().unwrap(), 0));
		assert!(!trust.trusts("192.168.2.42".parse().unwrap(), 0));
	}
}
