//! An in-process [`SessionStore`], suitable for single-instance deployments and tests.
//! Records live in a `Mutex`-guarded map; a background task sweeps expired entries so
//! an idle store doesn't grow without bound.

// ----------

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::{Duration, SystemTime},
};

use conduit_core::BoxedFuture;

use super::{SessionRecord, SessionStore};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// An in-memory session store. Construct with [`MemoryStore::new`] and spawn
/// [`MemoryStore::spawn_sweeper`] once, on a Tokio runtime, to reclaim expired entries.
#[derive(Default)]
pub struct MemoryStore {
	records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Removes every record whose `expires_at` is in the past. Called periodically by
	/// [`Self::spawn_sweeper`]; exposed directly so callers without a Tokio runtime can
	/// drive it from their own scheduler.
	pub fn sweep(&self) {
		let now = SystemTime::now();
		let mut records = self.records.lock().expect(crate::common::SCOPE_VALIDITY);
		records.retain(|_, record| record.expires_at > now);
	}

	/// Spawns a background task that calls [`Self::sweep`] on `interval`. The task runs
	/// until every other reference to this store is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) {
		let store = Arc::downgrade(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				let Some(store) = store.upgrade() else { break };
				store.sweep();
			}
		});
	}
}

impl SessionStore for MemoryStore {
	fn get(&self, id: &str) -> BoxedFuture<Option<SessionRecord>> {
		let record = self
			.records
			.lock()
			.expect(crate::common::SCOPE_VALIDITY)
			.get(id)
			.filter(|record| record.expires_at > SystemTime::now())
			.cloned();

		Box::pin(async move { record })
	}

	fn set(&self, id: String, record: SessionRecord) -> BoxedFuture<()> {
		self.records.lock().expect(crate::common::SCOPE_VALIDITY).insert(id, record);
		Box::pin(async {})
	}

	fn destroy(&self, id: &str) -> BoxedFuture<()> {
		self.records.lock().expect(crate::common::SCOPE_VALIDITY).remove(id);
		Box::pin(async {})
	}

	fn touch(&self, id: &str, expires_at: SystemTime) -> BoxedFuture<()> {
		if let Some(record) = self.records.lock().expect(crate::common::SCOPE_VALIDITY).get_mut(id) {
			record.expires_at = expires_at;
		}
		Box::pin(async {})
	}

	fn all(&self) -> BoxedFuture<Vec<String>> {
		let ids = self.records.lock().expect(crate::common::SCOPE_VALIDITY).keys().cloned().collect();
		Box::pin(async move { ids })
	}

	fn length(&self) -> BoxedFuture<usize> {
		let len = self.records.lock().expect(crate::common::SCOPE_VALIDITY).len();
		Box::pin(async move { len })
	}

	fn clear(&self) -> BoxedFuture<()> {
		self.records.lock().expect(crate::common::SCOPE_VALIDITY).clear();
		Box::pin(async {})
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	fn record(seconds_from_now: i64) -> SessionRecord {
		SessionRecord {
			data: HashMap::new(),
			expires_at: if seconds_from_now >= 0 {
				SystemTime::now() + Duration::from_secs(seconds_from_now as u64)
			} else {
				SystemTime::now() - Duration::from_secs((-seconds_from_now) as u64)
			},
		}
	}

	#[tokio::test]
	async fn expired_records_are_not_returned() {
		let store = MemoryStore::new();
		store.set("a".to_owned(), record(-10)).await;
		assert!(store.get("a").await.is_none());
	}

	#[tokio::test]
	async fn sweep_evicts_expired_entries() {
		let store = MemoryStore::new();
		store.set("a".to_owned(), record(-10)).await;
		store.set("b".to_owned(), record(60)).await;
		store.sweep();
		assert_eq!(store.length().await, 1);
	}

	#[tokio::test]
	async fn destroy_removes_entry() {
		let store = MemoryStore::new();
		store.set("a".to_owned(), record(60)).await;
		store.destroy("a").await;
		assert!(store.get("a").await.is_none());
	}
}
