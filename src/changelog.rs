//! Record of modifications made to the directory
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::dn::Dn;

/// Kind of a recorded change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
	/// An entry was added
	Add,
	/// An entry was deleted
	Delete,
	/// An entry's attributes were modified
	Modify,
}

/// A single change log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
	/// Monotonically increasing revision, starting at 1
	pub revision: u64,
	/// The entry that was changed
	pub dn: Dn,
	/// What happened to it
	pub kind: ChangeKind,
	/// When it happened
	pub timestamp: OffsetDateTime,
}

/// In-memory change log. Records nothing while disabled.
#[derive(Debug)]
pub struct ChangeLog {
	/// Whether changes are recorded
	enabled: bool,
	/// Records, oldest first
	records: Mutex<Vec<ChangeRecord>>,
}

impl ChangeLog {
	/// Create an empty change log.
	#[must_use]
	pub fn new(enabled: bool) -> Self {
		ChangeLog { enabled, records: Mutex::new(Vec::new()) }
	}

	/// Whether changes are recorded.
	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Record a change, if enabled.
	pub(crate) async fn log(&self, dn: &Dn, kind: ChangeKind) {
		if !self.enabled {
			return;
		}
		let mut records = self.records.lock().await;
		let revision = records.last().map_or(1, |record| record.revision + 1);
		records.push(ChangeRecord {
			revision,
			dn: dn.clone(),
			kind,
			timestamp: OffsetDateTime::now_utc(),
		});
	}

	/// The latest revision, 0 if nothing was recorded.
	pub async fn current_revision(&self) -> u64 {
		self.records.lock().await.last().map_or(0, |record| record.revision)
	}

	/// A copy of all records.
	pub async fn records(&self) -> Vec<ChangeRecord> {
		self.records.lock().await.clone()
	}
}
