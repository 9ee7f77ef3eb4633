//! Storage of the entries below a suffix
use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

use ldap3_proto::proto::{LdapFilter, LdapSearchScope};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{dn::Dn, entry::Entry, error::Error, filter};

/// Name of the file a partition keeps its entries in
const STORE_FILE: &str = "entries.json";

/// A set of entries rooted at a suffix DN, kept in memory and written to a
/// JSON file in the working directory after every change.
#[derive(Debug)]
pub struct Partition {
	/// The partition ID
	id: String,
	/// DN of the partition root
	suffix: Dn,
	/// Location of the store file, set once the partition is initialized
	store: Option<PathBuf>,
	/// Entries keyed by normalised DN
	entries: RwLock<BTreeMap<String, Entry>>,
}

impl Partition {
	/// Create an empty partition.
	pub fn new(id: &str, suffix: Dn) -> Result<Self, Error> {
		let valid_id = !id.is_empty()
			&& id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
			&& id != "."
			&& id != "..";
		if !valid_id {
			return Err(Error::Config(format!("invalid partition id {id:?}")));
		}
		if suffix.is_root() {
			return Err(Error::Config("partition suffix must not be the empty DN".to_owned()));
		}
		Ok(Partition { id: id.to_owned(), suffix, store: None, entries: RwLock::default() })
	}

	/// The partition ID.
	#[must_use]
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The DN the partition is rooted at.
	#[must_use]
	pub fn suffix(&self) -> &Dn {
		&self.suffix
	}

	/// Create the partition's directory below `working_directory` and load
	/// any entries stored there previously.
	pub(crate) async fn initialize(&mut self, working_directory: &Path) -> Result<(), Error> {
		let directory = working_directory.join("partitions").join(&self.id);
		tokio::fs::create_dir_all(&directory).await?;
		let store = directory.join(STORE_FILE);

		let mut entries = BTreeMap::new();
		if tokio::fs::try_exists(&store).await? {
			let stored: Vec<Entry> = serde_json::from_slice(&tokio::fs::read(&store).await?)?;
			for entry in stored {
				if !entry.dn().is_within(&self.suffix) {
					warn!("Ignoring stored entry {} outside of {}", entry.dn(), self.suffix);
					continue;
				}
				entries.insert(entry.dn().normalized().to_owned(), entry);
			}
		}
		debug!("Partition {} loaded {} entries from {}", self.id, entries.len(), store.display());

		self.store = Some(store);
		*self.entries.get_mut() = entries;
		Ok(())
	}

	/// Whether an entry exists.
	pub(crate) async fn exists(&self, dn: &Dn) -> bool {
		self.entries.read().await.contains_key(dn.normalized())
	}

	/// A copy of an entry.
	pub(crate) async fn lookup(&self, dn: &Dn) -> Option<Entry> {
		self.entries.read().await.get(dn.normalized()).cloned()
	}

	/// Insert a new entry. Its parent must exist unless it is the suffix.
	pub(crate) async fn add(&self, entry: Entry) -> Result<(), Error> {
		let mut entries = self.entries.write().await;
		let key = entry.dn().normalized().to_owned();
		if entries.contains_key(&key) {
			return Err(Error::EntryAlreadyExists(entry.dn().to_string()));
		}
		if *entry.dn() != self.suffix {
			let parent = entry.dn().parent().unwrap_or_else(Dn::root);
			if !entries.contains_key(parent.normalized()) {
				return Err(Error::NoSuchObject(parent.to_string()));
			}
		}
		entries.insert(key.clone(), entry);
		if let Err(err) = self.persist(&entries).await {
			entries.remove(&key);
			return Err(err);
		}
		Ok(())
	}

	/// Remove a leaf entry.
	pub(crate) async fn delete(&self, dn: &Dn) -> Result<(), Error> {
		let mut entries = self.entries.write().await;
		if entries.values().any(|entry| dn.is_parent_of(entry.dn())) {
			return Err(Error::NotAllowedOnNonLeaf(dn.to_string()));
		}
		let Some(removed) = entries.remove(dn.normalized()) else {
			return Err(Error::NoSuchObject(dn.to_string()));
		};
		if let Err(err) = self.persist(&entries).await {
			entries.insert(dn.normalized().to_owned(), removed);
			return Err(err);
		}
		Ok(())
	}

	/// Apply `change` to a copy of an entry and store the result if it
	/// succeeds.
	pub(crate) async fn update<F>(&self, dn: &Dn, change: F) -> Result<(), Error>
	where
		F: FnOnce(&mut Entry) -> Result<(), Error>,
	{
		let mut entries = self.entries.write().await;
		let Some(existing) = entries.get(dn.normalized()) else {
			return Err(Error::NoSuchObject(dn.to_string()));
		};
		let mut updated = existing.clone();
		change(&mut updated)?;
		let previous = entries.insert(dn.normalized().to_owned(), updated);
		if let Err(err) = self.persist(&entries).await {
			if let Some(previous) = previous {
				entries.insert(dn.normalized().to_owned(), previous);
			}
			return Err(err);
		}
		Ok(())
	}

	/// Entries in `scope` of `base` that match `filter`, parents before
	/// children.
	pub(crate) async fn search(
		&self,
		base: &Dn,
		scope: &LdapSearchScope,
		filter: &LdapFilter,
	) -> Result<Vec<Entry>, Error> {
		let entries = self.entries.read().await;
		if !entries.contains_key(base.normalized()) {
			return Err(Error::NoSuchObject(base.to_string()));
		}
		let mut found: Vec<Entry> = entries
			.values()
			.filter(|entry| in_scope(base, scope, entry.dn()))
			.filter(|entry| filter::matches(filter, entry))
			.cloned()
			.collect();
		found.sort_by(|a, b| {
			a.dn()
				.rdns()
				.len()
				.cmp(&b.dn().rdns().len())
				.then_with(|| a.dn().normalized().cmp(b.dn().normalized()))
		});
		Ok(found)
	}

	/// Write all entries to the store file.
	pub(crate) async fn flush(&self) -> Result<(), Error> {
		let entries = self.entries.read().await;
		self.persist(&entries).await
	}

	/// Write `entries` to the store file, if initialized. Callers undo their
	/// change to `entries` when this fails.
	async fn persist(&self, entries: &BTreeMap<String, Entry>) -> Result<(), Error> {
		let Some(store) = &self.store else {
			return Ok(());
		};
		let stored: Vec<&Entry> = entries.values().collect();
		tokio::fs::write(store, serde_json::to_vec_pretty(&stored)?).await?;
		Ok(())
	}
}

/// Whether `dn` lies within `scope` of `base`
fn in_scope(base: &Dn, scope: &LdapSearchScope, dn: &Dn) -> bool {
	match scope {
		LdapSearchScope::Base => dn == base,
		LdapSearchScope::OneLevel => base.is_parent_of(dn),
		LdapSearchScope::Subtree => dn.is_within(base),
		LdapSearchScope::Children => dn.is_within(base) && dn != base,
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use ldap3_proto::proto::{LdapFilter, LdapSearchScope};

	use super::Partition;
	use crate::{dn::Dn, entry::Entry, error::Error};

	fn entry(dn: &str, class: &str) -> Entry {
		let mut entry = Entry::new(dn.parse().unwrap());
		entry.add("objectClass", ["top", class]);
		entry
	}

	async fn example() -> Partition {
		let partition = Partition::new("example", "dc=example,dc=com".parse().unwrap()).unwrap();
		partition.add(entry("dc=example,dc=com", "domain")).await.unwrap();
		partition.add(entry("ou=people,dc=example,dc=com", "organizationalUnit")).await.unwrap();
		partition.add(entry("uid=jdoe,ou=people,dc=example,dc=com", "person")).await.unwrap();
		partition
	}

	#[test]
	fn invalid_ids() {
		let suffix: Dn = "dc=example,dc=com".parse().unwrap();
		for id in ["", "..", "a/b", "a b"] {
			assert!(matches!(Partition::new(id, suffix.clone()), Err(Error::Config(_))), "{id:?}");
		}
		assert!(matches!(Partition::new("example", Dn::root()), Err(Error::Config(_))));
	}

	#[tokio::test]
	async fn add_requires_parent() {
		let partition = example().await;
		let orphan = entry("uid=x,ou=missing,dc=example,dc=com", "person");
		assert!(matches!(partition.add(orphan).await, Err(Error::NoSuchObject(_))));

		let duplicate = entry("UID=JDOE,ou=people,dc=example,dc=com", "person");
		assert!(matches!(partition.add(duplicate).await, Err(Error::EntryAlreadyExists(_))));
	}

	#[tokio::test]
	async fn delete_only_leaves() {
		let partition = example().await;
		let people: Dn = "ou=people,dc=example,dc=com".parse().unwrap();
		assert!(matches!(partition.delete(&people).await, Err(Error::NotAllowedOnNonLeaf(_))));

		let user: Dn = "uid=jdoe,ou=people,dc=example,dc=com".parse().unwrap();
		partition.delete(&user).await.unwrap();
		assert!(!partition.exists(&user).await);
		partition.delete(&people).await.unwrap();
		assert!(matches!(partition.delete(&people).await, Err(Error::NoSuchObject(_))));
	}

	#[tokio::test]
	async fn search_scopes() {
		let partition = example().await;
		let suffix: Dn = "dc=example,dc=com".parse().unwrap();
		let all = LdapFilter::Present("objectClass".to_owned());
		for (scope, expected) in [
			(LdapSearchScope::Base, 1),
			(LdapSearchScope::OneLevel, 1),
			(LdapSearchScope::Subtree, 3),
			(LdapSearchScope::Children, 2),
		] {
			let found = partition.search(&suffix, &scope, &all).await.unwrap();
			assert_eq!(found.len(), expected, "{scope:?}");
		}

		let found = partition.search(&suffix, &LdapSearchScope::Subtree, &all).await.unwrap();
		assert_eq!(found[0].dn(), &suffix, "Parents come before children");

		let missing: Dn = "ou=missing,dc=example,dc=com".parse().unwrap();
		assert!(matches!(
			partition.search(&missing, &LdapSearchScope::Base, &all).await,
			Err(Error::NoSuchObject(_))
		));
	}

	#[tokio::test]
	async fn persists_to_working_directory() {
		let directory = std::env::temp_dir().join("embedded-ldap-partition-test");
		let _ = tokio::fs::remove_dir_all(&directory).await;

		let mut partition =
			Partition::new("example", "dc=example,dc=com".parse().unwrap()).unwrap();
		partition.initialize(&directory).await.unwrap();
		partition.add(entry("dc=example,dc=com", "domain")).await.unwrap();

		let mut reloaded =
			Partition::new("example", "dc=example,dc=com".parse().unwrap()).unwrap();
		reloaded.initialize(&directory).await.unwrap();
		assert!(reloaded.exists(&"dc=example,dc=com".parse().unwrap()).await);

		tokio::fs::remove_dir_all(&directory).await.unwrap();
	}

	#[tokio::test]
	async fn failed_write_leaves_entries_unchanged() {
		let directory = std::env::temp_dir().join("embedded-ldap-partition-write-failure");
		let _ = tokio::fs::remove_dir_all(&directory).await;

		let mut partition =
			Partition::new("example", "dc=example,dc=com".parse().unwrap()).unwrap();
		partition.initialize(&directory).await.unwrap();
		partition.add(entry("dc=example,dc=com", "domain")).await.unwrap();
		partition.add(entry("ou=people,dc=example,dc=com", "organizationalUnit")).await.unwrap();
		tokio::fs::remove_dir_all(&directory).await.unwrap();

		let groups: Dn = "ou=groups,dc=example,dc=com".parse().unwrap();
		let result = partition.add(entry("ou=groups,dc=example,dc=com", "organizationalUnit")).await;
		assert!(matches!(result, Err(Error::Io(_))));
		assert!(!partition.exists(&groups).await);

		let people: Dn = "ou=people,dc=example,dc=com".parse().unwrap();
		assert!(matches!(partition.delete(&people).await, Err(Error::Io(_))));
		assert!(partition.exists(&people).await);

		let result = partition
			.update(&people, |entry| {
				entry.add("description", ["changed"]);
				Ok(())
			})
			.await;
		assert!(matches!(result, Err(Error::Io(_))));
		let stored = partition.lookup(&people).await.unwrap();
		assert_eq!(stored.attr_first("description"), None);
	}
}
