//! The directory service: partitions, lifecycle and sessions
use std::sync::{Arc, Mutex, PoisonError};

use ldap3_proto::proto::{LdapFilter, LdapSearchScope};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
	changelog::{ChangeKind, ChangeLog},
	config::{ServiceConfig, TIME_FORMAT},
	dn::Dn,
	entry::{is_operational, Entry},
	error::Error,
	filter,
	partition::Partition,
};

/// OID of the "Who am I?" extended operation (RFC4532)
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Lifecycle of a [`DirectoryService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
	/// Created, partitions may still be added
	Unstarted,
	/// Serving requests
	Running,
	/// Shut down, no longer usable
	Stopped,
}

/// The identity a session acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
	/// Not bound
	Anonymous,
	/// The administrative user
	Admin,
	/// Bound as an entry of one of the partitions
	User(Dn),
}

/// A single change to an entry's attributes
#[derive(Debug, Clone)]
pub enum Modification {
	/// Add values, creating the attribute if needed
	Add(String, Vec<Vec<u8>>),
	/// Remove values, or the whole attribute when no values are given
	Delete(String, Vec<Vec<u8>>),
	/// Replace all values, removing the attribute when no values are given
	Replace(String, Vec<Vec<u8>>),
}

/// Entries found by a search
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
	/// Matching entries, parents first
	pub entries: Vec<Entry>,
	/// Whether more entries matched than the size limit allowed
	pub size_limit_exceeded: bool,
}

/// An embedded directory service holding one or more partitions.
#[derive(Debug)]
pub struct DirectoryService {
	/// Service configuration
	config: ServiceConfig,
	/// Parsed DN of the administrative user
	admin_dn: Dn,
	/// Registered partitions
	partitions: Vec<Partition>,
	/// Record of changes
	change_log: ChangeLog,
	/// Current lifecycle state
	state: Mutex<ServiceState>,
}

impl DirectoryService {
	/// Create a service without partitions.
	pub fn new(config: ServiceConfig) -> Result<Self, Error> {
		let admin_dn: Dn = config.admin_dn.parse()?;
		let change_log = ChangeLog::new(config.change_log_enabled);
		Ok(DirectoryService {
			config,
			admin_dn,
			partitions: Vec::new(),
			change_log,
			state: Mutex::new(ServiceState::Unstarted),
		})
	}

	/// The service configuration.
	#[must_use]
	pub fn config(&self) -> &ServiceConfig {
		&self.config
	}

	/// The change log. Empty unless enabled in the configuration.
	#[must_use]
	pub fn change_log(&self) -> &ChangeLog {
		&self.change_log
	}

	/// The registered partitions.
	#[must_use]
	pub fn partitions(&self) -> &[Partition] {
		&self.partitions
	}

	/// The current lifecycle state.
	#[must_use]
	pub fn state(&self) -> ServiceState {
		*self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Whether the service is running.
	#[must_use]
	pub fn is_started(&self) -> bool {
		self.state() == ServiceState::Running
	}

	/// Register a partition. Only possible before startup.
	pub fn add_partition(&mut self, partition: Partition) -> Result<(), Error> {
		if self.state() != ServiceState::Unstarted {
			return Err(Error::Config("partitions must be added before startup".to_owned()));
		}
		for existing in &self.partitions {
			if existing.id() == partition.id() {
				return Err(Error::Config(format!("duplicate partition id {}", partition.id())));
			}
			if existing.suffix() == partition.suffix() {
				return Err(Error::Config(format!("duplicate partition suffix {}", partition.suffix())));
			}
		}
		debug!("Adding partition {} at {}", partition.id(), partition.suffix());
		self.partitions.push(partition);
		Ok(())
	}

	/// Create the working directory and load all partitions.
	pub async fn startup(&mut self) -> Result<(), Error> {
		if self.state() != ServiceState::Unstarted {
			return Err(Error::Config("directory service was already started".to_owned()));
		}
		tokio::fs::create_dir_all(&self.config.working_directory).await?;
		for partition in &mut self.partitions {
			partition.initialize(&self.config.working_directory).await?;
		}
		*self.state.get_mut().unwrap_or_else(PoisonError::into_inner) = ServiceState::Running;
		info!("Directory service started in {}", self.config.working_directory.display());
		Ok(())
	}

	/// Flush all partitions and stop serving requests.
	pub async fn shutdown(&self) -> Result<(), Error> {
		{
			let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
			if *state != ServiceState::Running {
				return Err(Error::NotStarted);
			}
			*state = ServiceState::Stopped;
		}
		for partition in &self.partitions {
			partition.flush().await?;
		}
		info!("Directory service stopped");
		Ok(())
	}

	/// Create an empty entry named `dn`.
	pub fn new_entry(&self, dn: &str) -> Result<Entry, Error> {
		Ok(Entry::new(dn.parse()?))
	}

	/// A session with full access.
	#[must_use]
	pub fn admin_session(self: &Arc<Self>) -> Session {
		Session { service: Arc::clone(self), principal: Principal::Admin }
	}

	/// An unauthenticated session.
	#[must_use]
	pub fn anonymous_session(self: &Arc<Self>) -> Session {
		Session { service: Arc::clone(self), principal: Principal::Anonymous }
	}

	/// Authenticate with a simple bind.
	///
	/// An empty DN and password yield an anonymous session. The admin DN is
	/// checked against the configured password; any other DN must name an
	/// entry with a matching `userPassword` value.
	pub async fn bind(self: &Arc<Self>, dn: &str, password: &str) -> Result<Session, Error> {
		self.ensure_running()?;
		match (dn.trim().is_empty(), password.is_empty()) {
			(true, true) => {
				if !self.config.allow_anonymous_access {
					return Err(Error::InsufficientAccess);
				}
				return Ok(self.anonymous_session());
			}
			(true, false) => return Err(Error::InvalidCredentials),
			(false, true) => {
				return Err(Error::UnwillingToPerform("unauthenticated bind".to_owned()))
			}
			(false, false) => {}
		}

		let dn: Dn = dn.parse()?;
		let principal = if dn == self.admin_dn {
			if password != self.config.admin_password {
				return Err(Error::InvalidCredentials);
			}
			Principal::Admin
		} else {
			let entry = match self.partition_for(&dn) {
				Ok(partition) => partition.lookup(&dn).await,
				Err(_) => None,
			};
			let matches = entry
				.and_then(|entry| entry.get("userPassword").cloned())
				.is_some_and(|attr| attr.values().iter().any(|v| v == password.as_bytes()));
			if !matches {
				return Err(Error::InvalidCredentials);
			}
			Principal::User(dn)
		};
		Ok(Session { service: Arc::clone(self), principal })
	}

	/// The server information entry at the empty DN
	#[must_use]
	pub fn root_dse(&self) -> Entry {
		let mut entry = Entry::new(Dn::root());
		entry.add("objectClass", ["top", "extensibleObject"]);
		entry.add("namingContexts", self.partitions.iter().map(|p| p.suffix().to_string()));
		entry.add("supportedLDAPVersion", ["3"]);
		entry.add("supportedExtension", [WHOAMI_OID]);
		entry.add("vendorName", [env!("CARGO_PKG_NAME")]);
		entry.add("vendorVersion", [env!("CARGO_PKG_VERSION")]);
		entry
	}

	/// Fail unless running
	fn ensure_running(&self) -> Result<(), Error> {
		if self.is_started() {
			Ok(())
		} else {
			Err(Error::NotStarted)
		}
	}

	/// The partition with the longest suffix containing `dn`
	fn partition_for(&self, dn: &Dn) -> Result<&Partition, Error> {
		self.partitions
			.iter()
			.filter(|partition| dn.is_within(partition.suffix()))
			.max_by_key(|partition| partition.suffix().rdns().len())
			.ok_or_else(|| Error::NoSuchObject(dn.to_string()))
	}
}

/// Access to a [`DirectoryService`] as a particular principal
#[derive(Debug, Clone)]
pub struct Session {
	/// The service operated on
	service: Arc<DirectoryService>,
	/// Who the session acts as
	principal: Principal,
}

impl Session {
	/// Who the session acts as.
	#[must_use]
	pub fn principal(&self) -> &Principal {
		&self.principal
	}

	/// The authorization identity as returned by "Who am I?", e.g.
	/// `dn:uid=admin,ou=system`. Empty for anonymous sessions.
	#[must_use]
	pub fn authz_id(&self) -> String {
		match &self.principal {
			Principal::Anonymous => String::new(),
			Principal::Admin => format!("dn:{}", self.service.admin_dn),
			Principal::User(dn) => format!("dn:{dn}"),
		}
	}

	/// Whether an entry exists.
	pub async fn exists(&self, dn: &Dn) -> Result<bool, Error> {
		self.check_read()?;
		match self.service.partition_for(dn) {
			Ok(partition) => Ok(partition.exists(dn).await),
			Err(_) => Ok(false),
		}
	}

	/// Fetch an entry.
	pub async fn lookup(&self, dn: &Dn) -> Result<Option<Entry>, Error> {
		self.check_read()?;
		if dn.is_root() {
			return Ok(Some(self.service.root_dse()));
		}
		match self.service.partition_for(dn) {
			Ok(partition) => Ok(partition.lookup(dn).await),
			Err(_) => Ok(None),
		}
	}

	/// Whether the entry's `attr` holds `value`, compared case-insensitively.
	pub async fn compare(&self, dn: &Dn, attr: &str, value: &[u8]) -> Result<bool, Error> {
		let Some(entry) = self.lookup(dn).await? else {
			return Err(Error::NoSuchObject(dn.to_string()));
		};
		if entry.get(attr).is_none() {
			return Err(Error::NoSuchAttribute(attr.to_owned()));
		}
		let assertion =
			LdapFilter::Equality(attr.to_owned(), String::from_utf8_lossy(value).into_owned());
		Ok(filter::matches(&assertion, &entry))
	}

	/// Add an entry. The values of its RDN are added to it if missing, and
	/// the operational timestamps are set.
	pub async fn add(&self, mut entry: Entry) -> Result<(), Error> {
		self.check_write()?;
		if entry.get("objectClass").is_none() {
			return Err(Error::ObjectClassViolation(format!("{} has no objectClass", entry.dn())));
		}
		if entry.attributes().any(|attr| is_operational(attr.name())) {
			return Err(Error::UnwillingToPerform("operational attributes are read-only".to_owned()));
		}
		let rdn = entry.dn().rdn().cloned();
		if let Some(rdn) = rdn {
			for ava in rdn.avas() {
				entry.add(ava.attr(), [ava.value()]);
			}
		}
		let dn = entry.dn().clone();
		let now = OffsetDateTime::now_utc().format(&TIME_FORMAT)?;
		entry.replace("createTimestamp", [now]);
		entry.replace("creatorsName", [self.principal_dn()]);

		self.service.partition_for(&dn)?.add(entry).await?;
		self.service.change_log.log(&dn, ChangeKind::Add).await;
		debug!("Added {dn}");
		Ok(())
	}

	/// Delete a leaf entry.
	pub async fn delete(&self, dn: &Dn) -> Result<(), Error> {
		self.check_write()?;
		self.service.partition_for(dn)?.delete(dn).await?;
		self.service.change_log.log(dn, ChangeKind::Delete).await;
		debug!("Deleted {dn}");
		Ok(())
	}

	/// Apply modifications to an entry, all or nothing.
	pub async fn modify(&self, dn: &Dn, modifications: Vec<Modification>) -> Result<(), Error> {
		self.check_write()?;
		let now = OffsetDateTime::now_utc().format(&TIME_FORMAT)?;
		let modifier = self.principal_dn();
		self.service
			.partition_for(dn)?
			.update(dn, |entry| {
				for modification in modifications {
					apply(entry, modification)?;
				}
				if entry.get("objectClass").is_none() {
					return Err(Error::ObjectClassViolation(format!(
						"{} would lose its objectClass",
						entry.dn()
					)));
				}
				entry.replace("modifyTimestamp", [now]);
				entry.replace("modifiersName", [modifier]);
				Ok(())
			})
			.await?;
		self.service.change_log.log(dn, ChangeKind::Modify).await;
		debug!("Modified {dn}");
		Ok(())
	}

	/// Search below `base`. A `size_limit` of 0 means unlimited.
	pub async fn search(
		&self,
		base: &Dn,
		scope: &LdapSearchScope,
		filter: &LdapFilter,
		size_limit: usize,
	) -> Result<SearchResults, Error> {
		self.check_read()?;
		let mut entries = if base.is_root() {
			self.search_from_root(scope, filter).await
		} else {
			self.service.partition_for(base)?.search(base, scope, filter).await?
		};

		let size_limit_exceeded = size_limit > 0 && entries.len() > size_limit;
		if size_limit_exceeded {
			entries.truncate(size_limit);
		}
		Ok(SearchResults { entries, size_limit_exceeded })
	}

	/// Search starting at the empty DN
	async fn search_from_root(&self, scope: &LdapSearchScope, filter: &LdapFilter) -> Vec<Entry> {
		if matches!(scope, LdapSearchScope::Base) {
			let root_dse = self.service.root_dse();
			return if filter::matches(filter, &root_dse) { vec![root_dse] } else { Vec::new() };
		}
		let scope = if matches!(scope, LdapSearchScope::OneLevel) {
			LdapSearchScope::Base
		} else {
			LdapSearchScope::Subtree
		};
		let mut entries = Vec::new();
		for partition in &self.service.partitions {
			// a partition whose root entry is missing has nothing to offer
			if let Ok(found) = partition.search(partition.suffix(), &scope, filter).await {
				entries.extend(found);
			}
		}
		entries
	}

	/// DN recorded in `creatorsName` / `modifiersName`
	fn principal_dn(&self) -> String {
		match &self.principal {
			Principal::Anonymous => String::new(),
			Principal::Admin => self.service.admin_dn.to_string(),
			Principal::User(dn) => dn.to_string(),
		}
	}

	/// Fail unless the session may read
	fn check_read(&self) -> Result<(), Error> {
		self.service.ensure_running()?;
		if self.principal == Principal::Anonymous && !self.service.config.allow_anonymous_access {
			return Err(Error::InsufficientAccess);
		}
		Ok(())
	}

	/// Fail unless the session may write
	fn check_write(&self) -> Result<(), Error> {
		self.service.ensure_running()?;
		if self.principal == Principal::Anonymous {
			return Err(Error::InsufficientAccess);
		}
		Ok(())
	}
}

/// Apply one modification to an entry
fn apply(entry: &mut Entry, modification: Modification) -> Result<(), Error> {
	let (Modification::Add(attr, _) | Modification::Delete(attr, _) | Modification::Replace(attr, _)) =
		&modification;
	if is_operational(attr) {
		return Err(Error::UnwillingToPerform(format!("{attr} is read-only")));
	}
	match modification {
		Modification::Add(attr, values) => entry.add(&attr, values),
		Modification::Replace(attr, values) => entry.replace(&attr, values),
		Modification::Delete(attr, values) => {
			if !entry.remove_values(&attr, &values) {
				return Err(Error::NoSuchAttribute(attr));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::sync::Arc;

	use ldap3_proto::proto::{LdapFilter, LdapSearchScope};

	use super::{DirectoryService, Modification, Principal, ServiceState};
	use crate::{config::ServiceConfig, dn::Dn, error::Error, partition::Partition};

	async fn started(name: &str, config: ServiceConfig) -> Arc<DirectoryService> {
		let config = ServiceConfig {
			working_directory: std::env::temp_dir().join(format!("embedded-ldap-service-{name}")),
			..config
		};
		let _ = tokio::fs::remove_dir_all(&config.working_directory).await;
		let mut service = DirectoryService::new(config).unwrap();
		service
			.add_partition(Partition::new("example", "dc=example,dc=com".parse().unwrap()).unwrap())
			.unwrap();
		service.startup().await.unwrap();

		let service = Arc::new(service);
		let mut root = service.new_entry("dc=example,dc=com").unwrap();
		root.add("objectClass", ["top", "domain", "extensibleObject"]);
		service.admin_session().add(root).await.unwrap();
		service
	}

	async fn cleanup(service: Arc<DirectoryService>) {
		service.shutdown().await.unwrap();
		tokio::fs::remove_dir_all(&service.config().working_directory).await.unwrap();
	}

	fn dn(dn: &str) -> Dn {
		dn.parse().unwrap()
	}

	#[tokio::test]
	async fn lifecycle() {
		let service = started("lifecycle", ServiceConfig::default()).await;
		assert_eq!(service.state(), ServiceState::Running);
		assert!(service.admin_session().exists(&dn("dc=example,dc=com")).await.unwrap());

		let session = service.admin_session();
		service.shutdown().await.unwrap();
		assert_eq!(service.state(), ServiceState::Stopped);
		assert!(matches!(session.exists(&dn("dc=example,dc=com")).await, Err(Error::NotStarted)));
		assert!(matches!(service.shutdown().await, Err(Error::NotStarted)));
		tokio::fs::remove_dir_all(&service.config().working_directory).await.unwrap();
	}

	#[test]
	fn partitions_are_registered_before_startup() {
		let mut service = DirectoryService::new(ServiceConfig::default()).unwrap();
		service
			.add_partition(Partition::new("example", dn("dc=example,dc=com")).unwrap())
			.unwrap();
		assert!(matches!(
			service.add_partition(Partition::new("example", dn("dc=other,dc=com")).unwrap()),
			Err(Error::Config(_))
		));
		assert!(matches!(
			service.add_partition(Partition::new("other", dn("DC=Example,DC=Com")).unwrap()),
			Err(Error::Config(_))
		));
	}

	#[tokio::test]
	async fn add_sets_rdn_and_timestamps() {
		let service = started("add", ServiceConfig::default()).await;
		let session = service.admin_session();

		let mut people = service.new_entry("ou=people,dc=example,dc=com").unwrap();
		people.add("objectClass", ["organizationalUnit"]);
		session.add(people).await.unwrap();

		let stored = session.lookup(&dn("ou=people,dc=example,dc=com")).await.unwrap().unwrap();
		assert_eq!(stored.attr_first("ou"), Some("people"));
		assert!(stored.attr_first("createTimestamp").is_some());
		assert_eq!(stored.attr_first("creatorsName"), Some("uid=admin,ou=system"));

		let classless = service.new_entry("ou=groups,dc=example,dc=com").unwrap();
		assert!(matches!(session.add(classless).await, Err(Error::ObjectClassViolation(_))));

		let mut outside = service.new_entry("dc=other,dc=org").unwrap();
		outside.add("objectClass", ["domain"]);
		assert!(matches!(session.add(outside).await, Err(Error::NoSuchObject(_))));

		cleanup(service).await;
	}

	#[tokio::test]
	async fn modify() {
		let service = started("modify", ServiceConfig::default()).await;
		let session = service.admin_session();
		let root = dn("dc=example,dc=com");

		session
			.modify(
				&root,
				vec![
					Modification::Add("description".to_owned(), vec![b"first".to_vec()]),
					Modification::Replace("o".to_owned(), vec![b"Example Inc".to_vec()]),
				],
			)
			.await
			.unwrap();
		let entry = session.lookup(&root).await.unwrap().unwrap();
		assert_eq!(entry.attr_first("description"), Some("first"));
		assert_eq!(entry.attr_first("o"), Some("Example Inc"));
		assert!(entry.attr_first("modifyTimestamp").is_some());

		let failed = session
			.modify(
				&root,
				vec![
					Modification::Replace("description".to_owned(), vec![b"second".to_vec()]),
					Modification::Delete("mail".to_owned(), Vec::new()),
				],
			)
			.await;
		assert!(matches!(failed, Err(Error::NoSuchAttribute(_))));
		let entry = session.lookup(&root).await.unwrap().unwrap();
		assert_eq!(entry.attr_first("description"), Some("first"), "Failed modify is not applied");

		let failed =
			session.modify(&root, vec![Modification::Delete("objectClass".to_owned(), Vec::new())]);
		assert!(matches!(failed.await, Err(Error::ObjectClassViolation(_))));

		cleanup(service).await;
	}

	#[tokio::test]
	async fn compare() {
		let service = started("compare", ServiceConfig::default()).await;
		let session = service.admin_session();
		let root = dn("dc=example,dc=com");

		assert!(session.compare(&root, "objectClass", b"Domain").await.unwrap());
		assert!(!session.compare(&root, "objectClass", b"person").await.unwrap());
		assert!(matches!(
			session.compare(&root, "mail", b"x").await,
			Err(Error::NoSuchAttribute(_))
		));
		assert!(matches!(
			session.compare(&dn("ou=missing,dc=example,dc=com"), "ou", b"missing").await,
			Err(Error::NoSuchObject(_))
		));

		cleanup(service).await;
	}

	#[tokio::test]
	async fn bind_and_access() {
		let service = started("bind", ServiceConfig::default()).await;
		let admin = service.admin_session();

		let mut user = service.new_entry("uid=jdoe,dc=example,dc=com").unwrap();
		user.add("objectClass", ["account", "simpleSecurityObject"]);
		user.add("userPassword", ["hunter2"]);
		admin.add(user).await.unwrap();

		let session = service.bind("uid=jdoe,dc=example,dc=com", "hunter2").await.unwrap();
		assert_eq!(session.principal(), &Principal::User(dn("uid=jdoe,dc=example,dc=com")));
		assert_eq!(session.authz_id(), "dn:uid=jdoe,dc=example,dc=com");

		let session = service.bind("UID=ADMIN,OU=SYSTEM", "secret").await.unwrap();
		assert_eq!(session.principal(), &Principal::Admin);

		assert!(matches!(
			service.bind("uid=jdoe,dc=example,dc=com", "HUNTER2").await,
			Err(Error::InvalidCredentials)
		));
		assert!(matches!(
			service.bind("uid=nobody,dc=example,dc=com", "x").await,
			Err(Error::InvalidCredentials)
		));
		assert!(matches!(
			service.bind("uid=admin,ou=system", "").await,
			Err(Error::UnwillingToPerform(_))
		));

		let anonymous = service.bind("", "").await.unwrap();
		assert!(anonymous.exists(&dn("dc=example,dc=com")).await.unwrap());
		let mut entry = service.new_entry("ou=x,dc=example,dc=com").unwrap();
		entry.add("objectClass", ["organizationalUnit"]);
		assert!(matches!(anonymous.add(entry).await, Err(Error::InsufficientAccess)));

		cleanup(service).await;
	}

	#[tokio::test]
	async fn anonymous_access_can_be_disabled() {
		let config = ServiceConfig { allow_anonymous_access: false, ..ServiceConfig::default() };
		let service = started("anonymous", config).await;

		assert!(matches!(service.bind("", "").await, Err(Error::InsufficientAccess)));
		let anonymous = service.anonymous_session();
		assert!(matches!(
			anonymous.exists(&dn("dc=example,dc=com")).await,
			Err(Error::InsufficientAccess)
		));

		cleanup(service).await;
	}

	#[tokio::test]
	async fn search_root_and_size_limit() {
		let service = started("search", ServiceConfig::default()).await;
		let session = service.admin_session();
		for ou in ["people", "groups", "services"] {
			let mut entry = service.new_entry(&format!("ou={ou},dc=example,dc=com")).unwrap();
			entry.add("objectClass", ["organizationalUnit"]);
			session.add(entry).await.unwrap();
		}
		let all = LdapFilter::Present("objectClass".to_owned());

		let root_dse = session.search(&Dn::root(), &LdapSearchScope::Base, &all, 0).await.unwrap();
		assert_eq!(root_dse.entries.len(), 1);
		assert_eq!(root_dse.entries[0].attr_first("namingContexts"), Some("dc=example,dc=com"));

		let suffixes = session.search(&Dn::root(), &LdapSearchScope::OneLevel, &all, 0).await.unwrap();
		assert_eq!(suffixes.entries.len(), 1);

		let everything =
			session.search(&Dn::root(), &LdapSearchScope::Subtree, &all, 0).await.unwrap();
		assert_eq!(everything.entries.len(), 4);

		let limited = session
			.search(&dn("dc=example,dc=com"), &LdapSearchScope::OneLevel, &all, 2)
			.await
			.unwrap();
		assert_eq!(limited.entries.len(), 2);
		assert!(limited.size_limit_exceeded);

		cleanup(service).await;
	}

	#[tokio::test]
	async fn change_log() {
		let config = ServiceConfig { change_log_enabled: true, ..ServiceConfig::default() };
		let service = started("changelog", config).await;
		let root = dn("dc=example,dc=com");
		service
			.admin_session()
			.modify(&root, vec![Modification::Add("description".to_owned(), vec![b"x".to_vec()])])
			.await
			.unwrap();

		let records = service.change_log().records().await;
		assert_eq!(records.len(), 2, "Root entry add and the modification");
		assert_eq!(records[1].dn, root);

		cleanup(service).await;
	}
}
