//! Launching and tearing down an embedded server

use std::{
	io::ErrorKind,
	net::SocketAddr,
	path::{Path, PathBuf},
	sync::Arc,
};

use ldap3::{LdapConnAsync, LdapConnSettings};
use tracing::{info, warn};
use url::Url;

use crate::{
	config::Config,
	dn::Dn,
	error::Error,
	partition::Partition,
	server::LdapServer,
	service::{DirectoryService, Session},
};

/// Object classes of the entry seeded at the partition suffix
pub const ROOT_OBJECT_CLASSES: [&str; 3] = ["top", "domain", "extensibleObject"];

/// A directory service with one partition, served over TCP.
///
/// Owns both the service and its listener. [`shutdown`](Self::shutdown)
/// releases them in listener-then-service order and removes the working
/// directory. If the shutdown hook is enabled, dropping a server that was
/// never shut down stops the listener and removes the working directory too.
#[derive(Debug)]
pub struct EmbeddedLdapServer {
	/// The directory service
	service: Arc<DirectoryService>,
	/// The TCP listener
	listener: LdapServer,
	/// Where the service keeps its partitions
	working_directory: PathBuf,
	/// Whether [`shutdown`](Self::shutdown) completed
	stopped: bool,
}

impl EmbeddedLdapServer {
	/// Launch a server with a partition named `partition_name` rooted at
	/// `partition_suffix`, listening on `port` of the loopback interface.
	/// The working directory is `<temp dir>/apacheds-test1`.
	pub async fn launch(
		partition_name: &str,
		partition_suffix: &str,
		port: u16,
	) -> Result<Self, Error> {
		Self::launch_with(Config::new(partition_name, partition_suffix, port)).await
	}

	/// Launch a server from a full configuration.
	///
	/// Any existing working directory is deleted first. The root entry is
	/// added only if the partition does not contain it yet. When a step fails,
	/// what was already started is released again before the error is
	/// returned.
	pub async fn launch_with(config: Config) -> Result<Self, Error> {
		let suffix = config.validate()?;
		let working_directory = config.service.working_directory.clone();
		remove_working_directory(&working_directory).await?;

		let mut service = DirectoryService::new(config.service.clone())?;
		service.add_partition(Partition::new(&config.partition.name, suffix.clone())?)?;
		if let Err(err) = service.startup().await {
			abort_launch(None, &working_directory).await;
			return Err(err);
		}
		let service = Arc::new(service);

		if let Err(err) = seed_root_entry(&service, &suffix, &config.partition.name).await {
			abort_launch(Some(&service), &working_directory).await;
			return Err(err);
		}

		let address = SocketAddr::new(config.listener.address, config.listener.port);
		let listener = match LdapServer::start(address, Arc::clone(&service)).await {
			Ok(listener) => listener,
			Err(err) => {
				abort_launch(Some(&service), &working_directory).await;
				return Err(err);
			}
		};

		info!(
			"Embedded LDAP server for {} listening on {}",
			config.partition.suffix,
			listener.local_addr()
		);
		Ok(EmbeddedLdapServer { service, listener, working_directory, stopped: false })
	}

	/// Stop the listener, shut the directory service down, and delete the
	/// working directory. If a step fails, the shutdown hook still removes
	/// the working directory when the server is dropped.
	pub async fn shutdown(mut self) -> Result<(), Error> {
		self.listener.stop().await?;
		self.service.shutdown().await?;
		remove_working_directory(&self.working_directory).await?;
		self.stopped = true;
		info!("Embedded LDAP server on {} shut down", self.listener.local_addr());
		Ok(())
	}

	/// The address the listener is bound to.
	#[must_use]
	pub fn local_addr(&self) -> SocketAddr {
		self.listener.local_addr()
	}

	/// The port the listener is bound to. Useful when launched with port 0.
	#[must_use]
	pub fn port(&self) -> u16 {
		self.local_addr().port()
	}

	/// An `ldap://` URL pointing at the listener.
	pub fn url(&self) -> Result<Url, Error> {
		Ok(Url::parse(&format!("ldap://{}", self.local_addr()))?)
	}

	/// Where the service keeps its partitions.
	#[must_use]
	pub fn working_directory(&self) -> &Path {
		&self.working_directory
	}

	/// The directory service.
	#[must_use]
	pub fn service(&self) -> &Arc<DirectoryService> {
		&self.service
	}

	/// A session with full access to the directory, bypassing the network.
	#[must_use]
	pub fn admin_session(&self) -> Session {
		self.service.admin_session()
	}

	/// Connect to the listener with the `ldap3` client and bind as the
	/// administrative user.
	pub async fn connect(&self) -> Result<ldap3::Ldap, Error> {
		let (conn, mut ldap) =
			LdapConnAsync::from_url_with_settings(LdapConnSettings::new(), &self.url()?).await?;
		tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("Ldap connection error {err}");
			}
		});
		let config = self.service.config();
		ldap.simple_bind(&config.admin_dn, &config.admin_password).await?.success()?;
		Ok(ldap)
	}
}

impl Drop for EmbeddedLdapServer {
	fn drop(&mut self) {
		if self.stopped || !self.service.config().shutdown_hook_enabled {
			return;
		}
		self.listener.cancel();
		match std::fs::remove_dir_all(&self.working_directory) {
			Ok(()) => info!("Embedded LDAP server dropped without shutdown, cleaned up"),
			Err(err) if err.kind() == ErrorKind::NotFound => {}
			Err(err) => warn!(
				"Failed to remove working directory {}: {err}",
				self.working_directory.display()
			),
		}
	}
}

/// Add the partition's root entry unless it is already present
async fn seed_root_entry(
	service: &Arc<DirectoryService>,
	suffix: &Dn,
	partition_name: &str,
) -> Result<(), Error> {
	let session = service.admin_session();
	if session.exists(suffix).await? {
		return Ok(());
	}
	let mut entry = service.new_entry(&suffix.to_string())?;
	entry.add("objectClass", ROOT_OBJECT_CLASSES);
	entry.add("dc", [partition_name]);
	session.add(entry).await
}

/// Recursively delete the working directory; a missing one is fine
async fn remove_working_directory(path: &Path) -> Result<(), Error> {
	match tokio::fs::remove_dir_all(path).await {
		Ok(()) => Ok(()),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
		Err(err) => Err(err.into()),
	}
}

/// Release what a failed launch already acquired
async fn abort_launch(service: Option<&Arc<DirectoryService>>, working_directory: &Path) {
	if let Some(service) = service {
		if let Err(err) = service.shutdown().await {
			warn!("Failed to shut down directory service after failed launch: {err}");
		}
	}
	if let Err(err) = remove_working_directory(working_directory).await {
		warn!("Failed to remove working directory after failed launch: {err}");
	}
}
