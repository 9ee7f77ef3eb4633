//! Config for the embedded directory server.
use std::{
	net::{IpAddr, Ipv4Addr},
	path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::{dn::Dn, error::Error};

/// Configuration for which variant of ISO8601 to use for the operational
/// timestamp attributes. Configured according the syntax definition
/// `( 1.3.6.1.4.1.1466.115.121.1.24 DESC 'Generalized Time' )` described in
/// RFC4517 section 3.1.13
pub const TIME_FORMAT: &[time::format_description::FormatItem] =
	time::macros::format_description!("[year][month][day][hour][minute][second]Z");

/// Name of the directory, below the system temp directory, that the server
/// keeps its partitions in unless configured otherwise.
pub const WORKING_DIRECTORY_NAME: &str = "apacheds-test1";

/// Port of the listener when none is configured.
pub const DEFAULT_PORT: u16 = 10389;

/// Embedded server configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The single partition created at launch
	pub partition: PartitionConfig,
	/// Where the network listener binds
	#[serde(default)]
	pub listener: ListenerConfig,
	/// Settings of the directory service itself
	#[serde(default)]
	pub service: ServiceConfig,
}

impl Config {
	/// Configuration for a server with one partition named `partition_name`
	/// rooted at `partition_suffix`, listening on `port`. Everything else is
	/// left at its default.
	#[must_use]
	pub fn new(partition_name: &str, partition_suffix: &str, port: u16) -> Self {
		Config {
			partition: PartitionConfig {
				name: partition_name.to_owned(),
				suffix: partition_suffix.to_owned(),
			},
			listener: ListenerConfig { port, ..ListenerConfig::default() },
			service: ServiceConfig::default(),
		}
	}

	/// Check the partition settings, returning the parsed suffix.
	pub(crate) fn validate(&self) -> Result<Dn, Error> {
		if self.partition.name.trim().is_empty() {
			return Err(Error::Config("partition name must not be empty".to_owned()));
		}
		let suffix: Dn = self.partition.suffix.parse()?;
		if suffix.is_root() {
			return Err(Error::Config("partition suffix must not be the empty DN".to_owned()));
		}
		let admin: Dn = self.service.admin_dn.parse()?;
		if admin.is_root() {
			return Err(Error::Config("admin DN must not be the empty DN".to_owned()));
		}
		Ok(suffix)
	}
}

/// Identity of a partition
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PartitionConfig {
	/// The partition ID, also used as the `dc` value of the root entry
	pub name: String,
	/// The DN the partition is rooted at, e.g. `dc=example,dc=com`
	pub suffix: String,
}

/// Configuration of the TCP listener
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ListenerConfig {
	/// The address to bind to.
	#[serde(default = "default_address")]
	pub address: IpAddr,
	/// The port to bind to. `0` lets the operating system pick a free port.
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for ListenerConfig {
	fn default() -> Self {
		ListenerConfig { address: default_address(), port: default_port() }
	}
}

/// Configuration of the directory service
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ServiceConfig {
	/// Where partitions are stored. Deleted before launch and after shutdown.
	#[serde(default = "default_working_directory")]
	pub working_directory: PathBuf,
	/// Whether unauthenticated sessions may read the directory
	#[serde(default = "default_true")]
	pub allow_anonymous_access: bool,
	/// Whether modifications are recorded in the change log
	#[serde(default)]
	pub change_log_enabled: bool,
	/// Whether dropping a server that was never shut down should stop it and
	/// remove its working directory
	#[serde(default = "default_true")]
	pub shutdown_hook_enabled: bool,
	/// DN of the administrative user
	#[serde(default = "default_admin_dn")]
	pub admin_dn: String,
	/// Password of the administrative user
	#[serde(default = "default_admin_password")]
	pub admin_password: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		ServiceConfig {
			working_directory: default_working_directory(),
			allow_anonymous_access: true,
			change_log_enabled: false,
			shutdown_hook_enabled: true,
			admin_dn: default_admin_dn(),
			admin_password: default_admin_password(),
		}
	}
}

fn default_address() -> IpAddr {
	IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
	DEFAULT_PORT
}

fn default_working_directory() -> PathBuf {
	std::env::temp_dir().join(WORKING_DIRECTORY_NAME)
}

fn default_true() -> bool {
	true
}

fn default_admin_dn() -> String {
	"uid=admin,ou=system".to_owned()
}

fn default_admin_password() -> String {
	"secret".to_owned()
}
