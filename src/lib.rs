//! Run an embedded LDAP directory server inside integration tests.
//!
//! A launched server consists of a small directory service holding a single
//! partition, and a TCP listener speaking LDAPv3 on a port of your choice.
//! Partitions are kept in memory and mirrored to JSON files in a working
//! directory, which is wiped before launch and removed again on shutdown.
//! The partition's root entry (`objectClass: top, domain, extensibleObject`
//! with `dc` set to the partition name) is created on launch.
//!
//! Messages are encoded and decoded with [`ldap3_proto`]; the [`ldap3`]
//! client is re-exported for talking to the server from tests.
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use embedded_ldap::{ldap3::{Scope, SearchEntry}, EmbeddedLdapServer};
//!
//! let server = EmbeddedLdapServer::launch("example", "dc=example,dc=com", 10389).await?;
//!
//! let mut ldap = server.connect().await?;
//! let (entries, _res) = ldap
//! 	.search("dc=example,dc=com", Scope::Base, "(objectClass=domain)", vec!["dc"])
//! 	.await?
//! 	.success()?;
//! let root = SearchEntry::construct(entries[0].clone());
//! assert_eq!(root.attrs["dc"], ["example"]);
//! ldap.unbind().await?;
//!
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Only one server may use a given working directory at a time. The
//!   default, `<temp dir>/apacheds-test1`, is shared by every server that
//!   does not configure its own, so tests using it must not run in parallel.
//! * There is no schema: any attribute is accepted on any entry, and all
//!   values compare as case-insensitive strings.
//! * Only simple binds, no TLS, no SASL. Writes require a bound user.
//! * Seeding the root entry is a check followed by an add, which is not
//!   atomic with respect to other writers.

pub mod changelog;
pub mod config;
pub mod dn;
pub mod embedded;
pub mod entry;
pub mod error;
mod filter;
pub mod partition;
pub mod server;
pub mod service;

pub use ldap3;

pub use crate::{
	config::{Config, ListenerConfig, PartitionConfig, ServiceConfig},
	dn::Dn,
	embedded::EmbeddedLdapServer,
	entry::Entry,
	error::Error,
	service::{DirectoryService, Modification, Session},
};
