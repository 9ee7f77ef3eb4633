#![allow(dead_code)]

use std::{collections::HashSet, error::Error};

use embedded_ldap::ldap3::{self, LdapConnAsync, SearchEntry};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

pub const SUFFIX: &str = "dc=example,dc=com";

pub fn init_tracing() {
	let tracing_filter = EnvFilter::default().add_directive(LevelFilter::DEBUG.into());
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_filter).with_test_writer().try_init();
}

/// Find a port nobody listens on right now
pub fn free_port() -> Result<u16, Box<dyn Error>> {
	let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
	Ok(listener.local_addr()?.port())
}

pub async fn ldap_connect_anonymous(url: &str) -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, ldap) = LdapConnAsync::new(url).await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	Ok(ldap)
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={ou},{SUFFIX}"),
		vec![("objectClass", HashSet::from(["organizationalUnit"]))],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={ou},{SUFFIX}")).await?.success()?;
	Ok(())
}

pub async fn ldap_add_user(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	sn: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("cn={cn},ou=users,{SUFFIX}"),
		vec![("objectClass", HashSet::from(["inetOrgPerson"])), ("sn", HashSet::from([sn]))],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_user(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={cn},ou=users,{SUFFIX}")).await?.success()?;
	Ok(())
}

pub async fn ldap_user_replace_attribute(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	attribute: &str,
	value: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.modify(
		&format!("cn={cn},ou=users,{SUFFIX}"),
		vec![ldap3::Mod::Replace(attribute, HashSet::from([value]))],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_search_base(
	ldap: &mut ldap3::Ldap,
	dn: &str,
) -> Result<Vec<SearchEntry>, Box<dyn Error>> {
	let (result, _res) =
		ldap.search(dn, ldap3::Scope::Base, "(objectClass=*)", vec!["*"]).await?.success()?;
	Ok(result.into_iter().map(SearchEntry::construct).collect())
}

pub async fn ldap_search_subtree(
	ldap: &mut ldap3::Ldap,
	filter: &str,
) -> Result<Vec<SearchEntry>, Box<dyn Error>> {
	let (result, _res) =
		ldap.search(SUFFIX, ldap3::Scope::Subtree, filter, vec!["*"]).await?.success()?;
	Ok(result.into_iter().map(SearchEntry::construct).collect())
}
