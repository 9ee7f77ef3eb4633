//! Error codes

use std::net::SocketAddr;

use ldap3_proto::proto::LdapResultCode;

/// Errors that can occur when running the embedded directory server
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// Reading or writing the working directory failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// A partition store could not be encoded or decoded.
	#[error("Partition storage: {0}")]
	Storage(#[from] serde_json::Error),
	/// A timestamp could not be formatted.
	#[error("Malformed time")]
	Time(#[from] time::error::Format),
	/// The network listener could not bind its address, usually because the
	/// port is already taken.
	#[error("Failed to bind {address}: {source}")]
	Bind {
		/// The address the listener tried to bind.
		address: SocketAddr,
		/// The underlying socket error.
		source: std::io::Error,
	},
	/// A distinguished name did not follow the string representation.
	#[error("Invalid DN {0:?}")]
	InvalidDn(String),
	/// The configuration is unusable.
	#[error("Invalid configuration: {0}")]
	Config(String),
	/// The target entry, or the parent of a new entry, does not exist.
	#[error("No such object: {0}")]
	NoSuchObject(String),
	/// An entry with the same DN is already present.
	#[error("Entry already exists: {0}")]
	EntryAlreadyExists(String),
	/// A modification referred to a value or attribute that is not present.
	#[error("No such attribute: {0}")]
	NoSuchAttribute(String),
	/// An entry lacks its object classes.
	#[error("Object class violation: {0}")]
	ObjectClassViolation(String),
	/// Attempted to delete an entry that still has children.
	#[error("Entry has children: {0}")]
	NotAllowedOnNonLeaf(String),
	/// A bind was attempted with the wrong password or an unknown DN.
	#[error("Invalid credentials")]
	InvalidCredentials,
	/// The session is not allowed to perform the operation.
	#[error("Insufficient access rights")]
	InsufficientAccess,
	/// The request is understood but not supported.
	#[error("Unwilling to perform: {0}")]
	UnwillingToPerform(String),
	/// The directory service has not been started, or was already shut down.
	#[error("Directory service is not running")]
	NotStarted,
	/// The server address could not be expressed as an LDAP URL.
	#[error(transparent)]
	Url(#[from] url::ParseError),
	/// An error from the LDAP client used to talk to the server.
	#[error(transparent)]
	Ldap(#[from] ldap3::LdapError),
}

impl Error {
	/// The LDAP result code sent to clients when an operation fails with this
	/// error.
	#[must_use]
	pub fn result_code(&self) -> LdapResultCode {
		match self {
			Error::InvalidDn(_) => LdapResultCode::InvalidDNSyntax,
			Error::NoSuchObject(_) => LdapResultCode::NoSuchObject,
			Error::EntryAlreadyExists(_) => LdapResultCode::EntryAlreadyExists,
			Error::NoSuchAttribute(_) => LdapResultCode::NoSuchAttribute,
			Error::ObjectClassViolation(_) => LdapResultCode::ObjectClassViolation,
			Error::NotAllowedOnNonLeaf(_) => LdapResultCode::NotAllowedOnNonLeaf,
			Error::InvalidCredentials => LdapResultCode::InvalidCredentials,
			Error::InsufficientAccess => LdapResultCode::InsufficentAccessRights,
			Error::UnwillingToPerform(_) => LdapResultCode::UnwillingToPerform,
			Error::NotStarted => LdapResultCode::Unavailable,
			Error::Io(_)
			| Error::Storage(_)
			| Error::Time(_)
			| Error::Bind { .. }
			| Error::Config(_)
			| Error::Url(_)
			| Error::Ldap(_) => LdapResultCode::Other,
		}
	}
}
