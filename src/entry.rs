//! Directory entries and helpers for extracting data from them.
use std::collections::BTreeMap;

use ldap3_proto::proto::{LdapPartialAttribute, LdapSearchResultEntry};
use serde::{Deserialize, Serialize};

use crate::dn::Dn;

/// Attributes maintained by the server rather than by clients. They are only
/// returned when requested by name or with `+`.
const OPERATIONAL_ATTRIBUTES: &[&str] =
	&["createtimestamp", "modifytimestamp", "creatorsname", "modifiersname"];

/// A named attribute with its values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
	/// The attribute type, in the case it was first added with
	name: String,
	/// The values, in insertion order
	values: Vec<Vec<u8>>,
}

impl Attribute {
	/// The attribute type.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// All values in binary form.
	#[must_use]
	pub fn values(&self) -> &[Vec<u8>] {
		&self.values
	}

	/// Values that are valid UTF-8.
	pub fn str_values(&self) -> impl Iterator<Item = &str> {
		self.values.iter().filter_map(|value| std::str::from_utf8(value).ok())
	}

	/// Whether an equal value is present, comparing text case-insensitively.
	#[must_use]
	pub fn contains(&self, value: &[u8]) -> bool {
		self.values.iter().any(|existing| values_match(existing, value))
	}
}

/// An entry: a DN and its attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
	/// Name of the entry
	dn: Dn,
	/// Attributes keyed by lower-cased type
	attributes: BTreeMap<String, Attribute>,
}

impl Entry {
	/// Create an entry without attributes.
	#[must_use]
	pub fn new(dn: Dn) -> Self {
		Entry { dn, attributes: BTreeMap::new() }
	}

	/// The entry's DN.
	#[must_use]
	pub fn dn(&self) -> &Dn {
		&self.dn
	}

	/// Add values to an attribute, creating it if needed. Values already
	/// present are skipped.
	pub fn add<V, I>(&mut self, attr: &str, values: I)
	where
		V: Into<Vec<u8>>,
		I: IntoIterator<Item = V>,
	{
		let attribute = self
			.attributes
			.entry(attr.to_ascii_lowercase())
			.or_insert_with(|| Attribute { name: attr.to_owned(), values: Vec::new() });
		for value in values {
			let value = value.into();
			if !attribute.contains(&value) {
				attribute.values.push(value);
			}
		}
		if attribute.values.is_empty() {
			self.attributes.remove(&attr.to_ascii_lowercase());
		}
	}

	/// Replace all values of an attribute. An empty list removes it.
	pub fn replace<V, I>(&mut self, attr: &str, values: I)
	where
		V: Into<Vec<u8>>,
		I: IntoIterator<Item = V>,
	{
		self.attributes.remove(&attr.to_ascii_lowercase());
		self.add(attr, values);
	}

	/// Remove the given values, or the whole attribute if `values` is empty.
	/// Returns whether anything was removed.
	pub fn remove_values(&mut self, attr: &str, values: &[Vec<u8>]) -> bool {
		let key = attr.to_ascii_lowercase();
		if values.is_empty() {
			return self.attributes.remove(&key).is_some();
		}
		let Some(attribute) = self.attributes.get_mut(&key) else {
			return false;
		};
		let before = attribute.values.len();
		attribute.values.retain(|existing| !values.iter().any(|v| values_match(existing, v)));
		let removed = attribute.values.len() != before;
		if attribute.values.is_empty() {
			self.attributes.remove(&key);
		}
		removed
	}

	/// Look up an attribute by case-insensitive type.
	#[must_use]
	pub fn get(&self, attr: &str) -> Option<&Attribute> {
		self.attributes.get(&attr.to_ascii_lowercase())
	}

	/// All attributes.
	pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
		self.attributes.values()
	}

	/// Get the first value of an attribute. Will return `None` if attribute
	/// value is not valid UTF-8.
	#[must_use]
	pub fn attr_first(&self, attr: &str) -> Option<&str> {
		let value = self.bin_attr_first(attr)?;
		std::str::from_utf8(value).ok()
	}

	/// Get the first value of an attribute, in binary form
	#[must_use]
	pub fn bin_attr_first(&self, attr: &str) -> Option<&[u8]> {
		self.get(attr)?.values.first().map(Vec::as_slice)
	}

	/// Whether `objectClass` contains the given class.
	#[must_use]
	pub fn has_object_class(&self, class: &str) -> bool {
		self.get("objectClass").is_some_and(|attr| attr.contains(class.as_bytes()))
	}

	/// Convert to a search result, keeping only the requested attributes.
	///
	/// An empty selection or `*` selects all user attributes, `+` all
	/// operational ones, and `1.1` none at all.
	pub(crate) fn to_search_result(
		&self,
		requested: &[String],
		types_only: bool,
	) -> LdapSearchResultEntry {
		let all_user = requested.is_empty() || requested.iter().any(|attr| attr == "*");
		let all_operational = requested.iter().any(|attr| attr == "+");
		let attributes = self
			.attributes
			.iter()
			.filter(|(key, _)| {
				let named = requested.iter().any(|attr| attr.eq_ignore_ascii_case(key));
				if is_operational(key) {
					named || all_operational
				} else {
					named || all_user
				}
			})
			.map(|(_, attribute)| LdapPartialAttribute {
				atype: attribute.name.clone(),
				vals: if types_only { Vec::new() } else { attribute.values.clone() },
			})
			.collect();
		LdapSearchResultEntry { dn: self.dn.to_string(), attributes }
	}
}

/// Whether an attribute type is maintained by the server
pub(crate) fn is_operational(attr: &str) -> bool {
	OPERATIONAL_ATTRIBUTES.contains(&attr.to_ascii_lowercase().as_str())
}

/// Compare two values, ignoring case and surrounding whitespace for text
pub(crate) fn values_match(a: &[u8], b: &[u8]) -> bool {
	match (std::str::from_utf8(a), std::str::from_utf8(b)) {
		(Ok(a), Ok(b)) => a.trim().to_lowercase() == b.trim().to_lowercase(),
		_ => a == b,
	}
}
