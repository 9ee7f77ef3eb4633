//! Distinguished names.
//!
//! Parses the string representation described in [RFC4514], including
//! multi-valued RDNs, backslash escapes (both `\,` and hex pairs like `\2C`)
//! and quoted values. Comparison happens on a normalised form in which
//! attribute types and values are lower-cased and surrounding whitespace is
//! removed, so `DC=Example, dc=COM` equals `dc=example,dc=com`.
//!
//! [RFC4514]: https://www.rfc-editor.org/rfc/rfc4514
use std::{
	fmt,
	hash::{Hash, Hasher},
	str::FromStr,
};

use crate::error::Error;

/// A single `type=value` pair of an RDN
#[derive(Debug, Clone)]
pub struct Ava {
	/// Attribute type as written
	attr: String,
	/// Unescaped value
	value: String,
}

impl Ava {
	/// The attribute type, as it was written.
	#[must_use]
	pub fn attr(&self) -> &str {
		&self.attr
	}

	/// The unescaped attribute value.
	#[must_use]
	pub fn value(&self) -> &str {
		&self.value
	}

	/// Lower-cased `type=value` form used for comparison
	fn normalized(&self) -> String {
		format!("{}={}", self.attr.to_ascii_lowercase(), escape_value(&self.value.to_lowercase()))
	}
}

/// Relative distinguished name: one or more AVAs joined by `+`
#[derive(Debug, Clone)]
pub struct Rdn {
	/// The components, in the order they were written
	avas: Vec<Ava>,
}

impl Rdn {
	/// The attribute/value pairs of this RDN.
	#[must_use]
	pub fn avas(&self) -> &[Ava] {
		&self.avas
	}

	/// Sorted normalised form of the AVAs
	fn normalized(&self) -> String {
		let mut avas: Vec<String> = self.avas.iter().map(Ava::normalized).collect();
		avas.sort();
		avas.join("+")
	}
}

impl fmt::Display for Rdn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, ava) in self.avas.iter().enumerate() {
			if i > 0 {
				f.write_str("+")?;
			}
			write!(f, "{}={}", ava.attr, escape_value(&ava.value))?;
		}
		Ok(())
	}
}

/// A parsed distinguished name. The first RDN is the most specific one.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dn {
	/// Components, leaf first
	rdns: Vec<Rdn>,
	/// Cached normalised form
	normalized: String,
}

impl Dn {
	/// The empty DN, naming the root DSE.
	#[must_use]
	pub fn root() -> Self {
		Dn { rdns: Vec::new(), normalized: String::new() }
	}

	/// Build a DN from its RDNs, leaf first.
	fn from_rdns(rdns: Vec<Rdn>) -> Self {
		let normalized = rdns.iter().map(Rdn::normalized).collect::<Vec<_>>().join(",");
		Dn { rdns, normalized }
	}

	/// Whether this is the empty DN.
	#[must_use]
	pub fn is_root(&self) -> bool {
		self.rdns.is_empty()
	}

	/// The leftmost, most specific RDN.
	#[must_use]
	pub fn rdn(&self) -> Option<&Rdn> {
		self.rdns.first()
	}

	/// All RDNs, leaf first.
	#[must_use]
	pub fn rdns(&self) -> &[Rdn] {
		&self.rdns
	}

	/// The DN of the parent entry, or `None` for the empty DN.
	#[must_use]
	pub fn parent(&self) -> Option<Dn> {
		if self.is_root() {
			return None;
		}
		Some(Dn::from_rdns(self.rdns[1..].to_vec()))
	}

	/// Whether this DN equals `ancestor` or lies below it.
	#[must_use]
	pub fn is_within(&self, ancestor: &Dn) -> bool {
		if ancestor.rdns.len() > self.rdns.len() {
			return false;
		}
		let skip = self.rdns.len() - ancestor.rdns.len();
		self.rdns[skip..].iter().zip(&ancestor.rdns).all(|(a, b)| a.normalized() == b.normalized())
	}

	/// Whether `self` is the immediate parent of `other`.
	#[must_use]
	pub fn is_parent_of(&self, other: &Dn) -> bool {
		other.rdns.len() == self.rdns.len() + 1 && other.is_within(self)
	}

	/// Normalised string form, suitable as a lookup key.
	#[must_use]
	pub fn normalized(&self) -> &str {
		&self.normalized
	}
}

impl PartialEq for Dn {
	fn eq(&self, other: &Self) -> bool {
		self.normalized == other.normalized
	}
}

impl Eq for Dn {}

impl Hash for Dn {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.normalized.hash(state);
	}
}

impl fmt::Display for Dn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, rdn) in self.rdns.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{rdn}")?;
		}
		Ok(())
	}
}

impl FromStr for Dn {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.trim().is_empty() {
			return Ok(Dn::root());
		}
		let invalid = || Error::InvalidDn(s.to_owned());
		let rdns = split_unescaped(s, &[',', ';'])
			.ok_or_else(invalid)?
			.into_iter()
			.map(|rdn| parse_rdn(rdn).ok_or_else(invalid))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Dn::from_rdns(rdns))
	}
}

impl TryFrom<String> for Dn {
	type Error = Error;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<Dn> for String {
	fn from(dn: Dn) -> Self {
		dn.to_string()
	}
}

/// Split at any of `separators` that is neither escaped nor quoted. Returns
/// `None` on a dangling escape or an unterminated quote.
fn split_unescaped<'a>(s: &'a str, separators: &[char]) -> Option<Vec<&'a str>> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut escaped = false;
	let mut quoted = false;
	for (i, c) in s.char_indices() {
		if escaped {
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == '"' {
			quoted = !quoted;
		} else if !quoted && separators.contains(&c) {
			parts.push(&s[start..i]);
			start = i + c.len_utf8();
		}
	}
	if escaped || quoted {
		return None;
	}
	parts.push(&s[start..]);
	Some(parts)
}

/// Parse one RDN such as `cn=John+uid=jdoe`
fn parse_rdn(s: &str) -> Option<Rdn> {
	let avas = split_unescaped(s, &['+'])?
		.into_iter()
		.map(parse_ava)
		.collect::<Option<Vec<_>>>()?;
	Some(Rdn { avas })
}

/// Parse one `type=value` pair
fn parse_ava(s: &str) -> Option<Ava> {
	let (attr, value) = s.split_once('=')?;
	let attr = attr.trim();
	let valid_attr = !attr.is_empty()
		&& attr.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
	if !valid_attr {
		return None;
	}
	let value = unescape_value(trim_value(value))?;
	if value.is_empty() {
		return None;
	}
	Some(Ava { attr: attr.to_owned(), value })
}

/// Trim unescaped surrounding whitespace from a raw value
fn trim_value(raw: &str) -> &str {
	let start = raw.trim_start();
	let trimmed = start.trim_end();
	let trailing_backslashes = trimmed.chars().rev().take_while(|c| *c == '\\').count();
	if trailing_backslashes % 2 == 1 && trimmed.len() < start.len() {
		// keep the escaped space
		&start[..=trimmed.len()]
	} else {
		trimmed
	}
}

/// Resolve escapes and quotes in a raw attribute value
fn unescape_value(raw: &str) -> Option<String> {
	let raw = match raw.strip_prefix('"') {
		Some(inner) => inner.strip_suffix('"')?,
		None => raw,
	};
	let mut bytes = Vec::with_capacity(raw.len());
	let mut chars = raw.chars().peekable();
	while let Some(c) = chars.next() {
		if c != '\\' {
			let mut buf = [0; 4];
			bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
			continue;
		}
		let next = chars.next()?;
		match (next.to_digit(16), chars.peek().and_then(|c| c.to_digit(16))) {
			(Some(high), Some(low)) => {
				chars.next();
				bytes.push(u8::try_from(high * 16 + low).ok()?);
			}
			_ => {
				let mut buf = [0; 4];
				bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
			}
		}
	}
	String::from_utf8(bytes).ok()
}

/// Escape a value for the string representation of a DN
pub(crate) fn escape_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let last = value.chars().count().saturating_sub(1);
	for (i, c) in value.chars().enumerate() {
		match c {
			',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
				out.push('\\');
				out.push(c);
			}
			'#' if i == 0 => out.push_str("\\#"),
			' ' if i == 0 || i == last => out.push_str("\\ "),
			'\0' => out.push_str("\\00"),
			_ => out.push(c),
		}
	}
	out
}
