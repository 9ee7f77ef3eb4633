//! Evaluation of LDAP search filters against entries.
use std::cmp::Ordering;

use ldap3_proto::proto::{LdapFilter, LdapSubstringFilter};

use crate::entry::{values_match, Entry};

/// Whether `entry` matches `filter`.
///
/// Text is compared case-insensitively. Ordering filters compare numerically
/// when both sides are integers, lexically otherwise. Extensible matches are
/// not supported and never match.
pub(crate) fn matches(filter: &LdapFilter, entry: &Entry) -> bool {
	match filter {
		LdapFilter::And(filters) => filters.iter().all(|f| matches(f, entry)),
		LdapFilter::Or(filters) => filters.iter().any(|f| matches(f, entry)),
		LdapFilter::Not(filter) => !matches(filter, entry),
		LdapFilter::Present(attr) => {
			attr.eq_ignore_ascii_case("objectClass") || entry.get(attr).is_some()
		}
		LdapFilter::Equality(attr, value) | LdapFilter::Approx(attr, value) => {
			entry.get(attr).is_some_and(|a| a.values().iter().any(|v| values_match(v, value.as_bytes())))
		}
		LdapFilter::Substring(attr, substrings) => entry
			.get(attr)
			.is_some_and(|a| a.str_values().any(|v| substring_matches(v, substrings))),
		LdapFilter::GreaterOrEqual(attr, value) => {
			any_ordered(entry, attr, value, |ord| ord != Ordering::Less)
		}
		LdapFilter::LessOrEqual(attr, value) => {
			any_ordered(entry, attr, value, |ord| ord != Ordering::Greater)
		}
		_ => false,
	}
}

/// Whether any value of `attr` compares to `value` as accepted by `accept`
fn any_ordered(entry: &Entry, attr: &str, value: &str, accept: impl Fn(Ordering) -> bool) -> bool {
	entry.get(attr).is_some_and(|a| a.str_values().any(|v| accept(compare(v, value))))
}

/// Order two assertion values
fn compare(a: &str, b: &str) -> Ordering {
	match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
		(Ok(a), Ok(b)) => a.cmp(&b),
		_ => a.trim().to_lowercase().cmp(&b.trim().to_lowercase()),
	}
}

/// Match `initial*any*...*final` against a value
fn substring_matches(value: &str, filter: &LdapSubstringFilter) -> bool {
	let value = value.to_lowercase();
	let mut rest = value.as_str();
	if let Some(initial) = &filter.initial {
		let Some(stripped) = rest.strip_prefix(initial.to_lowercase().as_str()) else {
			return false;
		};
		rest = stripped;
	}
	for any in &filter.any {
		let any = any.to_lowercase();
		let Some(position) = rest.find(any.as_str()) else {
			return false;
		};
		rest = &rest[position + any.len()..];
	}
	match &filter.final_ {
		Some(last) => rest.ends_with(last.to_lowercase().as_str()),
		None => true,
	}
}
