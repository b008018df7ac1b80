//! Structured management object names.
//!
//! An [`ObjectName`] is a domain plus an unordered set of `key=value`
//! properties, written `domain:key1=value1,key2=value2`. Names may also be
//! *patterns* used only to filter queries:
//!
//! - **Domain pattern**: `*` and `?` wildcards in the domain (`com.*:type=Foo`)
//! - **Property-list pattern**: a standalone `*` element (`d:type=Foo,*`)
//! - **Property-value pattern**: wildcards inside a value (`d:type=Fo*`)
//!
//! Equality and hashing use the canonical form, in which properties are
//! sorted by key, so `d:a=1,b=2` and `d:b=2,a=1` are the same name.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Characters that may never appear in a property key.
const INVALID_KEY_CHARS: [char; 7] = [':', ',', '=', '*', '?', '"', '\n'];

/// Characters that may never appear in an unquoted property value.
/// Wildcards are allowed and turn the name into a value pattern.
const INVALID_VALUE_CHARS: [char; 5] = [',', '=', ':', '"', '\n'];

// ---------------------------------------------------------------------------
// MalformedObjectName
// ---------------------------------------------------------------------------

/// A string could not be parsed as an [`ObjectName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed object name {input:?}: {reason}")]
pub struct MalformedObjectName {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedObjectName {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wildcard matching
// ---------------------------------------------------------------------------

/// Compiled wildcard expression for a domain or property value.
#[derive(Debug)]
enum Glob {
    /// A lone `*`: matches anything without touching the regex engine.
    Any,
    Regex(Regex),
}

impl Glob {
    /// Compiles a `*`/`?` wildcard string.
    ///
    /// When `quoted` is set, backslash escapes are kept literal so that an
    /// escaped `\*` only matches the same escaped sequence in a candidate.
    fn compile(pattern: &str, quoted: bool) -> Result<Self, regex::Error> {
        if pattern == "*" {
            return Ok(Self::Any);
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 6);
        expr.push_str("(?s)^");
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                '\\' if quoted => {
                    expr.push_str(r"\\");
                    if let Some(escaped) = chars.next() {
                        expr.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                    }
                }
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        Regex::new(&expr).map(Self::Regex)
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}

/// Compiled wildcard state, present only on pattern names.
#[derive(Debug)]
struct PatternMatchers {
    domain: Option<Glob>,
    /// Keyed by property key; only wildcard values have an entry.
    values: HashMap<String, Glob>,
}

impl PatternMatchers {
    fn build(
        domain: &str,
        domain_pattern: bool,
        properties: &[(String, String)],
    ) -> Result<Self, regex::Error> {
        let domain = if domain_pattern {
            Some(Glob::compile(domain, false)?)
        } else {
            None
        };

        let mut values = HashMap::new();
        for (key, value) in properties {
            if is_value_pattern(value) {
                values.insert(key.clone(), Glob::compile(value, value.starts_with('"'))?);
            }
        }

        Ok(Self { domain, values })
    }
}

/// Returns `true` if the raw value contains an unescaped `*` or `?`.
fn is_value_pattern(raw: &str) -> bool {
    if !raw.starts_with('"') {
        return raw.contains(['*', '?']);
    }
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

// ---------------------------------------------------------------------------
// ObjectName
// ---------------------------------------------------------------------------

/// Parsed, validated management object name.
///
/// Values are kept exactly as written, including the surrounding quotes of a
/// quoted value. Use [`ObjectName::unquote`] to recover the logical text.
#[derive(Clone)]
pub struct ObjectName {
    domain: String,
    /// Properties in the order the caller wrote them.
    properties: Vec<(String, String)>,
    canonical: String,
    domain_pattern: bool,
    list_pattern: bool,
    value_pattern: bool,
    matchers: Option<Arc<PatternMatchers>>,
}

impl ObjectName {
    /// Parses `domain:key=value[,key=value]*`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedObjectName`] if the domain separator is missing, the
    /// property list is empty or malformed, a key is repeated, or a key or
    /// value contains a forbidden character.
    pub fn parse(input: &str) -> Result<Self, MalformedObjectName> {
        let Some((domain, list)) = input.split_once(':') else {
            return Err(MalformedObjectName::new(input, "missing ':' domain separator"));
        };
        if domain.contains('\n') {
            return Err(MalformedObjectName::new(input, "domain contains a newline"));
        }
        if list.is_empty() {
            return Err(MalformedObjectName::new(input, "key property list is empty"));
        }

        let mut properties: Vec<(String, String)> = Vec::new();
        let mut list_pattern = false;
        let mut value_pattern = false;
        let mut rest = list;

        loop {
            if let Some(after) = rest.strip_prefix('*') {
                if list_pattern {
                    return Err(MalformedObjectName::new(input, "'*' appears more than once"));
                }
                if !(after.is_empty() || after.starts_with(',')) {
                    return Err(MalformedObjectName::new(
                        input,
                        "'*' must stand alone in the key property list",
                    ));
                }
                list_pattern = true;
                rest = after;
            } else {
                let (key, value, after) = parse_property(input, rest)?;
                if properties.iter().any(|(k, _)| k == key) {
                    return Err(MalformedObjectName::new(
                        input,
                        format!("key {key:?} appears more than once"),
                    ));
                }
                value_pattern |= is_value_pattern(value);
                properties.push((key.to_string(), value.to_string()));
                rest = after;
            }

            match rest.strip_prefix(',') {
                None => break,
                Some("") => {
                    return Err(MalformedObjectName::new(input, "trailing ',' in property list"));
                }
                Some(after) => rest = after,
            }
        }

        Self::assemble(input, domain.to_string(), properties, list_pattern, value_pattern)
    }

    /// Builds a name from a domain and `(key, value)` pairs.
    ///
    /// Values are taken verbatim, so a value containing `,` or `=` must be
    /// passed through [`ObjectName::quote`] first.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedObjectName`] under the same rules as [`ObjectName::parse`].
    pub fn from_parts<K, V>(
        domain: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, MalformedObjectName>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let list = properties
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&format!("{domain}:{list}"))
    }

    /// The `*:*` pattern, matching every concrete name.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            domain: "*".to_string(),
            properties: Vec::new(),
            canonical: "*:*".to_string(),
            domain_pattern: true,
            list_pattern: true,
            value_pattern: false,
            matchers: Some(Arc::new(PatternMatchers {
                domain: Some(Glob::Any),
                values: HashMap::new(),
            })),
        }
    }

    fn assemble(
        input: &str,
        domain: String,
        properties: Vec<(String, String)>,
        list_pattern: bool,
        value_pattern: bool,
    ) -> Result<Self, MalformedObjectName> {
        if properties.is_empty() && !list_pattern {
            return Err(MalformedObjectName::new(input, "key property list is empty"));
        }

        let domain_pattern = domain.contains(['*', '?']);
        let canonical = canonical_string(&domain, &properties, list_pattern);
        let matchers = if domain_pattern || value_pattern {
            let built = PatternMatchers::build(&domain, domain_pattern, &properties)
                .map_err(|e| MalformedObjectName::new(input, e.to_string()))?;
            Some(Arc::new(built))
        } else {
            None
        };

        Ok(Self {
            domain,
            properties,
            canonical,
            domain_pattern,
            list_pattern,
            value_pattern,
            matchers,
        })
    }

    /// Returns this name with `default_domain` substituted if the domain is empty.
    ///
    /// A name with an explicit domain is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedObjectName`] if `default_domain` is itself invalid.
    pub fn with_domain_if_empty(&self, default_domain: &str) -> Result<Self, MalformedObjectName> {
        if !self.domain.is_empty() {
            return Ok(self.clone());
        }
        if default_domain.contains([':', '\n']) {
            return Err(MalformedObjectName::new(
                default_domain,
                "default domain contains ':' or a newline",
            ));
        }
        Self::assemble(
            &self.canonical,
            default_domain.to_string(),
            self.properties.clone(),
            self.list_pattern,
            self.value_pattern,
        )
    }

    /// Domain part of the name. Empty for a shorthand name.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Raw value of the property `key`, if present.
    #[must_use]
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Properties in the order they were written.
    #[must_use]
    pub fn key_properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Canonical form: `domain:` followed by properties sorted by key.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    /// Property list in the caller's original order.
    #[must_use]
    pub fn key_property_list_string(&self) -> String {
        let mut out = self
            .properties
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        if self.list_pattern {
            if !out.is_empty() {
                out.push(',');
            }
            out.push('*');
        }
        out
    }

    /// Property list in canonical (sorted) order.
    #[must_use]
    pub fn canonical_key_property_list_string(&self) -> &str {
        let start = self.domain.len() + 1;
        &self.canonical[start..]
    }

    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.domain_pattern || self.list_pattern || self.value_pattern
    }

    #[must_use]
    pub fn is_domain_pattern(&self) -> bool {
        self.domain_pattern
    }

    #[must_use]
    pub fn is_property_list_pattern(&self) -> bool {
        self.list_pattern
    }

    #[must_use]
    pub fn is_property_value_pattern(&self) -> bool {
        self.value_pattern
    }

    /// Tests whether the concrete `name` is selected by this name.
    ///
    /// A non-pattern name only matches itself. A pattern name never matches
    /// another pattern.
    #[must_use]
    pub fn apply(&self, name: &ObjectName) -> bool {
        if name.is_pattern() {
            return false;
        }
        if !self.is_pattern() {
            return self == name;
        }

        let matchers = self.matchers.as_deref();
        let domain_ok = match matchers.and_then(|m| m.domain.as_ref()) {
            Some(glob) => glob.is_match(&name.domain),
            None => self.domain == name.domain,
        };
        if !domain_ok {
            return false;
        }

        if !self.list_pattern && self.properties.len() != name.properties.len() {
            return false;
        }

        self.properties.iter().all(|(key, expected)| {
            name.key_property(key).is_some_and(|actual| {
                match matchers.and_then(|m| m.values.get(key)) {
                    Some(glob) => glob.is_match(actual),
                    None => expected == actual,
                }
            })
        })
    }

    /// Quotes `s` so it can be used as a property value verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use mbeans_core::ObjectName;
    ///
    /// assert_eq!(ObjectName::quote("a,b"), r#""a,b""#);
    /// assert_eq!(ObjectName::quote("x*"), r#""x\*""#);
    /// ```
    #[must_use]
    pub fn quote(s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            match c {
                '\\' | '"' | '*' | '?' => {
                    out.push('\\');
                    out.push(c);
                }
                '\n' => out.push_str(r"\n"),
                other => out.push(other),
            }
        }
        out.push('"');
        out
    }

    /// Reverses [`ObjectName::quote`].
    ///
    /// # Errors
    ///
    /// Returns [`MalformedObjectName`] if `s` is not a well-formed quoted value.
    pub fn unquote(s: &str) -> Result<String, MalformedObjectName> {
        let inner = s
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(|| MalformedObjectName::new(s, "value is not quoted"))?;

        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(escaped @ ('\\' | '"' | '*' | '?')) => out.push(escaped),
                    _ => return Err(MalformedObjectName::new(s, "invalid escape sequence")),
                },
                '"' => return Err(MalformedObjectName::new(s, "unescaped quote inside value")),
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

/// Parses one `key=value` element at the start of `s`.
///
/// Returns the key, the raw value and the unparsed remainder, which is
/// either empty or starts with `,`.
fn parse_property<'a>(
    input: &str,
    s: &'a str,
) -> Result<(&'a str, &'a str, &'a str), MalformedObjectName> {
    let Some(eq) = s.find('=') else {
        return Err(MalformedObjectName::new(input, "property without '='"));
    };
    let key = &s[..eq];
    if key.is_empty() {
        return Err(MalformedObjectName::new(input, "empty property key"));
    }
    if key.contains(INVALID_KEY_CHARS) {
        return Err(MalformedObjectName::new(
            input,
            format!("invalid character in key {key:?}"),
        ));
    }

    let after_eq = &s[eq + 1..];
    if after_eq.starts_with('"') {
        let mut chars = after_eq.char_indices().skip(1);
        let mut close = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, '\\' | '"' | '*' | '?' | 'n')) => {}
                    _ => {
                        return Err(MalformedObjectName::new(
                            input,
                            "invalid escape in quoted value",
                        ));
                    }
                },
                '"' => {
                    close = Some(i);
                    break;
                }
                '\n' => {
                    return Err(MalformedObjectName::new(input, "newline in quoted value"));
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Err(MalformedObjectName::new(input, "unterminated quoted value"));
        };
        let value = &after_eq[..=close];
        let after = &after_eq[close + 1..];
        if !(after.is_empty() || after.starts_with(',')) {
            return Err(MalformedObjectName::new(
                input,
                "unexpected characters after closing quote",
            ));
        }
        Ok((key, value, after))
    } else {
        let end = after_eq.find(',').unwrap_or(after_eq.len());
        let value = &after_eq[..end];
        if value.is_empty() {
            return Err(MalformedObjectName::new(
                input,
                format!("empty value for key {key:?}"),
            ));
        }
        if value.contains(INVALID_VALUE_CHARS) {
            return Err(MalformedObjectName::new(
                input,
                format!("invalid character in value {value:?}"),
            ));
        }
        Ok((key, value, &after_eq[end..]))
    }
}

fn canonical_string(domain: &str, properties: &[(String, String)], list_pattern: bool) -> String {
    let mut sorted: Vec<&(String, String)> = properties.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::with_capacity(domain.len() + 1 + properties.len() * 16);
    out.push_str(domain);
    out.push(':');
    for (i, (key, value)) in sorted.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    if list_pattern {
        if !properties.is_empty() {
            out.push(',');
        }
        out.push('*');
    }
    out
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ObjectName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectName").field(&self.canonical).finish()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for ObjectName {
    type Err = MalformedObjectName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ObjectName {
    type Error = MalformedObjectName;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl Serialize for ObjectName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for ObjectName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    #[test]
    fn parse_simple_name() {
        let n = name("com.example:type=Foo,name=bar");
        assert_eq!(n.domain(), "com.example");
        assert_eq!(n.key_property("type"), Some("Foo"));
        assert_eq!(n.key_property("name"), Some("bar"));
        assert_eq!(n.key_property("missing"), None);
        assert!(!n.is_pattern());
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let n = name("d:type=Foo,name=bar");
        assert_eq!(n.canonical_name(), "d:name=bar,type=Foo");
        assert_eq!(n.key_property_list_string(), "type=Foo,name=bar");
        assert_eq!(n.canonical_key_property_list_string(), "name=bar,type=Foo");
    }

    #[test]
    fn equality_ignores_property_order() {
        assert_eq!(name("d:a=1,b=2"), name("d:b=2,a=1"));
        assert_ne!(name("d:a=1,b=2"), name("d:a=1,b=3"));
        assert_ne!(name("d:a=1"), name("e:a=1"));
    }

    #[test]
    fn empty_domain_is_allowed() {
        let n = name(":type=Foo");
        assert_eq!(n.domain(), "");
        assert!(!n.is_pattern());
    }

    #[test]
    fn with_domain_if_empty_completes_shorthand() {
        let bare = name(":type=Foo");
        let full = bare.with_domain_if_empty("com.example").unwrap();
        assert_eq!(full.canonical_name(), "com.example:type=Foo");
        assert_eq!(full, name("com.example:type=Foo"));

        let explicit = name("other:type=Foo");
        assert_eq!(explicit.with_domain_if_empty("com.example").unwrap(), explicit);
    }

    #[test]
    fn with_domain_if_empty_rejects_bad_default() {
        assert!(name(":type=Foo").with_domain_if_empty("a:b").is_err());
    }

    #[test]
    fn malformed_names_rejected() {
        for bad in [
            "no-separator",
            "d:",
            "d:type",
            "d:=Foo",
            "d:type=",
            "d:type=Foo,",
            "d:type=Foo,type=Bar",
            "d:ty*pe=Foo",
            "d:type=a=b",
            "d:type=\"unterminated",
            "d:type=\"bad\\xescape\"",
            "d:type=\"x\"y",
            "d:*,*",
            "d:*x",
            "d\n:type=Foo",
        ] {
            assert!(ObjectName::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn quoted_values_may_contain_separators() {
        let n = name(r#"d:path="a,b=c:d""#);
        assert_eq!(n.key_property("path"), Some(r#""a,b=c:d""#));
        assert!(!n.is_pattern());
    }

    #[test]
    fn quote_unquote_reverse_each_other() {
        let raw = "a,b\"c*?\\\nd";
        let quoted = ObjectName::quote(raw);
        assert_eq!(ObjectName::unquote(&quoted).unwrap(), raw);
        let n = ObjectName::from_parts("d", [("k", quoted.as_str())]).unwrap();
        assert!(!n.is_pattern());
    }

    #[test]
    fn pattern_flags() {
        assert!(name("*:type=Foo").is_domain_pattern());
        assert!(name("d:type=Foo,*").is_property_list_pattern());
        assert!(name("d:*").is_property_list_pattern());
        assert!(name("d:type=Fo?").is_property_value_pattern());
        assert!(name(r#"d:type="F*""#).is_property_value_pattern());
        assert!(!name(r#"d:type="F\*""#).is_property_value_pattern());
        assert!(ObjectName::wildcard().is_pattern());
    }

    #[test]
    fn pattern_canonical_form_appends_star() {
        assert_eq!(name("d:b=2,*,a=1").canonical_name(), "d:a=1,b=2,*");
        assert_eq!(name("d:*").canonical_name(), "d:*");
        assert_eq!(ObjectName::wildcard(), name("*:*"));
    }

    #[test]
    fn apply_domain_only_pattern() {
        let pattern = name("d:*");
        assert!(pattern.apply(&name("d:type=A")));
        assert!(pattern.apply(&name("d:type=B,x=y")));
        assert!(!pattern.apply(&name("e:type=A")));
    }

    #[test]
    fn apply_domain_wildcards() {
        let pattern = name("com.*:type=A");
        assert!(pattern.apply(&name("com.example:type=A")));
        assert!(!pattern.apply(&name("org.example:type=A")));
        assert!(!pattern.apply(&name("com.example:type=B")));

        let single = name("d?:*");
        assert!(single.apply(&name("d1:type=A")));
        assert!(!single.apply(&name("d12:type=A")));
    }

    #[test]
    fn apply_property_list_pattern_is_subset_test() {
        let pattern = name("d:type=A,*");
        assert!(pattern.apply(&name("d:type=A")));
        assert!(pattern.apply(&name("d:type=A,name=x")));
        assert!(!pattern.apply(&name("d:type=B,name=x")));
        assert!(!pattern.apply(&name("d:name=x")));
    }

    #[test]
    fn apply_without_list_pattern_requires_exact_key_set() {
        let pattern = name("*:type=A");
        assert!(pattern.apply(&name("d:type=A")));
        assert!(!pattern.apply(&name("d:type=A,name=x")));
    }

    #[test]
    fn apply_value_wildcards() {
        let pattern = name("d:type=Cache*,*");
        assert!(pattern.apply(&name("d:type=CacheStats")));
        assert!(pattern.apply(&name("d:type=Cache,id=1")));
        assert!(!pattern.apply(&name("d:type=Pool")));
    }

    #[test]
    fn apply_quoted_escaped_star_is_literal() {
        let pattern = name(r#"d:k="a\*",*"#);
        assert!(!pattern.is_property_value_pattern());
        assert!(pattern.apply(&name(r#"d:k="a\*""#)));
        assert!(!pattern.apply(&name(r#"d:k="ab""#)));
    }

    #[test]
    fn apply_never_matches_patterns() {
        assert!(!ObjectName::wildcard().apply(&name("d:*")));
    }

    #[test]
    fn non_pattern_apply_is_equality() {
        let n = name("d:a=1,b=2");
        assert!(n.apply(&name("d:b=2,a=1")));
        assert!(!n.apply(&name("d:a=1")));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let n = name("d:type=Foo,name=bar");
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"d:name=bar,type=Foo\"");
        let back: ObjectName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
        assert!(serde_json::from_str::<ObjectName>("\"broken\"").is_err());
    }

    mod properties {
        use proptest::prelude::*;

        use super::super::ObjectName;

        fn property_list() -> impl Strategy<Value = Vec<(String, String)>> {
            proptest::collection::btree_map("[a-z][a-z0-9]{0,6}", "[A-Za-z0-9._-]{1,8}", 1..6)
                .prop_map(|m| m.into_iter().collect())
        }

        proptest! {
            #[test]
            fn property_order_never_changes_identity(props in property_list(), seed in any::<u64>()) {
                let forward = ObjectName::from_parts("dom", props.clone()).unwrap();
                let mut shuffled = props.clone();
                #[allow(clippy::cast_possible_truncation)]
                let rotate = (seed as usize) % shuffled.len();
                shuffled.rotate_left(rotate);
                shuffled.reverse();
                let other = ObjectName::from_parts("dom", shuffled).unwrap();
                prop_assert_eq!(&forward, &other);
                prop_assert_eq!(forward.canonical_name(), other.canonical_name());
            }

            #[test]
            fn canonical_name_reparses_to_itself(props in property_list()) {
                let n = ObjectName::from_parts("dom", props).unwrap();
                let reparsed = ObjectName::parse(n.canonical_name()).unwrap();
                prop_assert_eq!(reparsed.canonical_name(), n.canonical_name());
            }

            #[test]
            fn list_pattern_matches_any_superset(props in property_list()) {
                let n = ObjectName::from_parts("dom", props.clone()).unwrap();
                let (k, v) = &props[0];
                let pattern = ObjectName::parse(&format!("dom:{k}={v},*")).unwrap();
                prop_assert!(pattern.apply(&n));
            }
        }
    }
}
