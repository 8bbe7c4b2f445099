//! Snowflake identifier grammar.
//!
//! Identifiers come in two flavors:
//!
//! * unquoted: a letter or underscore followed by letters, digits, underscores
//!   or dollar signs, at most 255 characters. Snowflake resolves these
//!   upper-cased, so they are normalized to upper case here.
//! * quoted: wrapped in double quotes, printable ASCII only, interior quotes
//!   escaped as `""`. These are preserved exactly.
//!
//! Nothing in this module repairs input. Anything that doesn't fit the
//! grammar is rejected.

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use lazy_static::lazy_static;
use regex::Regex;

/// Longest name (in characters, not counting escapes) Snowflake accepts.
pub const MAX_IDENTIFIER_LEN: usize = 255;

lazy_static! {
    static ref UNQUOTED: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,254}$").unwrap();
    /// Anything shaped like either identifier flavor, used to tell garbage
    /// apart from an identifier with extra characters around it.
    static ref IDENTIFIER_SHAPED: Regex =
        Regex::new(r#"[A-Za-z_][A-Za-z0-9_$]*|"(?:[ !#-~]|"")+""#).unwrap();
}

/// How a raw string reads under the quoting grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A bare identifier.
    Unquoted,
    /// A double-quoted identifier.
    Quoted,
    /// Not an identifier.
    Invalid,
}

/// Classify `text` without normalizing it.
pub fn classify(text: &str) -> IdentifierKind {
    if is_unquoted(text) {
        IdentifierKind::Unquoted
    } else if is_quoted(text) {
        IdentifierKind::Quoted
    } else {
        IdentifierKind::Invalid
    }
}

/// Whether `text` is a valid unquoted identifier.
pub fn is_unquoted(text: &str) -> bool {
    UNQUOTED.is_match(text)
}

/// Whether `text` is a valid quoted identifier.
pub fn is_quoted(text: &str) -> bool {
    if !text.contains('"') || !text.chars().all(is_printable_ascii) {
        return false;
    }
    // Every character is ASCII from here on, so byte indexing is safe.
    let bytes = text.as_bytes();
    let quote_count = bytes.iter().filter(|b| **b == b'"').count();
    if quote_count % 2 != 0
        || bytes.len() < 3
        || bytes[0] != b'"'
        || bytes[bytes.len() - 1] != b'"'
    {
        return false;
    }

    let interior = &bytes[1..bytes.len() - 1];
    let mut escaped_pairs = 0;
    let mut i = 0;
    while i < interior.len() {
        if interior[i] == b'"' {
            if interior.get(i + 1) != Some(&b'"') {
                return false;
            }
            escaped_pairs += 1;
            i += 2;
        } else {
            i += 1;
        }
    }

    bytes.len() <= MAX_IDENTIFIER_LEN + escaped_pairs
}

fn is_printable_ascii(c: char) -> bool {
    (' '..='~').contains(&c)
}

/// Why a string could not be read as a single identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    /// Nothing identifier-shaped in the input at all.
    NoMatch(String),
    /// Identifier-shaped content exists but doesn't cover the input as one
    /// valid identifier (trailing characters, too long, bad escapes).
    LengthMismatch(String),
}

impl Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::NoMatch(text) => write!(f, "{text:?} is not a valid identifier"),
            NameError::LengthMismatch(text) => write!(
                f,
                "{text:?} is not a valid identifier: only part of it reads as a name"
            ),
        }
    }
}

impl std::error::Error for NameError {}

/// A validated, normalized Snowflake identifier.
///
/// Two identifiers are equal when they name the same object, so the quoted
/// `"SALES"` and the unquoted `sales` compare equal even though they render
/// differently.
#[derive(Clone, Debug)]
pub struct Identifier {
    /// The resolved name, as the catalog reports it (no quotes or escapes).
    value: String,
    quoted: bool,
}

impl Identifier {
    /// Parse a single identifier from SQL text.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        match classify(text) {
            IdentifierKind::Unquoted => Ok(Identifier {
                value: text.to_uppercase(),
                quoted: false,
            }),
            IdentifierKind::Quoted => Ok(Identifier {
                value: text[1..text.len() - 1].replace("\"\"", "\""),
                quoted: true,
            }),
            IdentifierKind::Invalid => {
                if IDENTIFIER_SHAPED.is_match(text) {
                    Err(NameError::LengthMismatch(text.to_owned()))
                } else {
                    Err(NameError::NoMatch(text.to_owned()))
                }
            }
        }
    }

    /// Build an identifier from a resolved name, quoting it when the bare
    /// form would resolve to something else.
    pub fn from_value(value: &str) -> Result<Self, NameError> {
        if is_unquoted(value) && value.to_uppercase() == value {
            return Ok(Identifier {
                value: value.to_owned(),
                quoted: false,
            });
        }
        Identifier::parse(&quote(value))
    }

    /// Map a name as reported by the catalog back to an identifier.
    ///
    /// Catalog output has quotes stripped already, except for the odd
    /// listing that keeps them, so an already-quoted name is parsed as is.
    pub fn from_catalog_name(name: &str) -> Result<Self, NameError> {
        if is_quoted(name) && !name.trim_matches('"').is_empty() {
            return Identifier::parse(name);
        }
        Identifier::from_value(name)
    }

    /// The resolved name without quotes or escapes.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this identifier has to be written quoted.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// The SQL text for this identifier.
    pub fn to_sql(&self) -> String {
        if self.quoted {
            quote(&self.value)
        } else {
            self.value.to_owned()
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Why a string could not be read as `database.schema`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompositeError {
    /// No dot separates two names.
    NoSeparator(String),
    /// More than one dot could be the separator.
    AmbiguousSeparator(String),
    /// The separator was found, but one side isn't a valid identifier.
    InvalidPart {
        /// The full input.
        text: String,
        /// The offending side.
        source: NameError,
    },
}

impl Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeError::NoSeparator(text) => {
                write!(f, "{text:?} has no separator between database and schema")
            }
            CompositeError::AmbiguousSeparator(text) => write!(
                f,
                "{text:?} has more than one possible separator between database and schema"
            ),
            CompositeError::InvalidPart { text, source } => {
                write!(f, "{text:?} is not a valid schema reference: {source}")
            }
        }
    }
}

impl std::error::Error for CompositeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompositeError::InvalidPart { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A two-part `database.schema` reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeReference {
    /// The database part.
    pub database: Identifier,
    /// The schema part.
    pub schema: Identifier,
}

impl CompositeReference {
    /// Join two identifiers.
    pub fn new(database: Identifier, schema: Identifier) -> Self {
        Self { database, schema }
    }
}

impl Display for CompositeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.schema)
    }
}

/// Split `database.schema` into its two identifiers.
///
/// A dot next to a double quote (`"."`, `".` or `."`) marks a boundary
/// between a quoted part and its neighbor; exactly one such boundary may
/// exist. Without one, a quote-free text needs exactly one bare dot. Quoted
/// text without a boundary marker has no usable separator, since its dots
/// all sit inside the quoted name.
pub fn split_composite(text: &str) -> Result<CompositeReference, CompositeError> {
    let bytes = text.as_bytes();
    let dots = || bytes.iter().enumerate().filter(|(_, b)| **b == b'.');

    let boundaries: Vec<usize> = dots()
        .filter(|(i, _)| {
            let quote_before = *i > 0 && bytes[*i - 1] == b'"';
            let quote_after = bytes.get(*i + 1) == Some(&b'"');
            quote_before || quote_after
        })
        .map(|(i, _)| i)
        .collect();

    let split_at = match boundaries.as_slice() {
        [at] => *at,
        [] if text.contains('"') => return Err(CompositeError::NoSeparator(text.to_owned())),
        [] => match dots().map(|(i, _)| i).collect::<Vec<_>>().as_slice() {
            [] => return Err(CompositeError::NoSeparator(text.to_owned())),
            [at] => *at,
            _ => return Err(CompositeError::AmbiguousSeparator(text.to_owned())),
        },
        _ => return Err(CompositeError::AmbiguousSeparator(text.to_owned())),
    };

    // '.' is ASCII, so both slices start and end on char boundaries.
    let part = |raw: &str| {
        Identifier::parse(raw).map_err(|source| CompositeError::InvalidPart {
            text: text.to_owned(),
            source,
        })
    };
    Ok(CompositeReference::new(
        part(&text[..split_at])?,
        part(&text[split_at + 1..])?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_identifiers_classify() {
        for name in ["myidentifier", "MyIdentifier1", "My$identifier", "_my_identifier"] {
            assert_eq!(classify(name), IdentifierKind::Unquoted, "{name}");
            assert!(!is_quoted(name), "{name}");
        }
        assert_eq!(classify("0myidentifier"), IdentifierKind::Invalid);
        assert_eq!(classify(""), IdentifierKind::Invalid);
    }

    #[test]
    fn unquoted_length_limit() {
        let longest = "A".repeat(MAX_IDENTIFIER_LEN);
        assert!(is_unquoted(&longest));
        assert!(!is_unquoted(&format!("{longest}B")));
    }

    #[test]
    fn quoted_identifiers_classify() {
        for name in [
            r#""MyIdentifier""#,
            r#""my.identifier""#,
            r#""my identifier""#,
            r#""3rd_identifier""#,
            r#""$Identifier""#,
            r#""""""#,
            r#""a""#,
            r#""quote""andunquote""""#,
        ] {
            assert_eq!(classify(name), IdentifierKind::Quoted, "{name}");
            assert!(!is_unquoted(name), "{name}");
        }
    }

    #[test]
    fn malformed_quoted_identifiers_are_invalid() {
        for name in [
            r#"""""#,
            r#""quote"andqunquote"""#,
            r#""""#,
            r#""unterminated"#,
            "\"идентификатор\"",
        ] {
            assert_eq!(classify(name), IdentifierKind::Invalid, "{name}");
        }
    }

    #[test]
    fn quoted_length_counts_escapes_once() {
        let longest = format!("\"{}\"", "a".repeat(MAX_IDENTIFIER_LEN - 2));
        assert!(is_quoted(&longest));
        let too_long = format!("\"{}\"", "a".repeat(MAX_IDENTIFIER_LEN - 1));
        assert!(!is_quoted(&too_long));
        // 256 characters, one of them an escape pair
        let escaped = format!("\"{}\"\"\"", "a".repeat(MAX_IDENTIFIER_LEN - 3));
        assert!(is_quoted(&escaped));
    }

    #[test]
    fn parse_normalizes() {
        let unquoted = Identifier::parse("my_db").unwrap();
        assert_eq!(unquoted.to_sql(), "MY_DB");
        assert!(!unquoted.is_quoted());

        let quoted = Identifier::parse(r#""quote""and""#).unwrap();
        assert_eq!(quoted.to_sql(), r#""quote""and""#);
        assert_eq!(quoted.value(), r#"quote"and"#);
    }

    #[test]
    fn parse_reports_why() {
        assert_eq!(
            Identifier::parse("%"),
            Err(NameError::NoMatch("%".to_owned()))
        );
        assert_eq!(
            Identifier::parse("0myidentifier"),
            Err(NameError::LengthMismatch("0myidentifier".to_owned()))
        );
        assert_eq!(
            Identifier::parse("my id"),
            Err(NameError::LengthMismatch("my id".to_owned()))
        );
    }

    #[test]
    fn quoted_and_unquoted_forms_of_one_name_are_equal() {
        assert_eq!(
            Identifier::parse(r#""SALES""#).unwrap(),
            Identifier::parse("sales").unwrap()
        );
        assert_ne!(
            Identifier::parse(r#""sales""#).unwrap(),
            Identifier::parse("sales").unwrap()
        );
    }

    #[test]
    fn catalog_names_map_back_to_sql() {
        assert_eq!(Identifier::from_catalog_name("SALES").unwrap().to_sql(), "SALES");
        assert_eq!(
            Identifier::from_catalog_name("my.db").unwrap().to_sql(),
            r#""my.db""#
        );
        assert_eq!(
            Identifier::from_catalog_name("Sales").unwrap().to_sql(),
            r#""Sales""#
        );
        assert_eq!(
            Identifier::from_catalog_name(r#"say "hi""#).unwrap().to_sql(),
            r#""say ""hi""""#
        );
        assert_eq!(
            Identifier::from_catalog_name(r#""my.db""#).unwrap().value(),
            "my.db"
        );
    }

    #[test]
    fn split_accepts_all_quoting_layouts() {
        let cases = [
            ("TEST_DB.TEST_SC", "TEST_DB", "TEST_SC"),
            (r#""01""23_DB"."0123_SC""#, r#""01""23_DB""#, r#""0123_SC""#),
            (
                r#""my.identifier"."my.identifier""#,
                r#""my.identifier""#,
                r#""my.identifier""#,
            ),
            (
                r#""my.identifier".myidentifier"#,
                r#""my.identifier""#,
                "MYIDENTIFIER",
            ),
            (
                r#"myidentifier."my.identifier""#,
                "MYIDENTIFIER",
                r#""my.identifier""#,
            ),
        ];
        for (text, db, sc) in cases {
            let reference = split_composite(text).unwrap();
            assert_eq!(reference.database.to_sql(), db, "{text}");
            assert_eq!(reference.schema.to_sql(), sc, "{text}");
        }
    }

    #[test]
    fn split_rejects_bad_layouts() {
        assert_eq!(
            split_composite("TEST_SC"),
            Err(CompositeError::NoSeparator("TEST_SC".to_owned()))
        );
        assert_eq!(
            split_composite(r#""a.b""#),
            Err(CompositeError::NoSeparator(r#""a.b""#.to_owned()))
        );
        assert_eq!(
            split_composite("A.B.C"),
            Err(CompositeError::AmbiguousSeparator("A.B.C".to_owned()))
        );
        assert_eq!(
            split_composite(r#""a"."b".c"#),
            Err(CompositeError::AmbiguousSeparator(r#""a"."b".c"#.to_owned()))
        );
        for text in ["%PRD%.%", r#""01"23_DB"."0123_SC""#, "TEST_DB.%"] {
            assert!(
                matches!(split_composite(text), Err(CompositeError::InvalidPart { .. })),
                "{text}"
            );
        }
    }

    #[test]
    fn split_round_trips_joined_identifiers() {
        let names = ["plain", r#""Mixed Case""#, r#""dotted.name""#];
        for db in names {
            for sc in names {
                let reference = split_composite(&format!("{db}.{sc}")).unwrap();
                assert_eq!(reference.database, Identifier::parse(db).unwrap());
                assert_eq!(reference.schema, Identifier::parse(sc).unwrap());
            }
        }
    }
}
