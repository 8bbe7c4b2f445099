//! Include/exclude rules for functional roles.
//!
//! Rules select roles by pattern against the live catalog. Patterns aren't
//! identifiers: `%` matches any run of characters and `\%` is a literal
//! percent sign. Unquoted patterns are upper-cased like unquoted names; a
//! pattern wrapped in double quotes is matched verbatim.

use anyhow::{bail, Context, Result};
use glob::Pattern;

use crate::catalog::CatalogSnapshot;
use crate::config::RuleOrder;
use crate::identifier::Identifier;
use crate::naming::Scope;

/// A `%`-wildcard pattern over resolved names.
#[derive(Clone, Debug, PartialEq)]
pub struct NamePattern {
    pattern: Pattern,
}

impl NamePattern {
    /// Parse a pattern as written in the config.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            bail!("empty name pattern");
        }
        let text = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            Some(inner) if raw.len() >= 2 => inner.replace("\"\"", "\""),
            _ => raw.to_uppercase(),
        };

        let mut glob = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'%') => {
                    chars.next();
                    glob.push('%');
                }
                // `**` means something else to glob
                '%' if glob.ends_with('*') => (),
                '%' => glob.push('*'),
                c => glob.push_str(&Pattern::escape(&c.to_string())),
            }
        }

        Ok(Self {
            pattern: Pattern::new(&glob).with_context(|| format!("invalid pattern {raw:?}"))?,
        })
    }

    /// A pattern matching exactly `name`.
    pub fn literal(name: &Identifier) -> String {
        if name.is_quoted() {
            format!(
                "\"{}\"",
                name.value().replace('"', "\"\"").replace('%', "\\%")
            )
        } else {
            name.to_sql()
        }
    }

    /// Whether `name` matches.
    pub fn matches(&self, name: &Identifier) -> bool {
        self.pattern.matches(name.value())
    }
}

/// INCLUDE or EXCLUDE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// Adds roles
    Include,
    /// Removes roles
    Exclude,
}

/// What a rule matches on.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopePattern {
    /// Database access roles
    Database(NamePattern),
    /// Schema access roles: (database, schema)
    Schema(NamePattern, NamePattern),
    /// Warehouse access roles
    Warehouse(NamePattern),
    /// Functional roles by name
    Role(NamePattern),
}

/// A single validated rule.
#[derive(Clone, Debug, PartialEq)]
pub struct GrantRule {
    /// INCLUDE or EXCLUDE
    pub kind: RuleKind,
    /// What it matches
    pub scope: ScopePattern,
    /// The tier, if restricted to one
    pub tier: Option<Identifier>,
}

impl GrantRule {
    /// Roles in `snapshot` this rule selects.
    pub fn matching_roles(&self, snapshot: &CatalogSnapshot) -> Vec<Identifier> {
        if let ScopePattern::Role(pattern) = &self.scope {
            return snapshot
                .functional_roles
                .iter()
                .filter(|r| pattern.matches(r))
                .cloned()
                .collect();
        }

        snapshot
            .access_roles
            .iter()
            .filter(|entry| self.tier.as_ref().map_or(true, |t| t == &entry.tier))
            .filter(|entry| match (&self.scope, &entry.scope) {
                (ScopePattern::Database(p), Scope::Database(db)) => p.matches(db),
                (ScopePattern::Schema(db_p, sc_p), Scope::Schema(reference)) => {
                    db_p.matches(&reference.database) && sc_p.matches(&reference.schema)
                }
                (ScopePattern::Warehouse(p), Scope::Warehouse(wh)) => p.matches(wh),
                _ => false,
            })
            .map(|entry| entry.role.clone())
            .collect()
    }
}

/// Everything needed to compute a functional role's desired membership.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    /// The functional role being managed
    pub target: Identifier,
    /// Evaluation order
    pub order: RuleOrder,
    /// INCLUDE and EXCLUDE rules
    pub rules: Vec<GrantRule>,
    /// Literal roles to include
    pub custom_include: Vec<Identifier>,
    /// Literal roles to exclude
    pub custom_exclude: Vec<Identifier>,
}

impl RuleSet {
    /// Rules of one kind.
    pub fn rules_of(&self, kind: RuleKind) -> impl Iterator<Item = &GrantRule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> Identifier {
        Identifier::parse(text).unwrap()
    }

    #[test]
    fn percent_is_the_only_wildcard() {
        let pattern = NamePattern::parse("sales%").unwrap();
        assert!(pattern.matches(&id("SALES")));
        assert!(pattern.matches(&id("SALES_EU")));
        assert!(!pattern.matches(&id("PRESALES")));

        let underscore = NamePattern::parse("A_B").unwrap();
        assert!(!underscore.matches(&id("AXB")));

        let glob_chars = NamePattern::parse(r#""a*[b]?""#).unwrap();
        assert!(glob_chars.matches(&id(r#""a*[b]?""#)));
        assert!(!glob_chars.matches(&id(r#""abcd""#)));
    }

    #[test]
    fn escaped_percent_is_literal() {
        let pattern = NamePattern::parse(r#""50\%""#).unwrap();
        assert!(pattern.matches(&id(r#""50%""#)));
        assert!(!pattern.matches(&id(r#""500""#)));
    }

    #[test]
    fn quoted_patterns_keep_case() {
        let pattern = NamePattern::parse(r#""Sales%""#).unwrap();
        assert!(pattern.matches(&id(r#""Sales EU""#)));
        assert!(!pattern.matches(&id("SALES")));
    }

    #[test]
    fn literals_match_only_themselves() {
        for name in ["SALES", r#""50% off""#, r#""say ""hi""""#] {
            let name = id(name);
            let pattern = NamePattern::parse(&NamePattern::literal(&name)).unwrap();
            assert!(pattern.matches(&name), "{name}");
        }
        let pattern = NamePattern::parse(&NamePattern::literal(&id(r#""50% off""#))).unwrap();
        assert!(!pattern.matches(&id(r#""50 and more% off""#)));
    }

    #[test]
    fn empty_patterns_are_rejected() {
        assert!(NamePattern::parse("").is_err());
    }
}
