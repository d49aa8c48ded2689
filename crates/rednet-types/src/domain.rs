//! Domain name parsing (spec §3, §8 "DNS totality").
//!
//! `parse` is pure and total: every input string resolves to exactly one of
//! a computer domain, an alias, or a [`DomainError`]. Case folding happens
//! before matching, and folding twice is a no-op (`parse(parse(s).render())
//! == parse(s)`).

use std::fmt;

use thiserror::Error;

/// Subdomain labels and aliases longer than this are rejected. Matches the
/// `maxDomainLength` config value (spec §6, default 32).
pub const MAX_DOMAIN_LENGTH: usize = 32;

const RESERVED: &[&str] = &[
    "rdnt",
    "admin",
    "root",
    "system",
    "localhost",
    "broadcast",
    "all",
    "none",
    "test",
    "example",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain name is empty")]
    Empty,
    #[error("label '{0}' exceeds the maximum length of {MAX_DOMAIN_LENGTH}")]
    TooLong(String),
    #[error("'{0}' is a reserved name and cannot be used as an alias")]
    Reserved(String),
    #[error("label '{0}' contains characters outside [A-Za-z0-9_-]")]
    InvalidLabel(String),
    #[error("'{0}' is not a valid computer domain or alias")]
    Malformed(String),
}

/// The result of parsing a domain name: exactly one of the two shapes the
/// spec defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDomain {
    /// `<subdomain>.comp<id>.rednet`. Ownership is implicit: the node whose
    /// numeric id equals `id`.
    Computer { subdomain: String, id: u64 },
    /// Any other accepted label (optionally `.rednet`-suffixed). Ownership
    /// is first-register-wins.
    Alias { label: String },
}

impl ParsedDomain {
    /// The canonical lowercase string form, suitable for registry/cache keys.
    pub fn canonical(&self) -> String {
        match self {
            ParsedDomain::Computer { subdomain, id } => format!("{subdomain}.comp{id}.rednet"),
            ParsedDomain::Alias { label } => label.clone(),
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self, ParsedDomain::Computer { .. })
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, ParsedDomain::Alias { .. })
    }
}

impl fmt::Display for ParsedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse a domain name. Total: every `&str` maps to `Ok` or `Err`, never
/// panics.
pub fn parse(input: &str) -> Result<ParsedDomain, DomainError> {
    let lower = input.to_lowercase();
    if lower.is_empty() {
        return Err(DomainError::Empty);
    }

    if let Some(parsed) = try_parse_computer(&lower)? {
        return Ok(parsed);
    }

    parse_alias(&lower)
}

fn try_parse_computer(lower: &str) -> Result<Option<ParsedDomain>, DomainError> {
    let Some(rest) = lower.strip_suffix(".rednet") else {
        return Ok(None);
    };
    let Some(dot) = rest.rfind('.') else {
        return Ok(None);
    };
    let (subdomain, comp_part) = (&rest[..dot], &rest[dot + 1..]);
    let Some(id_str) = comp_part.strip_prefix("comp") else {
        return Ok(None);
    };
    if id_str.is_empty() || !id_str.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    if subdomain.is_empty() || !subdomain.chars().all(is_label_char) {
        return Err(DomainError::InvalidLabel(subdomain.to_string()));
    }
    if subdomain.len() > MAX_DOMAIN_LENGTH {
        return Err(DomainError::TooLong(subdomain.to_string()));
    }
    if RESERVED.contains(&subdomain) {
        return Err(DomainError::Reserved(subdomain.to_string()));
    }

    let id: u64 = id_str
        .parse()
        .map_err(|_| DomainError::Malformed(lower.to_string()))?;

    Ok(Some(ParsedDomain::Computer {
        subdomain: subdomain.to_string(),
        id,
    }))
}

fn parse_alias(lower: &str) -> Result<ParsedDomain, DomainError> {
    let stripped = lower.strip_suffix(".rednet").unwrap_or(lower);
    if stripped.is_empty() {
        return Err(DomainError::Malformed(lower.to_string()));
    }

    let labels: Vec<&str> = stripped.split('.').collect();
    for label in &labels {
        if label.is_empty() || !label.chars().all(is_label_char) {
            return Err(DomainError::InvalidLabel((*label).to_string()));
        }
        if label.len() > MAX_DOMAIN_LENGTH {
            return Err(DomainError::TooLong((*label).to_string()));
        }
    }

    if labels.len() == 1 && RESERVED.contains(&labels[0]) {
        return Err(DomainError::Reserved(labels[0].to_string()));
    }

    Ok(ParsedDomain::Alias {
        label: stripped.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_computer_domain() {
        let d = parse("Blog.Comp42.RedNet").unwrap();
        assert_eq!(
            d,
            ParsedDomain::Computer {
                subdomain: "blog".into(),
                id: 42
            }
        );
        assert_eq!(d.canonical(), "blog.comp42.rednet");
    }

    #[test]
    fn rejects_reserved_subdomain() {
        let err = parse("admin.comp1.rednet").unwrap_err();
        assert_eq!(err, DomainError::Reserved("admin".into()));
    }

    #[test]
    fn parses_bare_alias() {
        let d = parse("shop").unwrap();
        assert_eq!(
            d,
            ParsedDomain::Alias {
                label: "shop".into()
            }
        );
    }

    #[test]
    fn parses_dotted_alias_with_suffix() {
        let d = parse("my.shop.rednet").unwrap();
        assert_eq!(
            d,
            ParsedDomain::Alias {
                label: "my.shop".into()
            }
        );
    }

    #[test]
    fn rejects_reserved_alias() {
        assert_eq!(parse("root").unwrap_err(), DomainError::Reserved("root".into()));
    }

    #[test]
    fn boundary_length_exactly_max_is_accepted() {
        let label = "a".repeat(MAX_DOMAIN_LENGTH);
        let domain = format!("{label}.comp1.rednet");
        assert!(parse(&domain).is_ok());
    }

    #[test]
    fn boundary_length_over_max_is_rejected() {
        let label = "a".repeat(MAX_DOMAIN_LENGTH + 1);
        let domain = format!("{label}.comp1.rednet");
        assert!(matches!(parse(&domain), Err(DomainError::TooLong(_))));
    }

    #[test]
    fn lowercasing_is_idempotent() {
        let once = parse("Blog.Comp42.RedNet").unwrap();
        let twice = parse(&once.canonical()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_is_an_error_not_a_panic() {
        assert_eq!(parse("").unwrap_err(), DomainError::Empty);
    }

    #[test]
    fn malformed_comp_id_falls_back_to_alias_rules() {
        // "foo.compX.rednet" isn't a computer domain (non-numeric id), and
        // as an alias it's a two-label dotted name, which is allowed.
        let d = parse("foo.compx.rednet").unwrap();
        assert_eq!(
            d,
            ParsedDomain::Alias {
                label: "foo.compx".into()
            }
        );
    }
}
