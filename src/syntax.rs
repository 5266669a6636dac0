//! Syntax validation for candidate email addresses.
//!
//! Adapted from a permissive RFC 5322 / RFC 6531 grammar: quoted and
//! dot-atom local parts, domain literals, and internationalized domain
//! labels are all accepted. Case is folded before the grammar check runs
//! (the cache key downstream is lowercase; see [`crate::validator`]).

use std::net::{IpAddr, Ipv6Addr};

/// Maximum address length in octets, per the batch engine's contract.
pub const MAX_ADDRESS_LEN: usize = 255;

/// Returns `true` if `email` is within the length budget and matches the
/// permissive grammar once case-folded.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_ADDRESS_LEN {
        return false;
    }

    let folded = email.to_lowercase();
    is_valid_email_grammar(&folded)
}

fn is_valid_email_grammar(email: &str) -> bool {
    let mut in_quotes = false;
    let mut escape = false;
    let mut split_index = None;

    for (i, c) in email.char_indices() {
        match c {
            '"' if !escape => in_quotes = !in_quotes,
            '\\' if in_quotes => escape = true,
            '@' if !in_quotes => {
                split_index = Some(i);
                break;
            }
            _ => escape = false,
        }
    }

    let split_index = match split_index {
        Some(i) => i,
        None => return false,
    };

    let (local_part, domain_part) = email.split_at(split_index);
    let domain_part = &domain_part[1..];

    if local_part.is_empty() || local_part.len() > 64 {
        return false;
    }

    is_valid_local_part(local_part) && is_valid_domain_part(domain_part)
}

fn is_valid_local_part(local: &str) -> bool {
    if local.starts_with('"') && local.ends_with('"') && local.len() >= 2 {
        is_valid_quoted_string(local)
    } else {
        is_valid_dot_atom(local, false)
    }
}

fn is_valid_domain_part(domain: &str) -> bool {
    if let Some(literal) = domain.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        is_valid_domain_literal(literal)
    } else {
        is_valid_domain_name(domain)
    }
}

fn is_valid_quoted_string(quoted: &str) -> bool {
    let content = &quoted[1..quoted.len() - 1];
    let mut escape = false;

    for c in content.chars() {
        if escape {
            if !matches!(c, '\\' | '"') {
                return false;
            }
            escape = false;
        } else if c == '\\' {
            escape = true;
        } else if c == '"' {
            return false;
        }
    }
    !escape
}

fn is_valid_dot_atom(s: &str, is_domain: bool) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return false;
    }

    parts.iter().all(|part| {
        part.chars().all(|c| match c {
            '-' => !is_domain || (!part.starts_with('-') && !part.ends_with('-')),
            c if is_domain => c.is_alphanumeric() || c == '-',
            _ => c.is_alphanumeric() || "!#$%&'*+/=?^_`{|}~".contains(c),
        })
    })
}

fn is_valid_domain_literal(literal: &str) -> bool {
    literal.parse::<IpAddr>().is_ok()
        || literal
            .strip_prefix("ipv6:")
            .and_then(|ip| ip.parse::<Ipv6Addr>().ok())
            .is_some()
}

fn is_valid_domain_name(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && is_valid_dot_atom(label, true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_standard_emails() {
        assert!(is_valid_email("simple@example.com"));
        assert!(is_valid_email("very.common@example.com"));
        assert!(is_valid_email("x@example.com"));
        assert!(is_valid_email("a.b@example.com"));
    }

    #[test]
    fn valid_domain_literals() {
        assert!(is_valid_email("user@[192.168.0.1]"));
        assert!(is_valid_email("user@[IPv6:2001:db8::1]"));
    }

    #[test]
    fn valid_international() {
        assert!(is_valid_email("pele@exaample.com"));
        assert!(is_valid_email("user@xn--exmple-cua.com"));
    }

    #[test]
    fn invalid_missing_at() {
        assert!(!is_valid_email("missing.example.com"));
        assert!(!is_valid_email("missing@"));
        assert!(!is_valid_email("@missing.com"));
    }

    #[test]
    fn rejects_256_octets_accepts_255() {
        let local = "a".repeat(64);
        let label = "b".repeat(63);
        let domain = format!("{}.{}.{}", label, label, "c".repeat(62));
        let address = format!("{}@{}", local, domain);
        assert_eq!(address.len(), 255);
        assert!(is_valid_email(&address));

        let longer_domain = format!("{}.{}.{}", label, label, "c".repeat(63));
        let too_long = format!("{}@{}", local, longer_domain);
        assert_eq!(too_long.len(), 256);
        assert!(!is_valid_email(&too_long));
    }

    #[test]
    fn invalid_domains() {
        assert!(!is_valid_email("user@-hyphenstart.com"));
        assert!(!is_valid_email("user@hyphenend-.com"));
        assert!(!is_valid_email("user@.leadingdot.com"));
        assert!(!is_valid_email("user@double..dot.com"));
        assert!(!is_valid_email("user@_invalidchar.com"));
    }

    #[test]
    fn case_is_folded_before_grammar_check() {
        assert!(is_valid_email("USER@EXAMPLE.COM"));
        assert!(is_valid_email("User@Example.com"));
    }

    #[test]
    fn invalid_special_cases() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("   "));
        assert!(!is_valid_email("null@"));
        assert!(!is_valid_email("@"));
    }
}
