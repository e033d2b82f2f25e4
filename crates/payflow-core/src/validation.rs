//! # Validation Module
//!
//! Field validators shared by value objects, factories and the tenant rules.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request DTOs (outside this workspace)                        │
//! │  └── Shape and type checks during deserialization                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Value object constructors                                    │
//! │  └── THIS MODULE: ids, descriptions, slugs, emails, urls               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Domain services                                              │
//! │  └── Cross-aggregate rules (uniqueness, tenant policy)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum length of any opaque identifier.
pub const MIN_IDENTIFIER_LEN: usize = 3;

/// Maximum length of a payment description.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Minimum length of a tenant name.
pub const MIN_TENANT_NAME_LEN: usize = 3;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque identifier.
///
/// ## Rules
/// - Must not be blank
/// - Must be at least 3 characters
///
/// ## Example
/// ```rust
/// use payflow_core::validation::validate_identifier;
///
/// assert!(validate_identifier("payment id", "pay_1").is_ok());
/// assert!(validate_identifier("payment id", "p1").is_err());
/// ```
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() < MIN_IDENTIFIER_LEN {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: MIN_IDENTIFIER_LEN,
        });
    }

    Ok(())
}

/// Validates a payment description (already trimmed).
pub fn validate_description(value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if value.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(())
}

/// Validates a tenant display name (at least 3 characters after trimming).
pub fn validate_tenant_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() < MIN_TENANT_NAME_LEN {
        return Err(ValidationError::TooShort {
            field: "name".to_string(),
            min: MIN_TENANT_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a tenant slug.
///
/// ## Rules
/// - Must not be empty
/// - Only lowercase ASCII letters, digits and hyphens (`[a-z0-9-]+`)
///
/// ## Example
/// ```rust
/// use payflow_core::validation::validate_slug;
///
/// assert!(validate_slug("acme-store-2").is_ok());
/// assert!(validate_slug("Acme").is_err());
/// assert!(validate_slug("acme_store").is_err());
/// ```
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    if slug.is_empty() {
        return Err(ValidationError::Required {
            field: "slug".to_string(),
        });
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::invalid_format(
            "slug",
            "must contain only lowercase letters, numbers, and hyphens",
        ));
    }

    Ok(())
}

/// Validates an email address.
///
/// ## Rules
/// Accepts `local@domain.tld` where no part contains whitespace or a
/// second `@`, and the domain has a dot with characters on both sides.
///
/// ## Example
/// ```rust
/// use payflow_core::validation::validate_email;
///
/// assert!(validate_email("billing@acme.com.br").is_ok());
/// assert!(validate_email("billing@acme").is_err());
/// assert!(validate_email("bill ing@acme.com").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::invalid_format("email", "must be a valid email address");

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let clean = |part: &str| !part.is_empty() && !part.chars().any(|c| c.is_whitespace() || c == '@');

    if !clean(local) || !clean(domain) {
        return Err(invalid());
    }

    let chars: Vec<char> = domain.chars().collect();
    let has_inner_dot = chars.len() >= 3 && chars[1..chars.len() - 1].contains(&'.');
    if !has_inner_dot {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a webhook endpoint (http or https URL with a host).
pub fn validate_webhook_url(url: &str) -> ValidationResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ValidationError::invalid_format("webhook url", "must start with http:// or https://"))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format("webhook url", "must include a host"));
    }

    Ok(())
}

// =============================================================================
// Slugs
// =============================================================================

/// Turns a display name into a URL-safe slug.
///
/// ## Steps
/// ```text
/// "Café São João!"  ──lowercase──►  "café são joão!"
///                   ──fold──────►   "cafe sao joao!"
///                   ──hyphenate─►   "cafe-sao-joao"
/// ```
/// Characters without an ASCII fold are dropped. An input with nothing
/// usable becomes `"tenant"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = fold_diacritic(c);
        match folded {
            Some(c) if c.is_ascii_alphanumeric() => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c);
            }
            Some(c) if c.is_ascii_whitespace() || c.is_ascii_punctuation() => {
                pending_hyphen = true;
            }
            _ => {}
        }
    }

    if slug.is_empty() {
        "tenant".to_string()
    } else {
        slug
    }
}

/// Maps common Latin accented letters to their ASCII base letter.
fn fold_diacritic(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => 'u',
        'ý' | 'ÿ' => 'y',
        'ß' => 's',
        'ś' | 'š' => 's',
        'ź' | 'ż' | 'ž' => 'z',
        'ł' => 'l',
        _ if c.is_whitespace() => ' ',
        _ => return None,
    };
    Some(base)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("id", "abc").is_ok());
        assert!(matches!(
            validate_identifier("id", "ab"),
            Err(ValidationError::TooShort { min: 3, .. })
        ));
        assert!(matches!(
            validate_identifier("id", "   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_tenant_name() {
        assert!(validate_tenant_name("Acme").is_ok());
        assert!(validate_tenant_name(" Ac ").is_err());
        assert!(validate_tenant_name("").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("acme store").is_err());
        assert!(validate_slug("ACME").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("owner@acme.com").is_ok());
        assert!(validate_email("owner@.com").is_err());
        assert!(validate_email("owner@acme.").is_err());
        assert!(validate_email("owner@@acme.com").is_err());
        assert!(validate_email("@acme.com").is_err());
        assert!(validate_email("owneracme.com").is_err());
    }

    #[test]
    fn test_validate_webhook_url() {
        assert!(validate_webhook_url("https://hooks.acme.com/payflow").is_ok());
        assert!(validate_webhook_url("http://localhost:8080").is_ok());
        assert!(validate_webhook_url("ftp://acme.com").is_err());
        assert!(validate_webhook_url("https://").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Store"), "acme-store");
        assert_eq!(slugify("Café São João!"), "cafe-sao-joao");
        assert_eq!(slugify("  --Loja   do Zé--  "), "loja-do-ze");
        assert_eq!(slugify("Açaí & Cia. 2"), "acai-cia-2");
        assert_eq!(slugify("!!!"), "tenant");
    }
}
