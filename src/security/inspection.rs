// Start of file: /src/security/inspection.rs

/*
    * Signature matching for injection payloads in request paths,
    * query strings and bodies.
*/

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::EventType;

// Keyword pairs only. Lone quotes and comment markers show up in real
// passwords and names, so they are not treated as signatures.
static SQL_INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\bunion\b.+\bselect\b)|(\bselect\b.+\bfrom\b)|(\bdrop\b.+\btable\b)|(\binsert\b.+\binto\b)|('\s*or\s+'?\d+'?\s*=\s*'?\d+)",
    )
    .unwrap()
});

static XSS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(<script[^>]*>)|(javascript:)|(<[^>]*\bon\w+\s*=)|(["']\s*on\w+\s*=)|(document\.cookie)"#,
    )
    .unwrap()
});

/// Kind of payload a request was rejected for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threat {
    SqlInjection,
    CrossSiteScripting,
}

impl Threat {
    pub fn event_type(&self) -> EventType {
        match self {
            Threat::SqlInjection => EventType::SqlInjectionAttempt,
            Threat::CrossSiteScripting => EventType::XssAttempt,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Threat::SqlInjection => "SQL injection",
            Threat::CrossSiteScripting => "XSS",
        }
    }
}

/// SQL injection is checked first; a payload matching both reports as SQL.
pub fn inspect(payload: &str) -> Option<Threat> {
    if SQL_INJECTION.is_match(payload) {
        Some(Threat::SqlInjection)
    } else if XSS.is_match(payload) {
        Some(Threat::CrossSiteScripting)
    } else {
        None
    }
}

/// First 200 characters of a payload, kept as evidence
pub fn preview(payload: &str) -> String {
    payload.chars().take(200).collect()
}


// End of file: /src/security/inspection.rs
