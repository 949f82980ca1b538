//! Content-safety scanner: weighted pattern tables for prompt-injection
//! and PII detection.
//!
//! Both scanners are pure functions over text. Callers log findings and
//! decide what to do with them; the tables themselves are plain data so
//! they can be extended without touching control flow.
//!
//! Two injection tables exist on purpose. The general table covers
//! free-form user text. The package table is stricter because package
//! files are read by an AI runtime as instructions, which carries higher
//! injection risk than text a human reads.

use regex::Regex;
use std::sync::OnceLock;

/// Confidence at or above which `detected` flips true.
pub const INJECTION_DETECT_THRESHOLD: f64 = 0.75;
/// Confidence at or above which a file is dropped (install/sync) or a
/// publish is hard-blocked.
pub const INJECTION_DROP_THRESHOLD: f64 = 0.85;
/// Lower bound of the publish soft-warning band.
pub const INJECTION_WARN_THRESHOLD: f64 = 0.70;

/// Placeholder substituted for every redacted PII span.
pub const REDACTION_TOKEN: &str = "[REDACTED]";

/// (pattern, weight) pairs for free-form text.
const INJECTION_PATTERNS: &[(&str, f64)] = &[
    (r"(?i)ignore\s+(?:all\s+|any\s+)?(?:previous|prior|above)\s+instructions", 0.95),
    (r"(?i)disregard\s+(?:all\s+|any\s+)?(?:previous|prior|your)\s+(?:instructions|rules|guidelines)", 0.9),
    (r"(?i)you\s+are\s+now\s+(?:a|an|the|in)\b", 0.8),
    (r"(?i)forget\s+(?:everything|all)\s+(?:you|above|previous)", 0.85),
    (r"(?i)(?:reveal|print|show|output)\s+(?:the\s+|your\s+)?(?:system\s+prompt|hidden\s+instructions)", 0.9),
    (r"(?i)pretend\s+(?:to\s+be|you\s+are)", 0.7),
    (r"(?i)\bjailbreak\b", 0.8),
    (r"(?i)do\s+anything\s+now\b", 0.8),
];

/// Stricter table for package-file content: imperative directive language
/// and structured directive markup an AI runtime would execute.
const PACKAGE_FILE_PATTERNS: &[(&str, f64)] = &[
    (r"(?i)ignore\s+(?:all\s+|any\s+)?(?:previous|prior|above)\s+instructions", 0.95),
    (r"(?i)disregard\s+(?:all\s+|any\s+)?(?:previous|prior|your)\s+(?:instructions|rules|guidelines)", 0.95),
    (r"(?i)you\s+are\s+now\b", 0.85),
    (r"(?i)new\s+instructions?\s*:", 0.85),
    (r"(?i)</?(?:system|assistant|instructions?)\s*>", 0.9),
    (r"(?i)\[\[\s*(?:system|override|admin)\s*\]\]", 0.9),
    (r"(?i)(?:reveal|print|show|exfiltrate|output)\s+(?:the\s+|your\s+)?(?:system\s+prompt|hidden\s+instructions|secrets)", 0.9),
    (r"(?i)do\s+not\s+(?:tell|reveal|mention|inform)\s+(?:the\s+)?user", 0.85),
    (r"(?i)from\s+now\s+on[,\s]+(?:you|respond|act)", 0.8),
    (r"(?i)override\s+(?:all\s+)?(?:safety|security|previous)\s+", 0.85),
    (r"(?i)pretend\s+(?:to\s+be|you\s+are)", 0.75),
];

/// (kind, pattern, score, hard_block) rows. Hard-block categories are
/// credentials, national IDs and payment card numbers; soft-flag rows are
/// contact-level identifiers a creator may legitimately ship.
const PII_PATTERNS: &[(&str, &str, f64, bool)] = &[
    ("api_key", r#"(?i)(?:api[_-]?key|secret|token|password)\s*[:=]\s*['"]?[A-Za-z0-9_\-/+]{16,}"#, 0.9, true),
    ("aws_access_key", r"\bAKIA[0-9A-Z]{16}\b", 0.95, true),
    ("private_key", r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----", 0.95, true),
    ("national_id", r"\b\d{3}-\d{2}-\d{4}\b", 0.85, true),
    ("payment_card", r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b", 0.8, true),
    ("email", r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b", 0.7, false),
    ("phone", r"\b\+?\d{1,2}[ .\-]?\(?\d{3}\)?[ .\-]?\d{3}[ .\-]?\d{4}\b", 0.6, false),
    ("ip_address", r"\b(?:\d{1,3}\.){3}\d{1,3}\b", 0.5, false),
];

#[derive(Debug, Clone)]
pub struct InjectionScan {
    pub detected: bool,
    pub confidence: f64,
    pub matched_patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PiiEntity {
    pub kind: String,
    /// Byte span (start, end) of the match in the original text.
    pub span: (usize, usize),
    pub score: f64,
    pub hard_block: bool,
}

#[derive(Debug, Clone)]
pub struct PiiScan {
    pub has_pii: bool,
    pub entities: Vec<PiiEntity>,
    pub redacted: String,
    pub has_hard_block: bool,
}

fn compiled(table: &'static [(&str, f64)], cell: &'static OnceLock<Vec<(Regex, f64, String)>>) -> &'static [(Regex, f64, String)] {
    cell.get_or_init(|| {
        table
            .iter()
            .map(|(p, w)| {
                // Table patterns are developer-authored constants; a failure
                // to compile is a programming error caught by the unit tests.
                (Regex::new(p).unwrap(), *w, p.to_string())
            })
            .collect()
    })
}

fn injection_table() -> &'static [(Regex, f64, String)] {
    static CELL: OnceLock<Vec<(Regex, f64, String)>> = OnceLock::new();
    compiled(INJECTION_PATTERNS, &CELL)
}

fn package_table() -> &'static [(Regex, f64, String)] {
    static CELL: OnceLock<Vec<(Regex, f64, String)>> = OnceLock::new();
    compiled(PACKAGE_FILE_PATTERNS, &CELL)
}

fn pii_table() -> &'static [(Regex, &'static str, f64, bool)] {
    static CELL: OnceLock<Vec<(Regex, &'static str, f64, bool)>> = OnceLock::new();
    CELL.get_or_init(|| {
        PII_PATTERNS
            .iter()
            .map(|(kind, p, score, hard)| (Regex::new(p).unwrap(), *kind, *score, *hard))
            .collect()
    })
}

fn scan_with(table: &[(Regex, f64, String)], text: &str) -> InjectionScan {
    let mut confidence: f64 = 0.0;
    let mut matched = Vec::new();
    for (re, weight, label) in table {
        if re.is_match(text) {
            confidence = confidence.max(*weight);
            matched.push(label.clone());
        }
    }
    InjectionScan {
        detected: confidence >= INJECTION_DETECT_THRESHOLD,
        confidence,
        matched_patterns: matched,
    }
}

/// Score free-form text against the general injection table.
pub fn scan_for_injection(text: &str) -> InjectionScan {
    scan_with(injection_table(), text)
}

/// Score package-file content against the stricter directive table.
pub fn scan_package_file(text: &str) -> InjectionScan {
    scan_with(package_table(), text)
}

/// Highest confidence across both detectors; the install/sync pipeline
/// gates files on this.
pub fn scan_file_confidence(text: &str) -> InjectionScan {
    let general = scan_for_injection(text);
    let strict = scan_package_file(text);
    if strict.confidence >= general.confidence {
        strict
    } else {
        general
    }
}

/// Detect and redact PII. Redaction replaces each matched span, processed
/// in descending start-offset order so earlier replacements never
/// invalidate later offsets; non-matched regions are left byte-identical.
pub fn scan_for_pii(text: &str) -> PiiScan {
    let mut entities: Vec<PiiEntity> = Vec::new();
    for (re, kind, score, hard) in pii_table() {
        for m in re.find_iter(text) {
            entities.push(PiiEntity {
                kind: kind.to_string(),
                span: (m.start(), m.end()),
                score: *score,
                hard_block: *hard,
            });
        }
    }

    // Keep the earliest match when spans overlap (ordered table = priority).
    entities.sort_by(|a, b| a.span.0.cmp(&b.span.0).then(b.span.1.cmp(&a.span.1)));
    let mut kept: Vec<PiiEntity> = Vec::new();
    for e in entities {
        if kept.last().map(|k| e.span.0 < k.span.1).unwrap_or(false) {
            continue;
        }
        kept.push(e);
    }

    let mut redacted = text.to_string();
    for e in kept.iter().rev() {
        redacted.replace_range(e.span.0..e.span.1, REDACTION_TOKEN);
    }

    let has_hard_block = kept.iter().any(|e| e.hard_block);
    PiiScan {
        has_pii: !kept.is_empty(),
        entities: kept,
        redacted,
        has_hard_block,
    }
}
