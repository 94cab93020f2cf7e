//! Company-name extraction from call titles.
//!
//! Sales call titles follow loose pairing conventions: "Canva <> Initech",
//! "Initech x Grab - power user catch up", "Tesla / Initech Connect". The
//! extractor splits the title on those separators, finds the segment naming
//! the seller (from the configured alias list), and takes its neighbors as
//! account-name candidates. Pure string work, no I/O.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Trailing words that describe the meeting rather than the account.
const NOISE_WORDS: &[&str] = &[
    "bi-weekly",
    "biweekly",
    "office",
    "hours",
    "sync",
    "call",
    "meeting",
    "weekly",
    "monthly",
];

// Hyphen, "x", "&" and "+" only split when surrounded by whitespace so that
// hyphenated or conjoined names ("T-Mobile", "M&T Bank") survive intact.
// The bracket/slash/dash separators split regardless of spacing.
fn re_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(?:<>|//|\||—|–|/)\s*|\s+(?:[xX]|-|&|\+)\s+").unwrap())
}

fn re_fallback_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s\-–—/\\|<>:]+").unwrap())
}

/// Extract candidate account names from a call title.
///
/// `seller_aliases` are the seller's own brand names; they mark which side
/// of a separator is "us", and are never returned as candidates. Returns
/// lower-cased names; empty set when nothing plausible is found. Never
/// fails, regardless of input.
pub fn extract_company_names(title: &str, seller_aliases: &[String]) -> BTreeSet<String> {
    let mut companies = BTreeSet::new();

    if title.trim().is_empty() {
        return companies;
    }

    let segments: Vec<&str> = re_separator()
        .split(title)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for (i, segment) in segments.iter().enumerate() {
        if !is_seller_segment(segment, seller_aliases) {
            continue;
        }
        if i > 0 {
            if let Some(name) = clean_candidate(segments[i - 1], seller_aliases) {
                companies.insert(name);
            }
        }
        if i + 1 < segments.len() {
            if let Some(name) = clean_candidate(segments[i + 1], seller_aliases) {
                companies.insert(name);
            }
        }
    }

    // No seller pairing in the title: fall back to the first token, which is
    // where accounts land in free-form titles ("Acme Corp / Discovery Call").
    if companies.is_empty() {
        if let Some(first) = re_fallback_token()
            .split(title)
            .map(str::trim)
            .find(|t| !t.is_empty())
        {
            let token = first.to_lowercase();
            if token.len() > 2 && !is_alias(&token, seller_aliases) && !is_noise(&token) {
                companies.insert(token);
            }
        }
    }

    companies
}

/// Extract the domain part of each participant email, lower-cased.
///
/// `internal_domains` (the seller's own org) are skipped so that account
/// matching isn't polluted by the seller side of every call.
pub fn extract_participant_domains(
    emails: &[String],
    internal_domains: &[String],
) -> BTreeSet<String> {
    emails
        .iter()
        .filter_map(|email| email.rsplit_once('@').map(|(_, domain)| domain))
        .map(|domain| domain.trim().to_lowercase())
        .filter(|domain| {
            !domain.is_empty() && !internal_domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
        })
        .collect()
}

fn is_alias(candidate: &str, seller_aliases: &[String]) -> bool {
    seller_aliases.iter().any(|a| a.eq_ignore_ascii_case(candidate))
}

fn is_noise(candidate: &str) -> bool {
    NOISE_WORDS.contains(&candidate)
}

/// A segment counts as the seller side when it equals an alias or starts
/// with one followed by a descriptor ("Initech: Monthly Cadence",
/// "Initech Weekly Sync").
fn is_seller_segment(segment: &str, seller_aliases: &[String]) -> bool {
    let lowered = segment.trim().to_lowercase();
    seller_aliases.iter().any(|alias| {
        let alias = alias.to_lowercase();
        lowered == alias
            || lowered
                .strip_prefix(&alias)
                .is_some_and(|rest| rest.starts_with([':', ' ', '\t']))
    })
}

/// Normalize a neighbor segment into an account-name candidate.
///
/// Cuts descriptor tails after ':', lower-cases, and strips trailing
/// meeting-noise words ("ESL bi-weekly call" -> "esl").
fn clean_candidate(segment: &str, seller_aliases: &[String]) -> Option<String> {
    let head = segment.split(':').next().unwrap_or("");
    let mut name = head.trim().to_lowercase();

    loop {
        let stripped = match name.rsplit_once(char::is_whitespace) {
            Some((rest, last)) if is_noise(last) => rest.trim_end().to_string(),
            _ => break,
        };
        name = stripped;
    }
    // A bare noise word with nothing in front of it isn't a name.
    if is_noise(&name) {
        return None;
    }

    let name = name.trim_matches(|c: char| c == '.' || c == ',' || c == '\'').to_string();

    if name.len() > 1 && !is_alias(&name, seller_aliases) {
        Some(name)
    } else {
        None
    }
}
