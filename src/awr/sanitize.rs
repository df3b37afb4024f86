use once_cell::sync::Lazy;
use regex::Regex;

use super::alias::AliasTable;
use super::types::Summary;

/// Boilerplate opening most table summaries carry.
pub const SUMMARY_PREFIX: &str = "This table displays ";

static LINE_BREAKS_AND_ENTITIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n|\r|&[^;]{2,4};").expect("valid regex"));
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// Cleans raw cell or header text: line breaks and character references
/// become spaces, space runs collapse, the result is trimmed and finally
/// mapped through the header alias table.
pub fn clean_text(raw: &str, aliases: &AliasTable) -> String {
    let text = LINE_BREAKS_AND_ENTITIES.replace_all(raw, " ");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = text.trim();
    aliases.canonical(text).to_string()
}

/// Trims spaces and periods from both ends, interior periods stay.
pub fn trim_dots(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == ' ')
}

/// Splits a table summary attribute into title and details at the first ". ".
pub fn parse_summary(summary: &str) -> Summary {
    let summary = match summary.strip_prefix(SUMMARY_PREFIX) {
        Some(rest) => capitalize(rest),
        None => summary.to_string(),
    };

    match summary.find(". ") {
        Some(pos) => Summary {
            title: trim_dots(&summary[..pos]).to_string(),
            details: summary[pos + 1..].trim().to_string(),
        },
        None => Summary {
            title: trim_dots(&summary).to_string(),
            details: String::new(),
        },
    }
}

/// Derives the document key a table is registered under.
pub fn section_key(title: &str, aliases: &AliasTable) -> String {
    clean_text(&title.replace('.', "_").to_lowercase(), aliases)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
