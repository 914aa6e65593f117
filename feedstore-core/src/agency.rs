//! Agency identity keys used to select cleanup rules.

const SEPARATOR: char = '-';

/// Normalise an agency identity into a rule lookup key.
///
/// Letters are lower-cased; every run of other characters (digits,
/// punctuation, whitespace, non-ASCII letters) collapses into a single `-`.
/// Separators at either end are dropped.
///
/// # Examples
/// ```
/// use feedstore_core::agency_key;
///
/// assert_eq!(
///     agency_key("MTA NYCT MTA New York City Transit"),
///     "mta-nyct-mta-new-york-city-transit"
/// );
/// assert_eq!(agency_key("  Metro -- 7 Transit."), "metro-transit");
/// ```
#[must_use]
pub fn agency_key(identity: &str) -> String {
    let mut key = String::with_capacity(identity.len());
    let mut pending_separator = false;
    for ch in identity.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() {
            if pending_separator && !key.is_empty() {
                key.push(SEPARATOR);
            }
            pending_separator = false;
            key.push(ch);
        } else {
            pending_separator = true;
        }
    }
    key
}
