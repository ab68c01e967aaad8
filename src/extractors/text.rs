//! Phrase reconstruction from text-node snapshots
//!
//! A text-node locator returns every text node separately, so
//! `hello <b>world</b> today` comes back as `"hello "`, `"world"`, `" today"`.
//! Fragments that touch across a space are one phrase; fragments that
//! abut without a space are separate items.

/// Merge adjacent fragments into phrases.
///
/// A phrase keeps absorbing the next fragment while it ends with a space or
/// the next fragment starts with one. Every fragment is used exactly once
/// and nothing is trimmed, so the phrases concatenate back to the input.
pub fn reconstruct_phrases<S: AsRef<str>>(fragments: &[S]) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut j = 0;

    while j < fragments.len() {
        let mut phrase = fragments[j].as_ref().to_string();
        while let Some(next) = fragments.get(j + 1).map(AsRef::as_ref) {
            if !phrase.ends_with(' ') && !next.starts_with(' ') {
                break;
            }
            phrase.push_str(next);
            j += 1;
        }
        phrases.push(phrase);
        j += 1;
    }

    phrases
}
