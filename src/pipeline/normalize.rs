//! Transport-level unescaping of markdown payloads.
//!
//! Deck sources arrive through transports that love to re-quote them: a
//! JSON body serialised twice, a shell heredoc pasted with single quotes,
//! an SDK that escapes every newline. [`normalize_markdown`] undoes one
//! layer of that so the file handed to the converter reads as the author
//! wrote it.
//!
//! The function is pure; plain text with no quoting or escape sequences
//! passes through byte-for-byte.

use tracing::debug;

/// Decode one layer of quoting/escaping from a markdown payload.
///
/// Three phases, in order:
/// 1. Double-quote wrapped input is tried as a JSON string literal; success
///    returns the decoded value immediately, failure keeps the input as-is
///    (quotes included) and continues.
/// 2. Single-quote wrapped input loses exactly one quote from each end.
/// 3. The escape sequences `\n`, `\t`, `\"`, `\'`, `\\` are substituted
///    literally, in that order.
pub fn normalize_markdown(input: &str) -> String {
    if input.starts_with('"') && input.ends_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(input) {
            return decoded;
        }
        debug!("Payload looked JSON-quoted but did not parse; unescaping manually");
    }

    let stripped = if input.len() >= 2 && input.starts_with('\'') && input.ends_with('\'') {
        &input[1..input.len() - 1]
    } else {
        input
    };

    // The double-backslash rule runs last, so a pre-escaped backslash can
    // feed an earlier rule (`\\n` comes out as `\` + newline, not `\n`).
    // Existing clients depend on this order; do not reorder.
    stripped
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .replace("\\\\", "\\")
}
