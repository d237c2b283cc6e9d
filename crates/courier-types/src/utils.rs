//! String formatting utilities.
//!
//! Provides helpers for rendering long identifiers and payloads in log
//! output without flooding it.

/// Utility function to truncate an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
/// Counts characters rather than bytes: identifiers are opaque and may
/// contain multi-byte characters, so the cut always lands on a char
/// boundary.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}
