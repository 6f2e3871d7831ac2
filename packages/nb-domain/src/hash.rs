/// Rebuilds the file text exactly as the propagator writes it.
///
/// The parser drops one blank line after the closing delimiter, so a body that itself opens with
/// a line break gets that blank line written back in front of it.
pub fn canonical_text(raw_front_matter: &str, body: &str) -> String {
	if raw_front_matter.is_empty() {
		return body.to_string();
	}

	let mut text = String::with_capacity(raw_front_matter.len() + body.len() + 9);

	text.push_str("---\n");
	text.push_str(raw_front_matter);
	text.push_str("---\n");

	if body.starts_with('\n') || body.starts_with("\r\n") {
		text.push('\n');
	}

	text.push_str(body);

	text
}

/// Hex BLAKE3 digest of the canonical text.
pub fn digest(raw_front_matter: &str, body: &str) -> String {
	blake3::hash(canonical_text(raw_front_matter, body).as_bytes()).to_hex().to_string()
}
