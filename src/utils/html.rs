// src/utils/html.rs

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive while dangerous tags
/// (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Used for owner-written message bodies that are embedded into emails.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Escapes plain text (names, titles, learner notes) for interpolation into HTML.
pub fn escape_text(input: &str) -> String {
    ammonia::clean_text(input)
}
