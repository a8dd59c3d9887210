use std::collections::HashSet;

use ammonia::Builder;

/// Escapes user text for HTML element content and quoted attribute values.
pub fn escape_text(text: &str) -> String {
    ammonia::clean_text(text)
}

/// Returns the data URI unchanged when it is an inline raster image,
/// `None` for anything else (remote URLs, scripts, SVG).
pub fn safe_image_src(src: &str) -> Option<&str> {
    let rest = src.strip_prefix("data:image/")?;
    let (mime, payload) = rest.split_once(',')?;
    let allowed = ["png;", "jpeg;", "jpg;", "gif;", "webp;", "bmp;", "avif;"]
        .iter()
        .any(|prefix| mime.starts_with(prefix));
    if allowed && mime.ends_with(";base64") && !payload.is_empty() {
        Some(src)
    } else {
        None
    }
}

/// Cleans an HTML fragment down to the tags the markup produces
/// (`<b>` and `<br>`), with no attributes.
pub fn sanitize_markup(html: &str) -> String {
    markup_sanitizer().clean(html).to_string()
}

fn markup_sanitizer() -> Builder<'static> {
    let mut builder = Builder::new();
    builder
        .tags(HashSet::from(["b", "br"]))
        .generic_attributes(HashSet::new())
        .link_rel(None);
    builder
}
