pub mod markup;
pub mod sanitize;

pub use markup::{parse, plain_text, to_html, Inline};
pub use sanitize::{escape_text, sanitize_markup};
