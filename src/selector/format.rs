//! Expression formatters
//!
//! A formatter renders a selector expression into some textual target.
//! `PrefixFormatter` renders a comparison down to its bare operand, which is
//! what a key-prefix scan needs.

pub trait Formatter {
    /// Renders one comparison. `value` arrives in its quoted literal form.
    fn format(&self, field: &str, op: &str, value: &str) -> String;

    /// Renders a combinator over already-rendered children.
    fn format_array(&self, op: &str, values: &[String]) -> String;
}

/// Reduces a comparison to its unquoted operand.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixFormatter;

impl Formatter for PrefixFormatter {
    fn format(&self, _field: &str, _op: &str, value: &str) -> String {
        value.trim_matches('"').to_string()
    }

    /// Combinators have no prefix form.
    fn format_array(&self, _op: &str, _values: &[String]) -> String {
        String::new()
    }
}
