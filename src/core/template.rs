/// `{name}` placeholder interpolation for dialogue and formatted strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("nested braces are not allowed")]
    Nested,
    #[error("unclosed brace")]
    Unclosed,
    #[error("empty braces")]
    Empty,
    #[error("unmatched closing brace")]
    UnmatchedClose,
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Variable or stat lookup: `{name}`.
    Placeholder(String),
}

/// A parsed template: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string into a sequence of segments.
    ///
    /// Syntax:
    /// - `{name}` → `Placeholder`, surrounding whitespace trimmed
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(TemplateError::Nested);
                    }
                    end += 1;
                }
                if end == len {
                    return Err(TemplateError::Unclosed);
                }

                let name: String = chars[start..end].iter().collect();
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::Empty);
                }
                segments.push(TemplateSegment::Placeholder(name.to_string()));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(TemplateError::UnmatchedClose);
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    /// Render with `lookup` resolving placeholders; unresolved names
    /// render as the empty string.
    pub fn render<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Placeholder(name) => {
                    if let Some(value) = lookup(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }

    /// Names referenced by placeholders, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Placeholder(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_only() {
        let t = Template::parse("Hello, world.").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("Hello, world.".to_string())]
        );
    }

    #[test]
    fn parse_placeholder() {
        let t = Template::parse("Hello, {user}!").unwrap();
        assert_eq!(t.segments.len(), 3);
        assert_eq!(
            t.segments[1],
            TemplateSegment::Placeholder("user".to_string())
        );
    }

    #[test]
    fn parse_escaped_braces() {
        let t = Template::parse("Use {{braces}} here.").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("Use {braces} here.".to_string())]
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Template::parse("Bad {} here"), Err(TemplateError::Empty));
        assert_eq!(Template::parse("Bad {a{b}} here"), Err(TemplateError::Nested));
        assert_eq!(Template::parse("Bad {open"), Err(TemplateError::Unclosed));
        assert_eq!(Template::parse("Bad } here"), Err(TemplateError::UnmatchedClose));
    }

    #[test]
    fn render_resolves_and_blanks_missing() {
        let t = Template::parse("{greeting}, {user}{missing}!").unwrap();
        let out = t.render(|name| match name {
            "greeting" => Some("Hi".to_string()),
            "user" => Some("Player".to_string()),
            _ => None,
        });
        assert_eq!(out, "Hi, Player!");
    }

    #[test]
    fn placeholders_in_order() {
        let t = Template::parse("{a} and {b} and {a}").unwrap();
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["a", "b", "a"]);
    }
}
