//! Dot/bracket field paths into source documents.
//!
//! `raw.amt`, `$.items[0].name`, `headers['x-id']` resolve against the
//! source root; `@`, `@.name` resolve against the innermost `forEach`
//! element.

use crate::error::{MapError, MapResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    /// The document being transformed
    Source,
    /// The current `forEach` element
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A parsed source path. Serialized as its original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourcePath {
    raw: String,
    root: PathRoot,
    segments: Vec<PathSegment>,
}

impl SourcePath {
    pub fn parse(raw: &str) -> MapResult<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }

        let (root, rest, needs_separator) = if let Some(rest) = text.strip_prefix('@') {
            (PathRoot::Item, rest, true)
        } else if let Some(rest) = text.strip_prefix('$') {
            (PathRoot::Source, rest, true)
        } else {
            (PathRoot::Source, text, false)
        };

        let segments = parse_segments(raw, rest, needs_separator)?;
        Ok(Self {
            raw: text.to_string(),
            root,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> PathRoot {
        self.root
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walks the path. `item` is the innermost iteration element, if any;
    /// item-rooted paths outside an iteration resolve to nothing.
    pub fn resolve<'a>(
        &self,
        source: &'a JsonValue,
        item: Option<&'a JsonValue>,
    ) -> Option<&'a JsonValue> {
        let mut current = match self.root {
            PathRoot::Source => source,
            PathRoot::Item => item?,
        };
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }
}

fn invalid(raw: &str, reason: &str) -> MapError {
    MapError::Validation(format!("Invalid source path '{}': {}", raw, reason))
}

fn parse_segments(raw: &str, rest: &str, needs_separator: bool) -> MapResult<Vec<PathSegment>> {
    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut first = true;

    while pos < chars.len() {
        match chars[pos] {
            '[' => {
                let close = chars[pos..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| invalid(raw, "unclosed '['"))?;
                let inner: String = chars[pos + 1..close].iter().collect();
                segments.push(parse_bracket(raw, inner.trim())?);
                pos = close + 1;
            }
            '.' => {
                pos += 1;
                let (name, next) = read_name(&chars, pos);
                if name.is_empty() {
                    return Err(invalid(raw, "empty field name"));
                }
                segments.push(PathSegment::Field(name));
                pos = next;
            }
            _ if first && !needs_separator => {
                let (name, next) = read_name(&chars, pos);
                if name.is_empty() {
                    return Err(invalid(raw, "empty field name"));
                }
                segments.push(PathSegment::Field(name));
                pos = next;
            }
            c => return Err(invalid(raw, &format!("unexpected '{}'", c))),
        }
        first = false;
    }

    Ok(segments)
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_bracket(raw: &str, inner: &str) -> MapResult<PathSegment> {
    if inner == "*" {
        return Err(invalid(raw, "wildcards are not supported; use forEach"));
    }
    for quote in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Ok(PathSegment::Field(inner[1..inner.len() - 1].to_string()));
        }
    }
    inner
        .parse::<usize>()
        .map(PathSegment::Index)
        .map_err(|_| invalid(raw, "bracket must hold an index or a quoted key"))
}

impl TryFrom<String> for SourcePath {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SourcePath::parse(&value)
    }
}

impl From<SourcePath> for String {
    fn from(path: SourcePath) -> Self {
        path.raw
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dot_and_bracket_forms() {
        let path = SourcePath::parse("$.items[2]['x.y'].name").unwrap();
        assert_eq!(path.root(), PathRoot::Source);
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Field("items".into()),
                PathSegment::Index(2),
                PathSegment::Field("x.y".into()),
                PathSegment::Field("name".into()),
            ]
        );
        assert_eq!(SourcePath::parse("raw.amt").unwrap().segments().len(), 2);
    }

    #[test]
    fn item_paths() {
        let path = SourcePath::parse("@.name").unwrap();
        assert_eq!(path.root(), PathRoot::Item);
        let item = json!({"name": "n"});
        assert_eq!(path.resolve(&json!({}), Some(&item)), Some(&json!("n")));
        assert_eq!(path.resolve(&json!({}), None), None);
        assert_eq!(SourcePath::parse("@").unwrap().resolve(&json!(1), Some(&item)), Some(&item));
    }

    #[test]
    fn resolves_missing_segments_to_none() {
        let source = json!({"raw": {"amt": 12.345}, "list": [1, 2]});
        let path = SourcePath::parse("raw.amt").unwrap();
        assert_eq!(path.resolve(&source, None), Some(&json!(12.345)));
        assert_eq!(SourcePath::parse("raw.none").unwrap().resolve(&source, None), None);
        assert_eq!(SourcePath::parse("list[5]").unwrap().resolve(&source, None), None);
        assert_eq!(SourcePath::parse("raw[0]").unwrap().resolve(&source, None), None);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", "a[", "a[x]", "items[*].id", "$x", "@name"] {
            assert!(SourcePath::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn serializes_as_text() {
        let path: SourcePath = serde_json::from_value(json!("$.a[0]")).unwrap();
        assert_eq!(serde_json::to_value(&path).unwrap(), json!("$.a[0]"));
        assert!(serde_json::from_value::<SourcePath>(json!("a[")).is_err());
    }
}
