//! Message template parsing
//!
//! Templates use `{name}` placeholders that are substituted from a record's
//! properties. `{{` and `}}` produce literal braces, `{*}` substitutes the
//! whole property bag, and placeholders may reach into nested values:
//!
//! - `{user.name}` and `{user?.name}` for object fields
//! - `{items[0]}` for array elements
//! - `{map["some key"]}` / `{map['k']}` for quoted field names
//!
//! Parsing never fails. Unknown keys, malformed paths and out-of-range
//! indices all substitute "nothing" (`None`), and an unmatched `{` stays
//! literal text. Path resolution only follows own fields and refuses the
//! `__proto__`, `prototype` and `constructor` keys at every depth.

use super::record::Message;
use super::value::{Properties, Value};

const BLOCKED_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// Parse `template` against `properties` into a rendered [`Message`].
pub fn parse_message_template(template: &str, properties: &Properties) -> Message {
    if !template.contains('{') {
        return Message::literal(template);
    }

    let bytes = template.as_bytes();
    let length = bytes.len();
    let mut message = Message::new();
    let mut start = 0;
    let mut i = 0;

    while i < length {
        match bytes[i] {
            b'{' => {
                if i + 1 < length && bytes[i + 1] == b'{' {
                    i += 2;
                    continue;
                }
                let close = match template[i + 1..].find('}') {
                    Some(offset) => i + 1 + offset,
                    None => {
                        i += 1;
                        continue;
                    }
                };
                message.push_str(&unescape_braces(&template[start..i]));
                let key = &template[i + 1..close];
                message.push_value(resolve_placeholder(key, properties));
                i = close + 1;
                start = i;
            }
            b'}' if i + 1 < length && bytes[i + 1] == b'}' => i += 2,
            _ => i += 1,
        }
    }

    message.push_str(&unescape_braces(&template[start..]));
    message
}

/// Interleave literal fragments with positional values.
///
/// Missing fragments are treated as empty strings, so the result keeps the
/// literal/value alternation whatever the input lengths are.
pub fn render_message<S: AsRef<str>>(fragments: &[S], values: &[Value]) -> Message {
    let mut message = Message::literal(fragments.first().map(AsRef::as_ref).unwrap_or(""));
    for (index, value) in values.iter().enumerate() {
        message.push_value(Some(value.clone()));
        if let Some(fragment) = fragments.get(index + 1) {
            message.push_str(fragment.as_ref());
        }
    }
    message
}

fn unescape_braces(text: &str) -> String {
    if !text.contains("{{") && !text.contains("}}") {
        return text.to_string();
    }
    text.replace("{{", "{").replace("}}", "}")
}

fn resolve_placeholder(key: &str, properties: &Properties) -> Option<Value> {
    let trimmed = key.trim();

    if trimmed == "*" {
        if let Some(value) = properties.get("*") {
            return Some(value.clone());
        }
        if let Some(value) = properties.get(key) {
            return Some(value.clone());
        }
        return Some(Value::Object(properties.clone()));
    }

    let direct = properties
        .get(key)
        .or_else(|| (key != trimmed).then(|| properties.get(trimmed)).flatten());
    if let Some(value) = direct {
        return Some(value.clone());
    }

    if is_nested_access(trimmed) {
        return resolve_property_path(properties, trimmed).cloned();
    }
    None
}

fn is_nested_access(key: &str) -> bool {
    key.contains('.') || key.contains('[') || key.contains("?.")
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Field(String),
    Index(Option<usize>),
}

/// Resolve a nested path such as `user.roles[0]?.name`.
pub fn resolve_property_path<'a>(properties: &'a Properties, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    let (first, rest) = segments.split_first()?;

    let mut current = match first {
        PathSegment::Field(name) if !BLOCKED_KEYS.contains(&name.as_str()) => {
            properties.get(name)?
        }
        _ => return None,
    };

    for segment in rest {
        if current.is_null() {
            return None;
        }
        current = match segment {
            PathSegment::Field(name) if BLOCKED_KEYS.contains(&name.as_str()) => return None,
            PathSegment::Field(name) => current.get_property(name)?,
            PathSegment::Index(Some(index)) => current.get_index(*index)?,
            PathSegment::Index(None) => return None,
        };
    }
    Some(current)
}

/// Split a path into segments; `None` when the path is malformed.
fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let chars: Vec<char> = path.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    let first = read_identifier(&chars, &mut i);
    if first.is_empty() {
        return None;
    }
    segments.push(PathSegment::Field(first));

    while i < chars.len() {
        match chars[i] {
            '?' => {
                if chars.get(i + 1) != Some(&'.') {
                    return None;
                }
                i += 2;
                if chars.get(i) == Some(&'[') {
                    segments.push(read_bracket(&chars, &mut i)?);
                } else {
                    let name = read_identifier(&chars, &mut i);
                    if name.is_empty() {
                        return None;
                    }
                    segments.push(PathSegment::Field(name));
                }
            }
            '.' => {
                i += 1;
                let name = read_identifier(&chars, &mut i);
                if name.is_empty() {
                    return None;
                }
                segments.push(PathSegment::Field(name));
            }
            '[' => segments.push(read_bracket(&chars, &mut i)?),
            _ => return None,
        }
    }

    Some(segments)
}

fn read_identifier(chars: &[char], i: &mut usize) -> String {
    let start = *i;
    while *i < chars.len() && !matches!(chars[*i], '.' | '[' | '?') {
        *i += 1;
    }
    chars[start..*i].iter().collect()
}

fn read_bracket(chars: &[char], i: &mut usize) -> Option<PathSegment> {
    // chars[*i] == '['
    *i += 1;
    match chars.get(*i) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            *i += 1;
            let key = read_quoted(chars, i, quote)?;
            if chars.get(*i) != Some(&']') {
                return None;
            }
            *i += 1;
            Some(PathSegment::Field(key))
        }
        _ => {
            let start = *i;
            while *i < chars.len() && chars[*i] != ']' {
                *i += 1;
            }
            if *i >= chars.len() {
                return None;
            }
            let inner: String = chars[start..*i].iter().collect();
            *i += 1;
            let inner = inner.trim();
            if inner.is_empty() {
                return None;
            }
            Some(PathSegment::Index(parse_index(inner)?))
        }
    }
}

/// `Some(None)` for numeric-looking indices that can never match
/// (negative or fractional); `None` for anything that is not a number.
fn parse_index(text: &str) -> Option<Option<usize>> {
    if let Ok(index) = text.parse::<usize>() {
        return Some(Some(index));
    }
    text.parse::<f64>().ok().map(|_| None)
}

fn read_quoted(chars: &[char], i: &mut usize, quote: char) -> Option<String> {
    let mut out = String::new();
    while *i < chars.len() {
        let c = chars[*i];
        *i += 1;
        if c == quote {
            return Some(out);
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = *chars.get(*i)?;
        *i += 1;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' => out.push('\0'),
            'u' => {
                let hex: String = chars.get(*i..*i + 4)?.iter().collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
                *i += 4;
            }
            other => out.push(other),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::MessagePart;

    fn values(message: &Message) -> Vec<Option<Value>> {
        message.values().to_vec()
    }

    #[test]
    fn test_no_placeholder_fast_path() {
        let message = parse_message_template("plain text", &Properties::new());
        assert_eq!(message.literals(), ["plain text"]);
        assert_eq!(message.len(), 1);

        let empty = parse_message_template("", &Properties::new());
        assert_eq!(empty.literals(), [""]);
    }

    #[test]
    fn test_simple_substitution() {
        let props = Properties::new().with_field("name", "Alice").with_field("count", 0);
        let message = parse_message_template("Hello, {name}! You have {count} items", &props);

        assert_eq!(message.literals(), ["Hello, ", "! You have ", " items"]);
        assert_eq!(
            values(&message),
            vec![Some(Value::from("Alice")), Some(Value::Int(0))]
        );
    }

    #[test]
    fn test_placeholders_at_edges() {
        let props = Properties::new().with_field("a", 1).with_field("b", 2);
        let message = parse_message_template("{a}{b}", &props);
        assert_eq!(message.literals(), ["", "", ""]);
        assert_eq!(message.len(), 5);
    }

    #[test]
    fn test_escaped_braces() {
        let message = parse_message_template("a {{b}} c", &Properties::new());
        assert_eq!(message.literals(), ["a {b} c"]);
        assert_eq!(message.len(), 1);

        let props = Properties::new().with_field("x", 1);
        let message = parse_message_template("{{{x}}}", &props);
        assert_eq!(message.literals(), ["{", "}"]);
        assert_eq!(values(&message), vec![Some(Value::Int(1))]);
    }

    #[test]
    fn test_unmatched_open_brace_is_literal() {
        let message = parse_message_template("value { not closed", &Properties::new());
        assert_eq!(message.literals(), ["value { not closed"]);
    }

    #[test]
    fn test_missing_key_is_none() {
        let message = parse_message_template("{missing}", &Properties::new());
        assert_eq!(values(&message), vec![None]);
    }

    #[test]
    fn test_falsy_values_kept_as_is() {
        let props = Properties::new()
            .with_field("zero", 0)
            .with_field("no", false)
            .with_field("nothing", Value::Null);
        let message = parse_message_template("{zero} {no} {nothing}", &props);
        assert_eq!(
            values(&message),
            vec![
                Some(Value::Int(0)),
                Some(Value::Bool(false)),
                Some(Value::Null)
            ]
        );
    }

    #[test]
    fn test_trimmed_keys() {
        let props = Properties::new().with_field("name", "trimmed");
        let message = parse_message_template("{ name }", &props);
        assert_eq!(values(&message), vec![Some(Value::from("trimmed"))]);

        let props = Properties::new()
            .with_field(" name ", "untrimmed")
            .with_field("name", "trimmed");
        let message = parse_message_template("{ name }", &props);
        assert_eq!(values(&message), vec![Some(Value::from("untrimmed"))]);
    }

    #[test]
    fn test_wildcard() {
        let props = Properties::new().with_field("a", 1);
        let message = parse_message_template("{*}", &props);
        assert_eq!(values(&message), vec![Some(Value::Object(props.clone()))]);

        let message = parse_message_template("{ * }", &props);
        assert_eq!(values(&message), vec![Some(Value::Object(props.clone()))]);

        let props = Properties::new().with_field("*", "star");
        let message = parse_message_template("{*}", &props);
        assert_eq!(values(&message), vec![Some(Value::from("star"))]);
    }

    #[test]
    fn test_nested_access() {
        let user = Properties::new()
            .with_field("name", "Bob")
            .with_field("roles", vec!["admin", "dev"])
            .with_field("profile", Value::Null);
        let props = Properties::new().with_field("user", user);

        let message = parse_message_template(
            "{user.name} {user.roles[1]} {user.profile?.email} {user.missing.deeper}",
            &props,
        );
        assert_eq!(
            values(&message),
            vec![
                Some(Value::from("Bob")),
                Some(Value::from("dev")),
                None,
                None
            ]
        );
    }

    #[test]
    fn test_quoted_bracket_keys() {
        let inner = Properties::new()
            .with_field("first name", "Carol")
            .with_field("tab\tkey", "tabbed")
            .with_field("é", "accent");
        let props = Properties::new().with_field("map", inner);

        let message = parse_message_template(
            r#"{map["first name"]} {map['tab\tkey']} {map["é"]}"#,
            &props,
        );
        assert_eq!(
            values(&message),
            vec![
                Some(Value::from("Carol")),
                Some(Value::from("tabbed")),
                Some(Value::from("accent"))
            ]
        );
    }

    #[test]
    fn test_invalid_indices() {
        let props = Properties::new()
            .with_field("items", vec![10, 20])
            .with_field("obj", Properties::new().with_field("0", "zero"));

        let message = parse_message_template(
            "{items[-1]} {items[1.5]} {items[2]} {obj[0]} {items[]}",
            &props,
        );
        assert_eq!(values(&message), vec![None, None, None, None, None]);
    }

    #[test]
    fn test_malformed_paths() {
        let props = Properties::new().with_field("a", Properties::new().with_field("b", 1));
        for template in ["{a..b}", "{.a}", "{a.}", "{a[\"b}", "{a[b]}", "{a?b}"] {
            let message = parse_message_template(template, &props);
            assert_eq!(values(&message), vec![None], "template {template}");
        }
    }

    #[test]
    fn test_prototype_keys_blocked() {
        let props = Properties::new()
            .with_field("x", Properties::new().with_field("constructor", "shadow"));
        for template in ["{x.constructor}", "{x.__proto__}", "{x.prototype}", "{x[\"constructor\"]}"] {
            let message = parse_message_template(template, &props);
            assert_eq!(values(&message), vec![None], "template {template}");
        }
    }

    #[test]
    fn test_error_value_path() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let props = Properties::new().with_field("error", crate::core::ErrorValue::from_error(&err));
        let message = parse_message_template("{error.message}", &props);
        assert_eq!(values(&message), vec![Some(Value::from("boom"))]);
    }

    #[test]
    fn test_render_message_interleaves() {
        let message = render_message(&["a=", ", b=", ""], &[Value::Int(1), Value::Int(2)]);
        assert_eq!(message.len(), 5);
        assert_eq!(message.part(1), Some(MessagePart::Value(Some(&Value::Int(1)))));

        let short = render_message(&["only"], &[Value::Int(1)]);
        assert_eq!(short.literals(), ["only", ""]);
    }
}
