//! Line-oriented event scripts.
//!
//! A script spells out an event stream one event per line, which lets the
//! builder be driven without a TOML grammar in front of it:
//!
//! ```text
//! # [fruit]
//! # name = "apple"
//! table fruit
//! push "apple"
//! pair name
//! ```
//!
//! | Line | Event |
//! |---|---|
//! | `table <path>` | `TableHeader`, plain |
//! | `array <path>` | `TableHeader`, array of tables |
//! | `pair <path>` | `PairKey` |
//! | `key <path>` | `InlineKey` |
//! | `push <literal>` | `PushLiteral` |
//! | `open array`, `open inline` | `OpenComposite` |
//! | `close array`, `close inline` | `CloseComposite` |
//!
//! Paths are dot-separated and segments may be quoted; the quotes are left
//! in place for [`KeyPath::normalize`] to strip. Literals are `"strings"`,
//! `true`/`false`, integers, floats (including `inf` and `nan`), and
//! datetimes (anything else starting with a digit and containing `-` or
//! `:`).

use crate::builder::DocumentBuilder;
use crate::error::{ScriptContext, ScriptError};
use crate::event::Event;
use crate::key::KeyPath;
use crate::options::Options;
use crate::stack::CompositeKind;
use crate::value::Value;

/// Parse a whole script into events without building anything.
pub fn parse_script(input: &str, filename: Option<&str>) -> Result<Vec<Event>, ScriptError> {
    let ctx = ScriptContext::new(filename);
    let mut events = Vec::new();
    for (index, line) in input.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(message) => {
                return Err(ScriptError::Syntax {
                    message,
                    suffix: ctx.loc_suffix(index + 1),
                })
            }
        }
    }
    Ok(events)
}

/// Replay a script through a fresh builder, stopping at the first error.
pub fn replay(input: &str, options: &Options) -> Result<Value, ScriptError> {
    let ctx = ScriptContext::new(options.filename.as_deref());
    let mut builder = DocumentBuilder::with_options(options);

    for (index, line) in input.lines().enumerate() {
        let line_num = index + 1;
        let event = match parse_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(message) => {
                return Err(ScriptError::Syntax {
                    message,
                    suffix: ctx.loc_suffix(line_num),
                })
            }
        };
        builder
            .apply(event)
            .map_err(|source| ScriptError::Build {
                source,
                suffix: ctx.loc_suffix(line_num),
            })?;
    }

    builder.finish().map_err(|source| ScriptError::Build {
        source,
        suffix: ctx.end_suffix(),
    })
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Event>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    };

    let event = match word {
        "table" => Event::table(parse_path(rest)?),
        "array" => Event::array_of_tables(parse_path(rest)?),
        "pair" => Event::pair(parse_path(rest)?),
        "key" => Event::inline_key(parse_path(rest)?),
        "push" => Event::literal(parse_literal(rest)?),
        "open" => Event::open(parse_kind(rest)?),
        "close" => Event::close(parse_kind(rest)?),
        _ => return Err(format!("Unknown event \"{}\"", word)),
    };
    Ok(Some(event))
}

/// Split a dotted path, keeping quoted segments intact.
fn parse_path(text: &str) -> Result<KeyPath, String> {
    if text.is_empty() {
        return Err("Expected key path".to_string());
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '.' => {
                    segments.push(finish_segment(&current, text)?);
                    current.clear();
                }
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                _ => current.push(c),
            },
        }
    }
    if quote.is_some() {
        return Err(format!("Unterminated quoted key in \"{}\"", text));
    }
    segments.push(finish_segment(&current, text)?);

    Ok(KeyPath::normalize(segments))
}

fn finish_segment(segment: &str, path: &str) -> Result<String, String> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(format!("Empty key segment in \"{}\"", path));
    }
    Ok(segment.to_string())
}

fn parse_kind(text: &str) -> Result<CompositeKind, String> {
    match text {
        "array" => Ok(CompositeKind::Array),
        "inline" => Ok(CompositeKind::InlineTable),
        _ => Err(format!("Expected \"array\" or \"inline\", got \"{}\"", text)),
    }
}

fn parse_literal(text: &str) -> Result<Value, String> {
    if text.is_empty() {
        return Err("Expected literal".to_string());
    }
    if text.starts_with('"') {
        return parse_string(text).map(Value::String);
    }
    match text {
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        "inf" | "+inf" => return Ok(Value::Float(f64::INFINITY)),
        "-inf" => return Ok(Value::Float(f64::NEG_INFINITY)),
        "nan" | "+nan" | "-nan" => return Ok(Value::Float(f64::NAN)),
        _ => {}
    }

    let first = text.chars().next().unwrap_or(' ');
    if !(first.is_ascii_digit() || first == '+' || first == '-') {
        return Err(format!("Invalid literal \"{}\"", text));
    }

    let digits = text.replace('_', "");
    if let Ok(n) = digits.parse::<i64>() {
        return Ok(Value::Integer(n));
    }
    if let Ok(f) = digits.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    if first.is_ascii_digit() && (text.contains('-') || text.contains(':')) {
        return Ok(Value::Datetime(text.to_string()));
    }
    Err(format!("Invalid literal \"{}\"", text))
}

/// Parse a double-quoted string with basic escapes.
fn parse_string(text: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = text[1..].chars();
    loop {
        match chars.next() {
            None => return Err("Unterminated string".to_string()),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(c) => return Err(format!("Bad escaped character \"\\{}\"", c)),
                None => return Err("Unterminated string".to_string()),
            },
            Some(c) => out.push(c),
        }
    }
    if !chars.as_str().trim().is_empty() {
        return Err("Unexpected extra content after string".to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_keep_quoted_dots() {
        let event = parse_line("table site.\"google.com\"").unwrap().unwrap();
        assert_eq!(event, Event::table(["site", "google.com"]));
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("\"a\\\"b\"").unwrap(), Value::from("a\"b"));
        assert_eq!(parse_literal("1_000").unwrap(), Value::Integer(1000));
        assert_eq!(parse_literal("-17").unwrap(), Value::Integer(-17));
        assert_eq!(parse_literal("6.5e-1").unwrap(), Value::Float(0.65));
        assert_eq!(parse_literal("-inf").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert_eq!(
            parse_literal("1979-05-27T07:32:00Z").unwrap(),
            Value::Datetime("1979-05-27T07:32:00Z".to_string())
        );
        assert!(parse_literal("apple").is_err());
        assert!(parse_literal("\"open").is_err());
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# [fruit]").unwrap(), None);
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(
            parse_line("frobnicate x").unwrap_err(),
            "Unknown event \"frobnicate\""
        );
        assert!(parse_line("table a..b").is_err());
        assert!(parse_line("open list").is_err());
        assert!(parse_line("pair").is_err());
    }

    #[test]
    fn syntax_errors_carry_location() {
        let options = Options::new().with_filename("bad.events");
        let err = replay("table a\nwat", &options).unwrap_err();
        assert_eq!(err.to_string(), "Unknown event \"wat\" at line 2 of <bad.events>");
        assert!(err.build_error().is_none());
    }
}
