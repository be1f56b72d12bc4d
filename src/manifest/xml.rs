//! Reading and writing the `package.xml` layout.
//!
//! The writer produces a fixed nesting with four-space indentation. The
//! reader is a nom parser for the same layout that also tolerates an absent
//! declaration, comments, and any order of children inside `<types>`.

use std::borrow::Cow;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while};
use nom::character::complete::{multispace0, multispace1};
use nom::combinator::{cut, map, opt, recognize, value};
use nom::error::{ContextError, ErrorKind, context};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Offset, Parser};

use super::{EncodingError, Manifest, ParseError, RawText};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const INDENT: &str = "    ";

pub(super) fn write(manifest: &Manifest) -> Result<String, EncodingError> {
    let namespace = utf8(manifest.namespace(), || "namespace".to_string())?;
    let version = utf8(manifest.version(), || "version".to_string())?;

    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    out.push('\n');
    out.push_str(&format!("<Package xmlns=\"{}\">\n", escape(namespace)));

    for entry in manifest.types() {
        let name = utf8(entry.name(), || "type name".to_string())?;
        out.push_str(&format!("{INDENT}<types>\n"));
        for member in entry.members() {
            let member = utf8(member, || format!("member of {name}"))?;
            out.push_str(&format!("{INDENT}{INDENT}<members>{}</members>\n", escape(member)));
        }
        out.push_str(&format!("{INDENT}{INDENT}<name>{}</name>\n", escape(name)));
        out.push_str(&format!("{INDENT}</types>\n"));
    }

    out.push_str(&format!("{INDENT}<version>{}</version>\n", escape(version)));
    out.push_str("</Package>\n");
    Ok(out)
}

fn utf8(text: &RawText, field: impl FnOnce() -> String) -> Result<&str, EncodingError> {
    text.to_str().ok_or_else(|| EncodingError::InvalidUtf8 {
        field: field(),
        value: text.to_string_lossy().into_owned(),
    })
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Parser error carrying the innermost description of what was expected
#[derive(Debug)]
struct XmlError<'a> {
    input: &'a str,
    expected: Option<&'static str>,
}

impl<'a> nom::error::ParseError<&'a str> for XmlError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        XmlError {
            input,
            expected: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for XmlError<'a> {
    fn add_context(_input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.expected.get_or_insert(ctx);
        other
    }
}

type Res<'a, T> = IResult<&'a str, T, XmlError<'a>>;

struct TypesBlock<'a> {
    start: &'a str,
    members: Vec<&'a str>,
    name: Option<&'a str>,
}

enum TypeField<'a> {
    Member(&'a str),
    Name(&'a str),
}

enum Child<'a> {
    Types(TypesBlock<'a>),
    Version(&'a str),
}

fn comment(input: &str) -> Res<'_, &str> {
    recognize(delimited(tag("<!--"), take_until("-->"), tag("-->"))).parse(input)
}

/// Whitespace and comments
fn misc(input: &str) -> Res<'_, ()> {
    value((), many0(alt((multispace1, comment)))).parse(input)
}

fn declaration(input: &str) -> Res<'_, &str> {
    recognize(delimited(tag("<?xml"), take_until("?>"), tag("?>"))).parse(input)
}

/// `<Package xmlns="...">`, returning the raw namespace value
fn package_open(input: &str) -> Res<'_, Option<&str>> {
    let (input, _) = tag("<Package").parse(input)?;
    let (input, namespace) = opt(preceded(
        multispace1,
        delimited(tag("xmlns=\""), take_until("\""), tag("\"")),
    ))
    .parse(input)?;
    let (input, _) = (multispace0, tag(">")).parse(input)?;
    Ok((input, namespace))
}

/// `<name>text</name>`, returning the raw (still escaped) text
fn element<'a>(name: &'static str, closing: &'static str, input: &'a str) -> Res<'a, &'a str> {
    let (input, _) = (tag("<"), tag(name), tag(">")).parse(input)?;
    let (input, raw) = take_while(|c: char| c != '<').parse(input)?;
    let (input, _) = cut(context(closing, tag(closing))).parse(input)?;
    Ok((input, raw))
}

fn members(input: &str) -> Res<'_, &str> {
    element("members", "</members>", input)
}

fn name(input: &str) -> Res<'_, &str> {
    element("name", "</name>", input)
}

fn version(input: &str) -> Res<'_, &str> {
    element("version", "</version>", input)
}

fn types_block(input: &str) -> Res<'_, TypesBlock<'_>> {
    let start = input;
    let (input, _) = tag("<types>").parse(input)?;
    let (input, fields) = many0(preceded(
        misc,
        alt((map(members, TypeField::Member), map(name, TypeField::Name))),
    ))
    .parse(input)?;
    let (input, _) = cut(context(
        "<members>, <name> or </types>",
        preceded(misc, tag("</types>")),
    ))
    .parse(input)?;

    let mut block = TypesBlock {
        start,
        members: Vec::new(),
        name: None,
    };
    for field in fields {
        match field {
            TypeField::Member(raw) => block.members.push(raw),
            TypeField::Name(raw) => block.name = Some(raw),
        }
    }
    Ok((input, block))
}

fn children(input: &str) -> Res<'_, Vec<Child<'_>>> {
    many0(preceded(
        misc,
        alt((map(types_block, Child::Types), map(version, Child::Version))),
    ))
    .parse(input)
}

/// Line and column (both 1-based) of `at` within `full`
fn position(full: &str, at: &str) -> (usize, usize) {
    let consumed = &full[..full.offset(at)];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        + 1;
    (line, column)
}

fn malformed(full: &str, err: nom::Err<XmlError<'_>>, fallback: &'static str) -> ParseError {
    let (at, expected) = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.expected.unwrap_or(fallback)),
        nom::Err::Incomplete(_) => (&full[full.len()..], fallback),
    };
    let (line, column) = position(full, at);
    ParseError::Malformed {
        line,
        column,
        expected: expected.to_string(),
    }
}

/// Decode entity and character references in `raw`
fn unescape<'a>(full: &str, raw: &'a str) -> Result<Cow<'a, str>, ParseError> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let entity = after
            .find(';')
            .map(|end| &after[..end])
            .filter(|e| !e.contains(char::is_whitespace));

        match entity.and_then(decode_entity) {
            Some(c) => {
                out.push(c);
                rest = &after[entity.map_or(0, str::len) + 1..];
            }
            None => {
                let (line, column) = position(full, &rest[amp..]);
                let entity = entity.unwrap_or_else(|| {
                    after
                        .split(|c: char| c.is_whitespace() || c == ';')
                        .next()
                        .unwrap_or_default()
                });
                return Err(ParseError::UnknownEntity {
                    entity: entity.to_string(),
                    line,
                    column,
                });
            }
        }
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

pub(super) fn read(full: &str) -> Result<Manifest, ParseError> {
    let rest = full.trim_start_matches('\u{feff}');
    let (rest, _) = opt(declaration)
        .parse(rest)
        .map_err(|e| malformed(full, e, "XML declaration"))?;
    let (rest, _) = misc(rest).map_err(|e| malformed(full, e, "<Package>"))?;
    let (rest, namespace) = context("<Package> root element", package_open)
        .parse(rest)
        .map_err(|e| malformed(full, e, "<Package> root element"))?;
    let (rest, children) =
        children(rest).map_err(|e| malformed(full, e, "<types> or <version>"))?;
    let closing = rest;
    let (rest, _) = context(
        "<types>, <version> or </Package>",
        preceded(misc, tag("</Package>")),
    )
    .parse(rest)
    .map_err(|e| malformed(full, e, "</Package>"))?;
    let (rest, _) = misc(rest).map_err(|e| malformed(full, e, "end of document"))?;
    if !rest.is_empty() {
        let (line, column) = position(full, rest);
        return Err(ParseError::Malformed {
            line,
            column,
            expected: "end of document".to_string(),
        });
    }

    let namespace = match namespace {
        Some(raw) => unescape(full, raw)?.into_owned(),
        None => String::new(),
    };

    let mut version_text = None;
    let mut blocks = Vec::new();
    for child in children {
        match child {
            Child::Version(raw) => version_text = Some(raw),
            Child::Types(block) => blocks.push(block),
        }
    }

    let Some(version_raw) = version_text else {
        let (line, column) = position(full, closing);
        return Err(ParseError::MissingElement {
            element: "version".to_string(),
            line,
            column,
        });
    };

    let mut manifest = Manifest::with_namespace(namespace, unescape(full, version_raw)?.into_owned());
    for block in blocks {
        let Some(name_raw) = block.name else {
            let (line, column) = position(full, block.start);
            return Err(ParseError::MissingElement {
                element: "name".to_string(),
                line,
                column,
            });
        };
        let type_name = unescape(full, name_raw)?;
        for member in block.members {
            manifest.add_member(&*type_name, &*unescape(full, member)?);
        }
    }

    Ok(manifest)
}
