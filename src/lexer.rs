//! Tokenizer for the intermediate glyph-stream format.
//!
//! The intermediate format is XML-like but not XML: tags may carry bare
//! (unquoted) attribute values, close tags arrive as their own events with
//! a `/`-prefixed name, and the character run following a tag (up to the
//! next `<`) belongs to that tag; inline image data travels there.
//!
//! # Grammar overview
//!
//! - Tags: `<name attr=value attr="value" attr='value' ...>`
//! - Close tags: `</name>` (reported with the name `/name`)
//! - A trailing `/` or `?` before `>` is accepted and ignored, so
//!   `<char .../>` and `<?xml ...?>` tokenize like ordinary tags
//! - Text between a `>` and the next `<` is attached to the preceding tag
//!
//! The tokenizer makes no grammar decisions; the parser layers the
//! page/span/char structure on top of the tag stream.

use indexmap::IndexMap;
use nom::{
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::char,
    combinator::opt,
    sequence::preceded,
    IResult,
};

use crate::error::{Error, Result};
use crate::geometry::Matrix;

/// One tag event with its attributes and trailing text.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Tag name; close tags keep their leading slash (e.g. `/span`).
    pub name: String,
    /// Attributes in document order.
    pub attributes: IndexMap<String, String>,
    /// Raw character run following the tag, up to the next `<`.
    pub text: String,
}

impl Tag {
    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Look up a required attribute, failing with a structured error.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.attribute(name).ok_or_else(|| Error::MissingAttribute {
            tag: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// A required attribute coerced to `i32`.
    pub fn int_attribute(&self, name: &str) -> Result<i32> {
        let value = self.require(name)?;
        value.parse().map_err(|_| self.bad_attribute(name, value))
    }

    /// A required attribute coerced to `u32`.
    pub fn uint_attribute(&self, name: &str) -> Result<u32> {
        let value = self.require(name)?;
        value.parse().map_err(|_| self.bad_attribute(name, value))
    }

    /// A required attribute coerced to `usize`.
    pub fn size_attribute(&self, name: &str) -> Result<usize> {
        let value = self.require(name)?;
        value.parse().map_err(|_| self.bad_attribute(name, value))
    }

    /// A required attribute coerced to `f32`.
    pub fn float_attribute(&self, name: &str) -> Result<f32> {
        let value = self.require(name)?;
        value.parse().map_err(|_| self.bad_attribute(name, value))
    }

    /// A required attribute holding six whitespace-separated floats,
    /// coerced to a [`Matrix`].
    pub fn matrix_attribute(&self, name: &str) -> Result<Matrix> {
        let value = self.require(name)?;
        let mut parts = value.split_whitespace();
        let mut components = [0.0f32; 6];
        for slot in components.iter_mut() {
            *slot = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| self.bad_attribute(name, value))?;
        }
        if parts.next().is_some() {
            return Err(self.bad_attribute(name, value));
        }
        let [a, b, c, d, e, f] = components;
        Ok(Matrix::new(a, b, c, d, e, f))
    }

    fn bad_attribute(&self, name: &str, value: &str) -> Error {
        Error::InvalidAttribute {
            tag: self.name.clone(),
            attribute: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Pull-based tokenizer over intermediate-format text.
pub struct Lexer<'a> {
    input: &'a str,
    remaining: &'a str,
}

impl<'a> Lexer<'a> {
    /// Create a tokenizer over the full input text.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            remaining: input,
        }
    }

    /// Read the next tag, or `None` at end of input.
    ///
    /// Whitespace between tags is skipped; any other stray text outside a
    /// tag is attached to the previous tag and never seen here.
    pub fn next_tag(&mut self) -> Result<Option<Tag>> {
        let trimmed = self.remaining.trim_start();
        if trimmed.is_empty() {
            self.remaining = trimmed;
            return Ok(None);
        }
        match parse_tag(trimmed) {
            Ok((rest, tag)) => {
                self.remaining = rest;
                Ok(Some(tag))
            }
            Err(_) => Err(Error::MalformedTag {
                offset: self.input.len() - trimmed.len(),
                reason: "expected '<name attr=value ...>'".to_string(),
            }),
        }
    }
}

/// Characters permitted in tag names. A leading `?` (processing
/// instruction) and `/` (close tag) are folded into the name.
fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && c != '<' && c != '>' && c != '=' && c != '"' && c != '\''
}

/// Parse one `<...>` tag plus its trailing text.
fn parse_tag(input: &str) -> IResult<&str, Tag> {
    let (input, _) = char('<')(input)?;
    let (input, slash) = opt(char('/'))(input)?;
    let (input, name) = take_while1(is_name_char)(input)?;
    let (input, attributes) = parse_attributes(input)?;
    let (input, _) = take_while(|c: char| c.is_whitespace() || c == '/' || c == '?')(input)?;
    let (input, _) = char('>')(input)?;
    let (input, text) = take_till(|c| c == '<')(input)?;

    let mut full_name = String::new();
    if slash.is_some() {
        full_name.push('/');
    }
    full_name.push_str(name);

    Ok((
        input,
        Tag {
            name: full_name,
            attributes,
            text: text.to_string(),
        },
    ))
}

/// Parse zero or more `name=value` attributes.
fn parse_attributes(mut input: &str) -> IResult<&str, IndexMap<String, String>> {
    let mut attributes = IndexMap::new();
    loop {
        let (rest, _) = take_while(|c: char| c.is_whitespace())(input)?;
        match parse_attribute(rest) {
            Ok((rest, (name, value))) => {
                attributes.insert(name.to_string(), value);
                input = rest;
            }
            Err(_) => return Ok((rest, attributes)),
        }
    }
}

/// Parse a single `name=value` attribute.
///
/// Attribute names stop before the tag-closing punctuation so that a
/// trailing `/>` or `?>` is never mistaken for a name.
fn parse_attribute(input: &str) -> IResult<&str, (&str, String)> {
    let (input, name) =
        take_while1(|c: char| is_name_char(c) && c != '/' && c != '?')(input)?;
    let (input, value) = preceded(char('='), parse_value)(input)?;
    Ok((input, (name, value)))
}

/// Parse an attribute value: double-quoted, single-quoted, or bare.
fn parse_value(input: &str) -> IResult<&str, String> {
    if let Ok((rest, value)) = quoted_value('"')(input) {
        return Ok((rest, value.to_string()));
    }
    if let Ok((rest, value)) = quoted_value('\'')(input) {
        return Ok((rest, value.to_string()));
    }
    let (rest, value) =
        take_till(|c: char| c.is_whitespace() || c == '>' || c == '/' || c == '?')(input)?;
    Ok((rest, value.to_string()))
}

fn quoted_value(quote: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input| {
        let (input, _) = char(quote)(input)?;
        let (input, value) = take_till(|c| c == quote)(input)?;
        let (input, _) = char(quote)(input)?;
        Ok((input, value))
    }
}
