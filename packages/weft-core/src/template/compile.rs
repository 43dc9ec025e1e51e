//! Turns a template literal into a reusable node tree with numbered holes.
//!
//! Holes in content and attribute positions are swapped for private-use
//! markers before parsing, so the markup parser never sees a value. Holes in
//! tag position are resolved to component names up front, which is why the
//! compiled tree is only reusable while those values stay the same.

use super::Mode;
use super::markup::{self, MarkupNode};
use crate::component::ComponentTag;
use crate::content::Interp;
use crate::error::TemplateError;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const MARK_OPEN: char = '\u{E000}';
const MARK_CLOSE: char = '\u{E001}';

/// Tag of the element standing in for a pending component.
pub(crate) const LOADING_TAG: &str = "weft-loading";
/// Records which value a loading element waits for.
pub(crate) const PENDING_ATTR: &str = "data-weft-pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TagValue {
    Component(ComponentTag),
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttrPart {
    Literal(String),
    Marker(usize),
}

/// An attribute that needs a namespace handler at render time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttrSite {
    pub(crate) name: String,
    pub(crate) parts: Vec<AttrPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplateNode {
    Element {
        tag: String,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
        sites: Vec<AttrSite>,
        children: Vec<TemplateNode>,
    },
    Text(String),
    Comment(String),
    Hole(usize),
}

#[derive(Debug)]
pub(crate) struct CompiledTemplate {
    pub(crate) nodes: Vec<TemplateNode>,
    pub(crate) tag_values: BTreeMap<usize, TagValue>,
    pub(crate) tag_positions: Vec<usize>,
    pub(crate) arity: usize,
}

impl CompiledTemplate {
    /// Whether this compilation still fits `values`.
    pub(crate) fn matches(&self, values: &[Interp]) -> bool {
        values.len() == self.arity
            && tag_values(&self.tag_positions, values)
                .map(|tags| tags == self.tag_values)
                .unwrap_or(false)
    }
}

/// Literal segments around each `{}`, with `{{` and `}}` unescaped.
pub(crate) fn split_source(source: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        let next = chars.peek().copied();
        match (ch, next) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                current.push(ch);
            }
            ('{', Some('}')) => {
                chars.next();
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
}

/// Holes whose preceding literal opens a start or end tag.
pub(crate) fn tag_positions(segments: &[String]) -> Vec<usize> {
    segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .enumerate()
        .filter(|(_, segment)| segment.ends_with('<') || segment.ends_with("</"))
        .map(|(index, _)| index)
        .collect()
}

pub(crate) fn tag_values(
    positions: &[usize],
    values: &[Interp],
) -> Result<BTreeMap<usize, TagValue>, TemplateError> {
    positions
        .iter()
        .map(|&index| match values.get(index) {
            Some(Interp::Component(tag)) => Ok((index, TagValue::Component(tag.clone()))),
            Some(Interp::Pending(_)) => Ok((index, TagValue::Pending)),
            _ => Err(TemplateError::NotAComponent(index)),
        })
        .collect()
}

pub(crate) fn compile(
    segments: &[String],
    tags: BTreeMap<usize, TagValue>,
    mode: Mode,
) -> Result<CompiledTemplate, TemplateError> {
    let arity = segments.len().saturating_sub(1);
    let mut source = String::new();
    for (index, segment) in segments.iter().enumerate() {
        source.push_str(segment);
        if index == arity {
            break;
        }
        match tags.get(&index) {
            Some(TagValue::Component(tag)) => source.push_str(tag.name()),
            Some(TagValue::Pending) => {
                source.push_str(LOADING_TAG);
                if !segment.ends_with("</") {
                    let _ = write!(source, " {PENDING_ATTR}=\"{index}\"");
                }
            }
            None => {
                let _ = write!(source, "{MARK_OPEN}{index}{MARK_CLOSE}");
            }
        }
    }

    let parsed = markup::parse(&source, mode)?;
    let mut nodes = Vec::with_capacity(parsed.len());
    for node in parsed {
        convert(node, &mut nodes)?;
    }
    tracing::debug!(arity, nodes = nodes.len(), "template compiled");
    Ok(CompiledTemplate {
        nodes,
        tag_positions: tags.keys().copied().collect(),
        tag_values: tags,
        arity,
    })
}

fn convert(node: MarkupNode, out: &mut Vec<TemplateNode>) -> Result<(), TemplateError> {
    match node {
        MarkupNode::Text(text) => {
            for part in split_markers(&text) {
                out.push(match part {
                    AttrPart::Literal(text) => TemplateNode::Text(text),
                    AttrPart::Marker(index) => TemplateNode::Hole(index),
                });
            }
        }
        MarkupNode::Comment(text) => out.push(TemplateNode::Comment(text)),
        MarkupNode::Element {
            tag,
            namespace,
            attributes,
            children,
        } => {
            let mut plain = Vec::new();
            let mut sites = Vec::new();
            for (name, value) in attributes {
                if name.contains(MARK_OPEN) {
                    return Err(TemplateError::MarkerInAttributeName(strip_markers(&name)));
                }
                if value.contains(MARK_OPEN) || is_prefixed(&name) {
                    sites.push(AttrSite {
                        name,
                        parts: split_markers(&value),
                    });
                } else {
                    plain.push((name, value));
                }
            }
            let mut converted = Vec::with_capacity(children.len());
            for child in children {
                convert(child, &mut converted)?;
            }
            out.push(TemplateNode::Element {
                tag,
                namespace,
                attributes: plain,
                sites,
                children: converted,
            });
        }
    }
    Ok(())
}

fn is_prefixed(name: &str) -> bool {
    name.contains(':') && name != "xmlns" && !name.starts_with("xmlns:")
}

fn split_markers(text: &str) -> Vec<AttrPart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    while let Some(open) = rest.find(MARK_OPEN) {
        literal.push_str(&rest[..open]);
        let after = &rest[open + MARK_OPEN.len_utf8()..];
        let Some(close) = after.find(MARK_CLOSE) else {
            literal.push_str(&rest[open..]);
            rest = "";
            break;
        };
        match after[..close].parse() {
            Ok(index) => {
                if !literal.is_empty() {
                    parts.push(AttrPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(AttrPart::Marker(index));
            }
            Err(_) => {
                let end = open + MARK_OPEN.len_utf8() + close + MARK_CLOSE.len_utf8();
                literal.push_str(&rest[open..end]);
            }
        }
        rest = &after[close + MARK_CLOSE.len_utf8()..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(AttrPart::Literal(literal));
    }
    parts
}

fn strip_markers(name: &str) -> String {
    split_markers(name)
        .into_iter()
        .map(|part| match part {
            AttrPart::Literal(text) => text,
            AttrPart::Marker(_) => "{}".to_string(),
        })
        .collect()
}
