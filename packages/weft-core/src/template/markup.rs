//! Markup parser for template sources.
//!
//! Produces a plain node tree; nothing here touches the DOM. XML mode is
//! strict (quoted attributes, matched end tags). HTML mode folds names to
//! lowercase, knows void elements and closes open elements leniently.

use super::Mode;
use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MarkupNode {
    Element {
        tag: String,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
    Comment(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

struct Open {
    tag: String,
    namespace: Option<String>,
    prefixes: Vec<(String, String)>,
    attributes: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

impl Open {
    fn finish(self) -> MarkupNode {
        MarkupNode::Element {
            tag: self.tag,
            namespace: self.namespace,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    mode: Mode,
    stack: Vec<Open>,
    roots: Vec<MarkupNode>,
}

pub(crate) fn parse(src: &str, mode: Mode) -> Result<Vec<MarkupNode>, TemplateError> {
    let mut parser = Parser {
        src,
        pos: 0,
        mode,
        stack: Vec::new(),
        roots: Vec::new(),
    };
    parser.run()?;
    Ok(parser.roots)
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.')
}

fn is_attribute_name_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '=' | '>' | '/' | '"' | '\'' | '<')
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Markup {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn fold(&self, name: &str) -> String {
        match self.mode {
            Mode::Html => name.to_ascii_lowercase(),
            Mode::Xml => name.to_string(),
        }
    }

    fn push_node(&mut self, node: MarkupNode) {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_declaration()?;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_alphabetic()) {
                self.open_tag()?;
            } else {
                self.text()?;
            }
        }
        match self.mode {
            Mode::Xml => {
                if let Some(open) = self.stack.last() {
                    return Err(self.error(format!("unclosed <{}>", open.tag)));
                }
            }
            Mode::Html => {
                while let Some(open) = self.stack.pop() {
                    self.push_node(open.finish());
                }
            }
        }
        Ok(())
    }

    fn text(&mut self) -> Result<(), TemplateError> {
        let start = self.pos;
        // A '<' that opens nothing is literal text in HTML, an error in XML.
        if self.peek() == Some('<') {
            if self.mode == Mode::Xml {
                return Err(self.error("unescaped '<'"));
            }
            self.bump();
        }
        while let Some(ch) = self.peek() {
            if ch == '<' {
                break;
            }
            self.bump();
        }
        let raw = &self.src[start..self.pos];
        self.push_node(MarkupNode::Text(decode_entities(raw)));
        Ok(())
    }

    fn comment(&mut self) -> Result<(), TemplateError> {
        self.pos += "<!--".len();
        let Some(end) = self.rest().find("-->") else {
            return Err(self.error("unterminated comment"));
        };
        let text = self.rest()[..end].to_string();
        self.pos += end + "-->".len();
        self.push_node(MarkupNode::Comment(text));
        Ok(())
    }

    fn skip_declaration(&mut self) -> Result<(), TemplateError> {
        match self.rest().find('>') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(self.error("unterminated declaration")),
        }
    }

    fn close_tag(&mut self) -> Result<(), TemplateError> {
        self.pos += "</".len();
        let raw = self.take_while(is_name_char);
        let name = self.fold(raw);
        self.skip_whitespace();
        if self.bump() != Some('>') {
            return Err(self.error(format!("malformed end tag </{}", name)));
        }
        match self.mode {
            Mode::Xml => match self.stack.pop() {
                Some(open) if open.tag == name => {
                    self.push_node(open.finish());
                    Ok(())
                }
                Some(open) => Err(self.error(format!(
                    "expected </{}>, found </{}>",
                    open.tag, name
                ))),
                None => Err(self.error(format!("stray </{}>", name))),
            },
            Mode::Html => {
                if let Some(depth) = self.stack.iter().rposition(|open| open.tag == name) {
                    while self.stack.len() > depth {
                        if let Some(open) = self.stack.pop() {
                            self.push_node(open.finish());
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn open_tag(&mut self) -> Result<(), TemplateError> {
        self.pos += 1;
        let raw = self.take_while(is_name_char);
        let tag = self.fold(raw);
        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(format!("unterminated <{}>", tag))),
                Some('>') => {
                    self.bump();
                    break false;
                }
                Some('/') => {
                    self.bump();
                    if self.bump() != Some('>') {
                        return Err(self.error("expected '>' after '/'"));
                    }
                    break true;
                }
                Some(_) => attributes.push(self.attribute()?),
            }
        };

        let prefixes: Vec<(String, String)> = attributes
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("xmlns:")
                    .map(|prefix| (prefix.to_string(), value.clone()))
            })
            .collect();
        let namespace = self.resolve_namespace(&tag, &attributes, &prefixes);
        let open = Open {
            tag,
            namespace,
            prefixes,
            attributes,
            children: Vec::new(),
        };

        let void = self.mode == Mode::Html && VOID_ELEMENTS.contains(&open.tag.as_str());
        if self_closing || void {
            self.push_node(open.finish());
        } else {
            self.stack.push(open);
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<(String, String), TemplateError> {
        let raw = self.take_while(is_attribute_name_char);
        let name = self.fold(raw);
        if name.is_empty() {
            return Err(self.error("expected attribute name"));
        }
        self.skip_whitespace();
        if self.peek() != Some('=') {
            return match self.mode {
                Mode::Html => Ok((name, String::new())),
                Mode::Xml => Err(self.error(format!("attribute `{}` has no value", name))),
            };
        }
        self.bump();
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let Some(end) = self.rest().find(quote) else {
                    return Err(self.error("unterminated attribute value"));
                };
                let raw = &self.rest()[..end];
                self.pos += end + 1;
                raw
            }
            Some(_) if self.mode == Mode::Html => {
                self.take_while(|c| !c.is_whitespace() && c != '>')
            }
            _ => return Err(self.error(format!("attribute `{}` needs a quoted value", name))),
        };
        Ok((name, decode_entities(value)))
    }

    fn resolve_namespace(
        &self,
        tag: &str,
        attributes: &[(String, String)],
        own_prefixes: &[(String, String)],
    ) -> Option<String> {
        if let Some((prefix, _)) = tag.split_once(':') {
            let declared = own_prefixes
                .iter()
                .chain(self.stack.iter().rev().flat_map(|open| open.prefixes.iter()))
                .find(|(name, _)| name == prefix);
            if let Some((_, uri)) = declared {
                return Some(uri.clone());
            }
        }
        attributes
            .iter()
            .find(|(name, _)| name == "xmlns")
            .map(|(_, uri)| uri.clone())
            .or_else(|| self.stack.last().and_then(|open| open.namespace.clone()))
    }
}

/// Decodes the predefined entities and numeric character references.
/// Unknown references are kept verbatim.
pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..].find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &rest[1..=end];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((ch, end + 2))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
