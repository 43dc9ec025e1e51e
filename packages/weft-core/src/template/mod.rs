//! Tagged string templates.
//!
//! `xml!("<p class=\"{}\">{}</p>", class, body)` captures the literal and the
//! interpolated values; [`Renderer::render`](crate::Renderer::render) turns it
//! into live DOM. Holes are `{}`; write `{{` and `}}` for literal braces.

pub(crate) mod compile;
pub(crate) mod hookup;
pub(crate) mod markup;

use crate::content::Interp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Namespace-aware, strict parsing. Used for application templates.
    Xml,
    /// Lenient parsing: case-folded names, void elements, implied end tags.
    Html,
}

pub struct Template {
    pub(crate) source: &'static str,
    pub(crate) values: Vec<Interp>,
    pub(crate) mode: Mode,
}

impl Template {
    pub fn new(mode: Mode, source: &'static str, values: Vec<Interp>) -> Self {
        Self {
            source,
            values,
            mode,
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds an XML-mode [`Template`].
#[macro_export]
macro_rules! xml {
    ($source:literal $(, $value:expr)* $(,)?) => {
        $crate::template::Template::new(
            $crate::template::Mode::Xml,
            $source,
            vec![$($crate::content::Interp::from($value)),*],
        )
    };
}

/// Builds an HTML-mode [`Template`].
#[macro_export]
macro_rules! html {
    ($source:literal $(, $value:expr)* $(,)?) => {
        $crate::template::Template::new(
            $crate::template::Mode::Html,
            $source,
            vec![$($crate::content::Interp::from($value)),*],
        )
    };
}
