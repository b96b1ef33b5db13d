//! Signature model, queries and composition.

use std::fmt::{self, Display};
use std::ops::Add;
use std::str::FromStr;

use crate::error::{SignError, SignResult};
use crate::parser;

/// What a signature (or one of its elements) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignKind {
    Empty,
    Module,
    Class,
    Method,
    TypeParam,
}

/// One step of a qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignElement {
    pub name: String,
    pub kind: SignKind,
    /// Generic parameter names; classes and methods only.
    pub type_params: Vec<String>,
    /// Parameter list; methods only.
    pub params: Vec<SignParam>,
}

impl SignElement {
    pub fn new(name: impl Into<String>, kind: SignKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_params: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl fmt::Display for SignElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignKind::Empty => Ok(()),
            SignKind::Module => f.write_str(&self.name),
            SignKind::TypeParam => write!(f, "<{}>", self.name),
            SignKind::Class => {
                f.write_str(&self.name)?;
                write_generics(f, &self.type_params)
            }
            SignKind::Method => {
                f.write_str(&self.name)?;
                write_generics(f, &self.type_params)?;
                write_params(f, &self.params)
            }
        }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignParam {
    /// A module-qualified class reference, e.g. `a::b.C<T>`.
    Class(Sign),
    /// A reference to a generic parameter, written `<T>`.
    TypeParam(String),
    /// A function-typed parameter, e.g. `f(x, <T>)`.
    Callback { name: Sign, params: Vec<SignParam> },
}

impl fmt::Display for SignParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignParam::Class(sign) => sign.fmt(f),
            SignParam::TypeParam(name) => write!(f, "<{}>", name),
            SignParam::Callback { name, params } => {
                name.fmt(f)?;
                write_params(f, params)
            }
        }
    }
}

fn write_generics(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    if names.is_empty() {
        return Ok(());
    }
    write!(f, "<{}>", names.join(", "))
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[SignParam]) -> fmt::Result {
    f.write_str("(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        param.fmt(f)?;
    }
    f.write_str(")")
}

/// A parsed qualified name such as `std::io.File.open(path)`.
///
/// Signatures are immutable. Composition builds the combined text and
/// parses it again, so every `Sign` in existence satisfies the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Sign {
    elements: Vec<SignElement>,
}

impl Sign {
    pub fn parse(text: &str) -> SignResult<Sign> {
        parser::parse(text)
    }

    /// The signature of empty text.
    pub fn empty() -> Self {
        Self {
            elements: vec![SignElement::new("", SignKind::Empty)],
        }
    }

    pub(crate) fn from_elements(elements: Vec<SignElement>) -> Self {
        if elements.is_empty() {
            Self::empty()
        } else {
            Self { elements }
        }
    }

    pub fn elements(&self) -> &[SignElement] {
        &self.elements
    }

    fn last(&self) -> Option<&SignElement> {
        self.elements.last()
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == SignKind::Empty
    }

    /// Kind of the final element.
    pub fn kind(&self) -> SignKind {
        self.last().map_or(SignKind::Empty, |e| e.kind)
    }

    /// The final element as it prints, e.g. `m<T>(x)` for `a.C.m<T>(x)`.
    pub fn name(&self) -> String {
        self.last().map_or_else(String::new, |e| e.to_string())
    }

    /// Generic parameters of the final element.
    pub fn type_params(&self) -> &[String] {
        match self.last() {
            Some(e) => &e.type_params,
            None => &[],
        }
    }

    /// Parameters of the final element when it is a method.
    pub fn params(&self) -> &[SignParam] {
        match self.last() {
            Some(e) if e.kind == SignKind::Method => &e.params,
            _ => &[],
        }
    }

    /// The module this signature lives in.
    ///
    /// For a pure module path this is the path minus its last module.
    /// Otherwise it is the leading run of module elements.
    pub fn parent_module(&self) -> Sign {
        let end = if self.kind() == SignKind::Module {
            self.elements.len() - 1
        } else {
            self.elements
                .iter()
                .take_while(|e| e.kind == SignKind::Module)
                .count()
        };
        Self::from_elements(self.elements[..end].to_vec())
    }

    /// The enclosing class, or the empty signature if the element before
    /// the last is not a class.
    pub fn parent_class(&self) -> Sign {
        match self.elements.len().checked_sub(2) {
            Some(i) if self.elements[i].kind == SignKind::Class => {
                Self::from_elements(self.elements[..=i].to_vec())
            }
            _ => Self::empty(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Composition
    // ═══════════════════════════════════════════════════════════════════════

    /// Append raw signature text, e.g. `".C"` or `"::m"`.
    pub fn append(&self, text: &str) -> SignResult<Sign> {
        parser::parse(&format!("{}{}", self, text))
    }

    pub fn append_module(&self, name: &str) -> SignResult<Sign> {
        if self.is_empty() {
            parser::parse(name)
        } else {
            self.append(&format!("::{}", name))
        }
    }

    pub fn append_class(&self, name: &str, type_params: &[&str]) -> SignResult<Sign> {
        let mut text = format!(".{}", name);
        if !type_params.is_empty() {
            text.push_str(&format!("<{}>", type_params.join(", ")));
        }
        self.append(&text)
    }

    pub fn append_method(
        &self,
        name: &str,
        type_params: &[&str],
        params: &[SignParam],
    ) -> SignResult<Sign> {
        let method = SignElement {
            name: name.to_string(),
            kind: SignKind::Method,
            type_params: type_params.iter().map(|s| s.to_string()).collect(),
            params: params.to_vec(),
        };
        let sign = self.append(&format!(".{}", method))?;
        // An empty or method-shaped parameter prints as something else.
        if sign.params() != params {
            let prefix = self.to_string();
            let column = prefix.chars().count() + 1;
            let text = format!("{}.{}", prefix, method);
            return Err(SignError::new(text, column, "parameter does not print as itself"));
        }
        Ok(sign)
    }

    /// Qualify `other` with this signature: `a` joined with `b.C` is `a::b.C`.
    pub fn join(&self, other: &Sign) -> SignResult<Sign> {
        let named_module = other
            .elements
            .first()
            .is_some_and(|e| e.kind == SignKind::Module && !e.name.is_empty());
        if named_module && !self.is_empty() {
            self.append(&format!("::{}", other))
        } else {
            self.append(&other.to_string())
        }
    }
}

impl Default for Sign {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                match element.kind {
                    SignKind::Module => f.write_str("::")?,
                    SignKind::Class | SignKind::Method => f.write_str(".")?,
                    SignKind::Empty | SignKind::TypeParam => {}
                }
            }
            element.fmt(f)?;
        }
        Ok(())
    }
}

impl FromStr for Sign {
    type Err = SignError;

    fn from_str(s: &str) -> SignResult<Sign> {
        parser::parse(s)
    }
}

impl TryFrom<String> for Sign {
    type Error = SignError;

    fn try_from(text: String) -> SignResult<Sign> {
        parser::parse(&text)
    }
}

impl From<Sign> for String {
    fn from(sign: Sign) -> String {
        sign.to_string()
    }
}

impl Add<&str> for &Sign {
    type Output = SignResult<Sign>;

    fn add(self, rhs: &str) -> SignResult<Sign> {
        self.append(rhs)
    }
}
