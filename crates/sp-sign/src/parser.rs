//! Recursive-descent parser for signature text.
//!
//! ```text
//! signature := type_param_ref | module_chain ('.' segment)*
//! module_chain := ident? ('::' ident)*
//! segment := ident generics? param_list?      // Method if param_list present
//! generics := '<' ident (',' ident)* '>'
//! param_list := '(' (param (',' param)*)? ')'
//! param := type_param_ref | module_chain ('.' ident generics?)* param_list?
//! type_param_ref := '<' ident '>'
//! ```
//!
//! Each segment decides between class and method by looking for `(` after
//! its generics, so the parser never rewinds. Whitespace may appear between
//! tokens but not inside an identifier.

use crate::error::{SignError, SignResult};
use crate::sign::{Sign, SignElement, SignKind, SignParam};

/// Non-alphanumeric characters allowed in identifiers.
const IDENT_SYMBOLS: &[char] = &['$', '#', '!', '@', '%', '&', '_'];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || IDENT_SYMBOLS.contains(&c)
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || IDENT_SYMBOLS.contains(&c)
}

/// Parse `text` into a signature.
pub fn parse(text: &str) -> SignResult<Sign> {
    let mut parser = Parser::new(text);
    if parser.peek().is_none() {
        return Ok(Sign::empty());
    }
    let sign = parser.parse_sign()?;
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected {:?}", c)));
    }
    Ok(sign)
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cursor
    // ═══════════════════════════════════════════════════════════════════════

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    /// Next significant character; `None` at end of input.
    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.raw_peek()
    }

    /// Character at the cursor without skipping whitespace.
    fn raw_peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_is(&mut self, c: char) -> bool {
        self.peek() == Some(c)
    }

    fn peek_is_ident_start(&mut self) -> bool {
        self.peek().is_some_and(is_ident_start)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek_is(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> SignResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn error(&self, message: impl Into<String>) -> SignError {
        SignError::new(self.text, self.pos, message)
    }

    fn identifier(&mut self) -> SignResult<String> {
        if !self.peek_is_ident_start() {
            return Err(self.error("expected identifier"));
        }
        let start = self.pos;
        self.pos += 1;
        while self.raw_peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Grammar
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_sign(&mut self) -> SignResult<Sign> {
        if self.peek_is('<') {
            let name = self.type_param_ref()?;
            return Ok(Sign::from_elements(vec![SignElement::new(name, SignKind::TypeParam)]));
        }

        let mut elements = self.module_chain()?;
        while self.eat('.') {
            elements.push(self.segment()?);
        }
        self.require_name(&elements)?;
        Ok(Sign::from_elements(elements))
    }

    /// `ident? ('::' ident)*`, always yielding at least the (possibly
    /// unnamed) first module.
    fn module_chain(&mut self) -> SignResult<Vec<SignElement>> {
        let first = if self.peek_is_ident_start() {
            self.identifier()?
        } else {
            String::new()
        };
        let mut elements = vec![SignElement::new(first, SignKind::Module)];
        while self.eat(':') {
            if self.raw_peek() != Some(':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            elements.push(SignElement::new(self.identifier()?, SignKind::Module));
        }
        Ok(elements)
    }

    /// Reject a lone unnamed module: the text held no name at all.
    fn require_name(&self, elements: &[SignElement]) -> SignResult<()> {
        match elements {
            [only] if only.name.is_empty() => Err(self.error("expected identifier")),
            _ => Ok(()),
        }
    }

    fn segment(&mut self) -> SignResult<SignElement> {
        let name = self.identifier()?;
        let type_params = self.generics()?;
        if self.peek_is('(') {
            let params = self.param_list()?;
            Ok(SignElement {
                name,
                kind: SignKind::Method,
                type_params,
                params,
            })
        } else {
            Ok(SignElement {
                name,
                kind: SignKind::Class,
                type_params,
                params: Vec::new(),
            })
        }
    }

    fn generics(&mut self) -> SignResult<Vec<String>> {
        let mut names = Vec::new();
        if self.eat('<') {
            names.push(self.identifier()?);
            while self.eat(',') {
                names.push(self.identifier()?);
            }
            self.expect('>')?;
        }
        Ok(names)
    }

    fn type_param_ref(&mut self) -> SignResult<String> {
        self.expect('<')?;
        let name = self.identifier()?;
        self.expect('>')?;
        Ok(name)
    }

    fn param_list(&mut self) -> SignResult<Vec<SignParam>> {
        self.expect('(')?;
        let mut params = Vec::new();
        if self.eat(')') {
            return Ok(params);
        }
        params.push(self.param()?);
        while self.eat(',') {
            params.push(self.param()?);
        }
        self.expect(')')?;
        Ok(params)
    }

    fn param(&mut self) -> SignResult<SignParam> {
        if self.peek_is('<') {
            return Ok(SignParam::TypeParam(self.type_param_ref()?));
        }

        let mut elements = self.module_chain()?;
        while self.eat('.') {
            let name = self.identifier()?;
            let type_params = self.generics()?;
            elements.push(SignElement {
                name,
                kind: SignKind::Class,
                type_params,
                params: Vec::new(),
            });
        }
        self.require_name(&elements)?;
        let name = Sign::from_elements(elements);

        if self.peek_is('(') {
            let params = self.param_list()?;
            Ok(SignParam::Callback { name, params })
        } else {
            Ok(SignParam::Class(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(sign: &Sign) -> Vec<SignKind> {
        sign.elements().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_module_chain() {
        let sign = parse("a::b::c").unwrap();
        assert_eq!(kinds(&sign), vec![SignKind::Module; 3]);
        assert_eq!(sign.elements()[2].name, "c");
    }

    #[test]
    fn test_segment_kind_is_decided_locally() {
        let sign = parse("a.B<T, U>.m<V>(x).C").unwrap();
        assert_eq!(
            kinds(&sign),
            vec![SignKind::Module, SignKind::Class, SignKind::Method, SignKind::Class]
        );
        assert_eq!(sign.elements()[1].type_params, vec!["T", "U"]);
        assert_eq!(sign.elements()[2].type_params, vec!["V"]);
    }

    #[test]
    fn test_unnamed_module() {
        let sign = parse(".Main.run()").unwrap();
        assert_eq!(sign.elements()[0], SignElement::new("", SignKind::Module));
        assert_eq!(sign.kind(), SignKind::Method);
    }

    #[test]
    fn test_params() {
        let sign = parse("x.m(a::b.C<T>, <T>, f(x, <U>), g())").unwrap();
        let params = sign.params();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], SignParam::Class(parse("a::b.C<T>").unwrap()));
        assert_eq!(params[1], SignParam::TypeParam("T".to_string()));
        match &params[2] {
            SignParam::Callback { name, params } => {
                assert_eq!(name.to_string(), "f");
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected callback, got {:?}", other),
        }
        assert!(matches!(&params[3], SignParam::Callback { params, .. } if params.is_empty()));
    }

    #[test]
    fn test_whitespace_between_tokens() {
        let spaced = parse("  a :: b . C < T , U > . m ( x , y )  ").unwrap();
        assert_eq!(spaced, parse("a::b.C<T,U>.m(x,y)").unwrap());
    }

    #[test]
    fn test_whitespace_splits_identifiers() {
        let err = parse("ab cd").unwrap_err();
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_identifier_rules() {
        assert!(parse("$foo").is_ok());
        assert!(parse("#a!b@c%d&e_f1").is_ok());
        assert!(parse("_").is_ok());

        let err = parse("3abc").unwrap_err();
        assert_eq!(err.column, 0);
        assert_eq!(err.message, "expected identifier");
        assert_eq!(err.text, "3abc");

        assert_eq!(parse("a.9").unwrap_err().column, 2);
    }

    #[test]
    fn test_unterminated_lists() {
        let err = parse("a.C<T").unwrap_err();
        assert_eq!(err.message, "expected '>'");
        assert_eq!(err.column, 5);

        assert_eq!(parse("a.m(x").unwrap_err().message, "expected ')'");
        assert_eq!(parse("a.m(x,)").unwrap_err().message, "expected identifier");
        assert_eq!(parse("a.C<>").unwrap_err().message, "expected identifier");
    }

    #[test]
    fn test_malformed_module_separator() {
        assert_eq!(parse("a:b").unwrap_err().message, "expected ':'");
        assert!(parse("a::").is_err());
        assert!(parse("::").is_err());
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("a.C)").unwrap_err();
        assert_eq!(err.message, "unexpected ')'");
        assert_eq!(err.column, 3);
        assert!(parse("<T>.C").is_err());
        assert!(parse("(").is_err());
    }

    #[test]
    fn test_control_characters_are_not_end_of_input() {
        let err = parse("a\u{1b}garbage!!((").unwrap_err();
        assert_eq!(err.column, 1);
        assert_eq!(err.message, "unexpected '\\u{1b}'");

        assert_eq!(parse("\u{1b}zzz").unwrap_err().column, 0);
        assert_eq!(parse("a.C<T\u{0}>").unwrap_err().message, "expected '>'");
    }

    #[test]
    fn test_type_param_ref() {
        let sign = parse("<T>").unwrap();
        assert_eq!(sign.kind(), SignKind::TypeParam);
        assert_eq!(sign.to_string(), "<T>");
    }

    #[test]
    fn test_empty_text() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse(" \t\n").unwrap().is_empty());
    }

    #[test]
    fn test_column_counts_chars() {
        let err = parse("é.ü.3").unwrap_err();
        assert_eq!(err.column, 4);
    }
}
