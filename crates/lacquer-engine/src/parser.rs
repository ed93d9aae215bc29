//! Recursive-descent parser for stylesheet source.
//!
//! The grammar is whitespace-insensitive CSS with nesting: rule sets wrap
//! declarations and further rule sets, `@import` introduces other inputs,
//! and declaration values are comma/space sequences of literals and calls.
//! Whether a block is a rule or a declaration is decided by scanning ahead
//! to the first unnested `{`, `;` or `}`, the usual CSS disambiguation.

use lacquer_value::{parse_hex_color, parse_number, Value};

use crate::ast::{Declaration, Import, Node, Pos, Rule, Term, TermGroup, ValueExpr};
use crate::error::EngineError;

pub(crate) fn parse(source: &str, file: &str) -> Result<Vec<Node>, EngineError> {
    let mut parser = Parser::new(source, file);
    let nodes = parser.block_body(true)?;
    parser.skip_trivia()?;
    if parser.peek().is_some() {
        return Err(parser.error_here("unmatched `}`"));
    }
    Ok(nodes)
}

struct Parser<'a> {
    file: &'a str,
    chars: Vec<char>,
    i: usize,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &str, file: &'a str) -> Parser<'a> {
        Parser { file, chars: source.chars().collect(), i: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.i + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.i += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn pos(&self) -> Pos {
        Pos { line: self.line, column: self.column }
    }

    fn error(&self, message: impl Into<String>, pos: Pos) -> EngineError {
        EngineError::new(message, self.file, pos.line, pos.column)
    }

    fn error_here(&self, message: impl Into<String>) -> EngineError {
        self.error(message, self.pos())
    }

    /// Skips whitespace, `//` line comments and `/* */` block comments.
    fn skip_trivia(&mut self) -> Result<(), EngineError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let open = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => return Err(self.error("unterminated comment", open)),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Parses the inside of a block (or the whole stylesheet when
    /// `top_level`). Stops before `}` or at end of input.
    fn block_body(&mut self, top_level: bool) -> Result<Vec<Node>, EngineError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None | Some('}') => return Ok(nodes),
                Some('@') => nodes.push(self.at_rule()?),
                Some(_) => nodes.push(self.rule_or_declaration(top_level)?),
            }
        }
    }

    fn at_rule(&mut self) -> Result<Node, EngineError> {
        let pos = self.pos();
        self.bump(); // @
        let name = self.ident();
        if name != "import" {
            return Err(self.error(format!("unsupported at-rule `@{}`", name), pos));
        }
        let mut urls = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(q @ ('"' | '\'')) => urls.push(self.quoted(q)?),
                _ => return Err(self.error_here("expected a quoted url after `@import`")),
            }
            self.skip_trivia()?;
            if self.peek() == Some(',') {
                self.bump();
                continue;
            }
            break;
        }
        match self.peek() {
            Some(';') => {
                self.bump();
            }
            None | Some('}') => {}
            _ => return Err(self.error_here("expected `;` after `@import`")),
        }
        Ok(Node::Import(Import { urls, pos }))
    }

    /// Looks ahead for the first `{`, `;` or `}` outside strings, comments
    /// and parentheses. `None` means the input ends first.
    fn boundary(&self) -> Option<char> {
        let mut j = self.i;
        let mut parens = 0usize;
        while j < self.chars.len() {
            match self.chars[j] {
                q @ ('"' | '\'') => {
                    j += 1;
                    while j < self.chars.len() && self.chars[j] != q {
                        if self.chars[j] == '\\' {
                            j += 1;
                        }
                        j += 1;
                    }
                }
                '/' if self.chars.get(j + 1) == Some(&'/') => {
                    while j < self.chars.len() && self.chars[j] != '\n' {
                        j += 1;
                    }
                }
                '/' if self.chars.get(j + 1) == Some(&'*') => {
                    j += 2;
                    while j + 1 < self.chars.len()
                        && !(self.chars[j] == '*' && self.chars[j + 1] == '/')
                    {
                        j += 1;
                    }
                    j += 1;
                }
                '(' => parens += 1,
                ')' => parens = parens.saturating_sub(1),
                c @ ('{' | ';' | '}') if parens == 0 => return Some(c),
                _ => {}
            }
            j += 1;
        }
        None
    }

    fn rule_or_declaration(&mut self, top_level: bool) -> Result<Node, EngineError> {
        if self.boundary() == Some('{') {
            self.rule()
        } else if top_level {
            Err(self.error_here("declarations may only appear inside a rule"))
        } else {
            self.declaration()
        }
    }

    fn rule(&mut self) -> Result<Node, EngineError> {
        let pos = self.pos();
        let selector = self.selector_text()?;
        if selector.is_empty() {
            return Err(self.error("expected a selector before `{`", pos));
        }
        self.bump(); // {
        let body = self.block_body(false)?;
        if self.peek() != Some('}') {
            return Err(self.error(format!("unclosed block for selector `{}`", selector), pos));
        }
        self.bump();
        Ok(Node::Rule(Rule { selector, body, pos }))
    }

    /// Consumes selector text up to (not including) the opening brace,
    /// collapsing whitespace runs and dropping comments.
    fn selector_text(&mut self) -> Result<String, EngineError> {
        let mut raw = String::new();
        loop {
            match self.peek() {
                Some('{') => break,
                Some('/') if self.peek_at(1) == Some('/') || self.peek_at(1) == Some('*') => {
                    self.skip_trivia()?;
                    raw.push(' ');
                }
                Some(c) => {
                    self.bump();
                    raw.push(c);
                }
                None => return Err(self.error_here("expected `{` after selector")),
            }
        }
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn declaration(&mut self) -> Result<Node, EngineError> {
        let pos = self.pos();
        let mut property = String::new();
        loop {
            match self.peek() {
                Some(':') => break,
                Some(c) if c == ';' || c == '}' => {
                    return Err(self.error("expected `:` in declaration", pos));
                }
                Some(c) => {
                    self.bump();
                    property.push(c);
                }
                None => return Err(self.error("expected `:` in declaration", pos)),
            }
        }
        let property = property.trim().to_string();
        if property.is_empty() || !property.chars().all(is_ident_char) {
            return Err(self.error(format!("invalid property name `{}`", property), pos));
        }
        self.bump(); // :
        let groups = self.value_groups(false)?;
        if groups.len() == 1 && groups[0].is_empty() {
            return Err(self.error(format!("expected a value for property `{}`", property), pos));
        }
        if let Some(last) = groups.last() {
            if last.is_empty() {
                return Err(self.error_here("expected a value after `,`"));
            }
        }
        if self.peek() == Some(';') {
            self.bump();
        }
        Ok(Node::Declaration(Declaration { property, value: ValueExpr { groups }, pos }))
    }

    /// Parses comma-separated groups of space-separated terms, stopping at
    /// `;`/`}` (declaration position) or `)` (call position).
    fn value_groups(&mut self, in_call: bool) -> Result<Vec<TermGroup>, EngineError> {
        let mut groups: Vec<TermGroup> = vec![Vec::new()];
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Ok(groups),
                Some(';') | Some('}') if !in_call => return Ok(groups),
                Some(')') if in_call => return Ok(groups),
                Some(',') => {
                    if groups.last().map_or(true, Vec::is_empty) {
                        return Err(self.error_here("expected a value before `,`"));
                    }
                    self.bump();
                    groups.push(Vec::new());
                }
                Some(_) => {
                    let term = self.term()?;
                    if let Some(group) = groups.last_mut() {
                        group.push(term);
                    }
                }
            }
        }
    }

    fn term(&mut self) -> Result<Term, EngineError> {
        let pos = self.pos();
        let ch = match self.peek() {
            Some(c) => c,
            None => return Err(self.error_here("expected a value")),
        };
        match ch {
            '"' | '\'' => {
                let text = self.quoted(ch)?;
                Ok(Term::Literal(Value::string(text)))
            }
            '#' => {
                self.bump();
                let mut token = String::from("#");
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() {
                        self.bump();
                        token.push(c);
                    } else {
                        break;
                    }
                }
                let color = parse_hex_color(&token)
                    .map_err(|e| self.error(e.to_string(), pos))?;
                Ok(Term::Literal(color))
            }
            c if c.is_ascii_digit() || c == '.' => self.number_term(pos),
            '-' | '+' => {
                let next = self.peek_at(1);
                if matches!(next, Some(n) if n.is_ascii_digit() || n == '.') {
                    self.number_term(pos)
                } else if ch == '-' {
                    self.ident_term(pos)
                } else {
                    self.raw_term(pos)
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.ident_term(pos),
            '{' | ';' | '}' | '(' => {
                Err(self.error(format!("unexpected `{}` in value", ch), pos))
            }
            _ => self.raw_term(pos),
        }
    }

    fn number_term(&mut self, pos: Pos) -> Result<Term, EngineError> {
        let mut token = String::new();
        if matches!(self.peek(), Some('-') | Some('+')) {
            if let Some(sign) = self.bump() {
                token.push(sign);
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.bump();
                token.push(c);
            } else {
                break;
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() || c == '%' {
                self.bump();
                token.push(c);
            } else {
                break;
            }
        }
        match parse_number(&token) {
            Some((value, unit)) => Ok(Term::Literal(Value::number(value, unit))),
            None => Err(self.error(format!("invalid number `{}`", token), pos)),
        }
    }

    fn ident_term(&mut self, pos: Pos) -> Result<Term, EngineError> {
        let name = self.ident();
        if self.peek() == Some('(') {
            self.bump();
            let mut args = self.value_groups(true)?;
            if self.peek() != Some(')') {
                return Err(self.error(format!("expected `)` to close call to `{}`", name), pos));
            }
            self.bump();
            if args.len() == 1 && args[0].is_empty() {
                args.clear();
            } else if args.last().map_or(false, Vec::is_empty) {
                return Err(self.error(format!("expected an argument after `,` in `{}`", name), pos));
            }
            return Ok(Term::Call { name, args, pos });
        }
        Ok(match name.as_str() {
            "true" => Term::Literal(Value::Boolean(true)),
            "false" => Term::Literal(Value::Boolean(false)),
            "null" => Term::Literal(Value::Null),
            _ => Term::Literal(Value::ident(name)),
        })
    }

    /// Fallback for tokens that are not values but are legal in CSS output
    /// position, e.g. `!important`. Kept verbatim.
    fn raw_term(&mut self, _pos: Pos) -> Result<Term, EngineError> {
        let mut token = String::new();
        if let Some(first) = self.bump() {
            token.push(first);
        }
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | ';' | '}' | '{' | '(' | ')') {
                break;
            }
            self.bump();
            token.push(c);
        }
        Ok(Term::Raw(token))
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_char(c) {
                self.bump();
                name.push(c);
            } else {
                break;
            }
        }
        name
    }

    fn quoted(&mut self, quote: char) -> Result<String, EngineError> {
        let open = self.pos();
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(text),
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("unterminated string", open)),
                },
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated string", open)),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
