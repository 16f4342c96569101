/// Recursive descent parser for jq filter expressions.
///
/// Grammar (loosest to tightest):
///   pipe     = "def" ... ";" pipe | comma ("|" pipe)?
///   comma    = alt ("," alt)*
///   alt      = assign ("//" alt)?
///   assign   = or (assign_op or)?
///   or       = and ("or" and)*
///   and      = compare ("and" compare)*
///   compare  = additive (cmp_op additive)?
///   additive = mul (("+" | "-") mul)*
///   mul      = unary (("*" | "/" | "%") unary)*
///   unary    = "-" unary | "not" unary | "not" | postfix
///   postfix  = primary (path | "[" ... "]" | "?")* ("as" pattern "|" pipe)?
///
/// Function names are resolved while parsing: a call must name a native
/// builtin, a jq builtin, or a function defined by an enclosing `def`.
/// Variables and labels must be bound by an enclosing construct.
use super::lexer::{self, InterpPart, Lexeme, Token};
use super::{
    AssignOp, BinOp, Filter, ParseError, PathStep, Pattern, StringPart, is_jq_builtin,
    lookup_native,
};
use crate::value::Value;

type Result<T> = std::result::Result<T, ParseError>;

/// Formats accepted after `@`.
const FORMATS: &[&str] = &[
    "text", "json", "html", "uri", "csv", "tsv", "sh", "base64", "base64d", "base32", "base32d",
];

/// Variables that exist without a binding.
const GLOBAL_VARS: &[&str] = &["ENV", "__loc__", "__prog_args"];

struct Parser<'a> {
    tokens: &'a [Lexeme],
    pos: usize,
    /// Offset reported for "unexpected end" errors.
    end: usize,
    vars: Vec<String>,
    funcs: Vec<(String, usize)>,
    labels: Vec<String>,
    has_imports: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Lexeme], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            vars: Vec::new(),
            funcs: Vec::new(),
            labels: Vec::new(),
            has_imports: false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|l| &l.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|l| l.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |l| l.offset)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ParseError {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn unexpected<T>(&self, context: &str) -> Result<T> {
        let mut message = match self.peek() {
            Some(tok) => format!("unexpected {tok:?}"),
            None => "unexpected end of expression".to_string(),
        };
        if !context.is_empty() {
            message.push(' ');
            message.push_str(context);
        }
        self.error(message)
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            self.unexpected(&format!("(expected {expected:?})"))
        }
    }

    fn expect_var(&mut self, context: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Var(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.unexpected(&format!("(expected $name {context})")),
        }
    }

    // pipe = "def" ... ";" pipe | comma ("|" pipe)?
    fn parse_pipe(&mut self) -> Result<Filter> {
        if self.peek() == Some(&Token::Def) {
            return self.parse_def();
        }
        let left = self.parse_comma()?;
        if self.eat(&Token::Pipe) {
            let right = self.parse_pipe()?;
            return Ok(Filter::Pipe(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    /// Pipe without comma, used for object values where `,` separates pairs.
    fn parse_pipe_no_comma(&mut self) -> Result<Filter> {
        let left = self.parse_alternative()?;
        if self.eat(&Token::Pipe) {
            let right = self.parse_pipe_no_comma()?;
            return Ok(Filter::Pipe(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_comma(&mut self) -> Result<Filter> {
        let first = self.parse_alternative()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            items.push(self.parse_alternative()?);
        }
        Ok(Filter::Comma(items))
    }

    // Right-associative: a // b // c == a // (b // c)
    fn parse_alternative(&mut self) -> Result<Filter> {
        let left = self.parse_assign()?;
        if self.eat(&Token::DoubleSlash) {
            let right = self.parse_alternative()?;
            return Ok(Filter::Alternative(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_assign(&mut self) -> Result<Filter> {
        let left = self.parse_or()?;
        let Some(op) = self.peek().and_then(assign_op) else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.parse_or()?;
        if self.peek().and_then(assign_op).is_some() {
            return self.error("assignment operators cannot be chained");
        }
        Ok(Filter::Assign(op, Box::new(left), Box::new(right)))
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Filter::BinaryOp(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_compare()?;
        while self.eat(&Token::And) {
            let right = self.parse_compare()?;
            left = Filter::BinaryOp(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // Non-associative: `a < b < c` is rejected.
    fn parse_compare(&mut self) -> Result<Filter> {
        let left = self.parse_additive()?;
        let Some(op) = self.peek().and_then(compare_op) else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        if self.peek().and_then(compare_op).is_some() {
            return self.error("comparison operators cannot be chained");
        }
        Ok(Filter::BinaryOp(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Filter> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Filter::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Filter> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Filter::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Filter> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.parse_unary()?;
                // Fold negative literals so `-1` is a plain literal.
                if let Filter::Literal(v) = &inner {
                    if let Some(neg) = v.negate() {
                        return Ok(Filter::Literal(neg));
                    }
                }
                Ok(Filter::Neg(Box::new(inner)))
            }
            Some(Token::Not) => {
                self.pos += 1;
                if self.peek().is_some_and(starts_term) {
                    let inner = self.parse_unary()?;
                    Ok(Filter::Not(Box::new(inner)))
                } else {
                    Ok(Filter::Not(Box::new(Filter::Identity)))
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Filter> {
        let node = self.parse_postfix_chain()?;
        if self.peek() == Some(&Token::As) {
            return self.parse_binding(node);
        }
        Ok(node)
    }

    /// A primary followed by any number of path, index, slice and `?`
    /// suffixes. Literal steps fold into a single `Path`.
    fn parse_postfix_chain(&mut self) -> Result<Filter> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Path(segments)) => {
                    let segments = segments.clone();
                    self.pos += 1;
                    for seg in segments {
                        node = push_step(node, PathStep::Field(seg));
                    }
                }
                // `.a.[0]`
                Some(Token::Dot) if self.peek_at(1) == Some(&Token::LBrack) => {
                    self.pos += 1;
                }
                Some(Token::LBrack) => {
                    self.pos += 1;
                    node = self.parse_bracket_suffix(node)?;
                }
                Some(Token::Question) => {
                    self.pos += 1;
                    node = Filter::Try(Box::new(normalize(node)));
                }
                _ => break,
            }
        }
        Ok(normalize(node))
    }

    /// Parse the contents of `[...]` after the `[` has been consumed.
    fn parse_bracket_suffix(&mut self, base: Filter) -> Result<Filter> {
        if self.eat(&Token::RBrack) {
            return Ok(push_step(base, PathStep::Iterate));
        }
        // [:to]
        if self.eat(&Token::Colon) {
            let to = self.parse_pipe()?;
            self.expect(&Token::RBrack)?;
            return Ok(Filter::Slice(Box::new(normalize(base)), None, Some(Box::new(to))));
        }
        let first = self.parse_pipe()?;
        // [from:] or [from:to]
        if self.eat(&Token::Colon) {
            let to = if self.peek() == Some(&Token::RBrack) {
                None
            } else {
                Some(Box::new(self.parse_pipe()?))
            };
            self.expect(&Token::RBrack)?;
            return Ok(Filter::Slice(Box::new(normalize(base)), Some(Box::new(first)), to));
        }
        self.expect(&Token::RBrack)?;
        Ok(match first {
            Filter::Literal(Value::Int(n)) => push_step(base, PathStep::Index(n)),
            Filter::Literal(Value::String(s)) => push_step(base, PathStep::Field(s)),
            idx => Filter::Index(Box::new(normalize(base)), Box::new(idx)),
        })
    }

    fn parse_primary(&mut self) -> Result<Filter> {
        let Some(tok) = self.peek().cloned() else {
            return self.unexpected("");
        };
        let start = self.offset();
        self.pos += 1;
        match tok {
            Token::Dot => Ok(Filter::Identity),
            Token::Path(segments) => Ok(Filter::Path(
                segments.into_iter().map(PathStep::Field).collect(),
            )),
            Token::DotDot => Ok(Filter::Recurse),
            Token::Null => Ok(Filter::Literal(Value::Null)),
            Token::True => Ok(Filter::Literal(Value::Bool(true))),
            Token::False => Ok(Filter::Literal(Value::Bool(false))),
            Token::Int(n) => Ok(Filter::Literal(Value::Int(n))),
            Token::Float(f) => Ok(Filter::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Filter::Literal(Value::String(s))),
            Token::Interp(parts) => self.parse_interp(parts),
            Token::Format(name) => {
                if !FORMATS.contains(&name.as_str()) {
                    self.pos -= 1;
                    return self.error(format!("@{name} is not a valid format"));
                }
                let arg = match self.peek() {
                    Some(Token::Str(_) | Token::Interp(_)) => Some(Box::new(self.parse_primary()?)),
                    _ => None,
                };
                Ok(Filter::Format(name, arg))
            }
            Token::LParen => {
                let expr = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBrack => {
                if self.eat(&Token::RBrack) {
                    return Ok(Filter::ArrayConstruct(Vec::new()));
                }
                let expr = self.parse_pipe()?;
                self.expect(&Token::RBrack)?;
                Ok(Filter::ArrayConstruct(match expr {
                    Filter::Comma(items) => items,
                    other => vec![other],
                }))
            }
            Token::LBrace => self.parse_object_construct(),
            Token::Var(name) => {
                if !self.var_defined(&name) {
                    self.pos -= 1;
                    return self.error(format!("${name} is not defined"));
                }
                Ok(Filter::Var(name))
            }
            Token::If => self.parse_if_chain(),
            Token::Try => {
                let body = self.parse_postfix_chain()?;
                if self.eat(&Token::Catch) {
                    let handler = self.parse_postfix_chain()?;
                    Ok(Filter::TryCatch(Box::new(body), Box::new(handler)))
                } else {
                    Ok(Filter::Try(Box::new(body)))
                }
            }
            Token::Reduce => {
                let source = self.parse_postfix_chain()?;
                self.expect(&Token::As)?;
                let pattern = self.parse_pattern()?;
                let scope = self.vars.len();
                pattern_vars(&pattern, &mut self.vars);
                self.expect(&Token::LParen)?;
                let init = self.parse_pipe()?;
                self.expect(&Token::Semicolon)?;
                let update = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                self.vars.truncate(scope);
                Ok(Filter::Reduce(
                    Box::new(source),
                    pattern,
                    Box::new(init),
                    Box::new(update),
                ))
            }
            Token::Foreach => {
                let source = self.parse_postfix_chain()?;
                self.expect(&Token::As)?;
                let pattern = self.parse_pattern()?;
                let scope = self.vars.len();
                pattern_vars(&pattern, &mut self.vars);
                self.expect(&Token::LParen)?;
                let init = self.parse_pipe()?;
                self.expect(&Token::Semicolon)?;
                let update = self.parse_pipe()?;
                let extract = if self.eat(&Token::Semicolon) {
                    Some(Box::new(self.parse_pipe()?))
                } else {
                    None
                };
                self.expect(&Token::RParen)?;
                self.vars.truncate(scope);
                Ok(Filter::Foreach(
                    Box::new(source),
                    pattern,
                    Box::new(init),
                    Box::new(update),
                    extract,
                ))
            }
            Token::Label => {
                let name = self.expect_var("after label")?;
                self.expect(&Token::Pipe)?;
                self.labels.push(name.clone());
                let body = self.parse_pipe();
                self.labels.pop();
                Ok(Filter::Label(name, Box::new(body?)))
            }
            Token::Ident(name) if name == "break" && matches!(self.peek(), Some(Token::Var(_))) => {
                let label = self.expect_var("after break")?;
                if !self.labels.contains(&label) {
                    self.pos -= 1;
                    return self.error(format!("$*label-{label} is not defined"));
                }
                Ok(Filter::Break(label))
            }
            Token::Ident(name) => self.parse_call(name, start),
            _ => {
                self.pos -= 1;
                self.unexpected("")
            }
        }
    }

    fn parse_call(&mut self, name: String, start: usize) -> Result<Filter> {
        let mut args = Vec::new();
        if self.eat(&Token::LParen) {
            args.push(self.parse_pipe()?);
            while self.eat(&Token::Semicolon) {
                args.push(self.parse_pipe()?);
            }
            self.expect(&Token::RParen)?;
        }
        let arity = args.len();
        let user_defined = self.funcs.iter().any(|(n, a)| *n == name && *a == arity);
        if !user_defined {
            if name == "select" && arity == 1 {
                let pred = args.pop().unwrap_or(Filter::Identity);
                return Ok(Filter::Select(Box::new(pred)));
            }
            let known = lookup_native(&name, arity).is_some()
                || is_jq_builtin(&name, arity)
                || (self.has_imports && name.contains("::"));
            if !known {
                return Err(ParseError {
                    offset: start,
                    message: format!("{name}/{arity} is not defined"),
                });
            }
        }
        Ok(Filter::Call(name, args))
    }

    /// Parse an if-elif-else-end chain. Called after `if` or `elif` is consumed.
    /// Desugars `elif` into nested `If`.
    fn parse_if_chain(&mut self) -> Result<Filter> {
        let cond = self.parse_pipe()?;
        self.expect(&Token::Then)?;
        let then_branch = self.parse_pipe()?;
        let else_branch = if self.eat(&Token::Elif) {
            self.parse_if_chain()?
        } else if self.eat(&Token::Else) {
            let e = self.parse_pipe()?;
            self.expect(&Token::End)?;
            e
        } else {
            self.expect(&Token::End)?;
            Filter::Identity
        };
        Ok(Filter::If(
            Box::new(cond),
            Box::new(then_branch),
            Box::new(else_branch),
        ))
    }

    /// `source as pattern | body`; called with `as` as the next token.
    fn parse_binding(&mut self, source: Filter) -> Result<Filter> {
        self.pos += 1;
        let pattern = self.parse_pattern()?;
        self.expect(&Token::Pipe)?;
        let scope = self.vars.len();
        pattern_vars(&pattern, &mut self.vars);
        let body = self.parse_pipe();
        self.vars.truncate(scope);
        Ok(Filter::Bind(Box::new(source), pattern, Box::new(body?)))
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        match self.peek() {
            Some(Token::Var(_)) => Ok(Pattern::Var(self.expect_var("")?)),
            Some(Token::LBrack) => {
                self.pos += 1;
                let mut items = vec![self.parse_pattern()?];
                while self.eat(&Token::Comma) {
                    items.push(self.parse_pattern()?);
                }
                self.expect(&Token::RBrack)?;
                Ok(Pattern::Array(items))
            }
            Some(Token::LBrace) => {
                self.pos += 1;
                let mut entries = Vec::new();
                loop {
                    entries.push(self.parse_pattern_entry()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Pattern::Object(entries))
            }
            _ => self.unexpected("(expected a binding pattern)"),
        }
    }

    fn parse_pattern_entry(&mut self) -> Result<(Filter, Pattern)> {
        let Some(tok) = self.peek().cloned() else {
            return self.unexpected("in object pattern");
        };
        let key = match tok {
            Token::Var(name) => {
                self.pos += 1;
                if !self.eat(&Token::Colon) {
                    return Ok((Filter::Literal(Value::String(name.clone())), Pattern::Var(name)));
                }
                // `$name: pattern` binds `$name` to the whole value as well
                return Ok((Filter::Var(name), self.parse_pattern()?));
            }
            Token::Str(s) => {
                self.pos += 1;
                Filter::Literal(Value::String(s))
            }
            Token::Interp(parts) => {
                self.pos += 1;
                self.parse_interp(parts)?
            }
            Token::LParen => {
                self.pos += 1;
                let key = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                key
            }
            ref other => match key_name(other) {
                Some(name) => {
                    self.pos += 1;
                    Filter::Literal(Value::String(name))
                }
                None => return self.unexpected("in object pattern"),
            },
        };
        self.expect(&Token::Colon)?;
        Ok((key, self.parse_pattern()?))
    }

    fn parse_object_construct(&mut self) -> Result<Filter> {
        let mut pairs = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Filter::ObjectConstruct(pairs));
        }
        loop {
            pairs.push(self.parse_obj_pair()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Filter::ObjectConstruct(pairs))
    }

    fn parse_obj_pair(&mut self) -> Result<(Filter, Filter)> {
        let Some(tok) = self.peek().cloned() else {
            return self.unexpected("in object construction");
        };
        // Keys that allow the `{name}` shorthand
        let name = match &tok {
            Token::Var(name) => {
                if !self.var_defined(name) {
                    return self.error(format!("${name} is not defined"));
                }
                self.pos += 1;
                let key = Filter::Literal(Value::String(name.clone()));
                return Ok((key, Filter::Var(name.clone())));
            }
            Token::Str(s) => Some(s.clone()),
            other => key_name(other),
        };
        if let Some(name) = name {
            self.pos += 1;
            let key = Filter::Literal(Value::String(name.clone()));
            if !self.eat(&Token::Colon) {
                return Ok((key, Filter::Field(name)));
            }
            return Ok((key, self.parse_pipe_no_comma()?));
        }
        let key = match tok {
            Token::Interp(parts) => {
                self.pos += 1;
                self.parse_interp(parts)?
            }
            Token::LParen => {
                self.pos += 1;
                let key = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                key
            }
            Token::Int(_) | Token::Float(_) => {
                return self.error("object keys must be strings");
            }
            _ => return self.unexpected("in object construction"),
        };
        self.expect(&Token::Colon)?;
        Ok((key, self.parse_pipe_no_comma()?))
    }

    /// Parse each `\(...)` body of an interpolated string as a nested
    /// expression in the current scope.
    fn parse_interp(&mut self, parts: Vec<InterpPart>) -> Result<Filter> {
        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                InterpPart::Lit(s) => out.push(StringPart::Lit(s)),
                InterpPart::Expr { src, offset } => {
                    let tokens = lexer::lex_at(&src, offset).map_err(|e| ParseError {
                        offset: e.offset,
                        message: e.message,
                    })?;
                    let mut sub = Parser {
                        tokens: &tokens,
                        pos: 0,
                        end: offset + src.len(),
                        vars: self.vars.clone(),
                        funcs: self.funcs.clone(),
                        labels: self.labels.clone(),
                        has_imports: self.has_imports,
                    };
                    out.push(StringPart::Expr(sub.parse_complete()?));
                }
            }
        }
        Ok(Filter::StringInterp(out))
    }

    /// `def name(params): body; rest`
    fn parse_def(&mut self) -> Result<Filter> {
        self.expect(&Token::Def)?;
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return self.unexpected("(expected a function name after def)");
            }
        };
        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            loop {
                match self.advance() {
                    Some(Token::Ident(p)) => params.push(p),
                    Some(Token::Var(p)) => params.push(format!("${p}")),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return self.unexpected("(expected a parameter name)");
                    }
                }
                if !self.eat(&Token::Semicolon) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        self.expect(&Token::Colon)?;

        let (var_scope, func_scope) = (self.vars.len(), self.funcs.len());
        self.funcs.push((name.clone(), params.len()));
        for p in &params {
            match p.strip_prefix('$') {
                Some(var) => {
                    self.vars.push(var.to_string());
                    self.funcs.push((var.to_string(), 0));
                }
                None => self.funcs.push((p.clone(), 0)),
            }
        }
        let body = self.parse_pipe();
        self.vars.truncate(var_scope);
        self.funcs.truncate(func_scope + 1);
        let body = body?;
        self.expect(&Token::Semicolon)?;

        let rest = self.parse_pipe();
        self.funcs.truncate(func_scope);
        Ok(Filter::Def {
            name,
            params,
            body: Box::new(body),
            rest: Box::new(rest?),
        })
    }

    /// Leading `import`/`include` directives, then the main expression.
    fn parse_program(&mut self) -> Result<Filter> {
        let mut directives = Vec::new();
        loop {
            let is_import = match self.peek() {
                Some(Token::Import) => true,
                Some(Token::Include) => false,
                _ => break,
            };
            self.pos += 1;
            let path = match self.advance() {
                Some(Token::Str(path)) => path,
                _ => {
                    self.pos -= 1;
                    return self.unexpected("(expected a module path)");
                }
            };
            if is_import {
                self.expect(&Token::As)?;
                match self.advance() {
                    Some(Token::Ident(_)) => {}
                    Some(Token::Var(name)) => self.vars.push(name),
                    _ => {
                        self.pos -= 1;
                        return self.unexpected("(expected a module name)");
                    }
                }
            }
            // Optional metadata object
            if self.peek() == Some(&Token::LBrace) {
                self.pos += 1;
                self.parse_object_construct()?;
            }
            self.expect(&Token::Semicolon)?;
            self.has_imports = true;
            directives.push(path);
        }

        let mut body = if self.peek().is_none() && !directives.is_empty() {
            Filter::Identity
        } else {
            self.parse_complete()?
        };
        for path in directives.into_iter().rev() {
            body = Filter::Import(path, Box::new(body));
        }
        Ok(body)
    }

    /// Parse a whole token stream; trailing tokens are an error.
    fn parse_complete(&mut self) -> Result<Filter> {
        // An empty program is the identity filter
        if self.tokens.is_empty() {
            return Ok(Filter::Identity);
        }
        let filter = self.parse_pipe()?;
        if self.pos < self.tokens.len() {
            return self.unexpected("after expression");
        }
        Ok(filter)
    }

    fn var_defined(&self, name: &str) -> bool {
        GLOBAL_VARS.contains(&name) || self.vars.iter().any(|v| v == name)
    }
}

/// Append a literal step to a postfix chain.
fn push_step(base: Filter, step: PathStep) -> Filter {
    match base {
        Filter::Identity => Filter::Path(vec![step]),
        Filter::Field(name) => Filter::Path(vec![PathStep::Field(name), step]),
        Filter::Path(mut steps) => {
            steps.push(step);
            Filter::Path(steps)
        }
        other => match step {
            PathStep::Field(name) => Filter::Index(
                Box::new(other),
                Box::new(Filter::Literal(Value::String(name))),
            ),
            PathStep::Index(n) => {
                Filter::Index(Box::new(other), Box::new(Filter::Literal(Value::Int(n))))
            }
            PathStep::Iterate => Filter::Iterate(Box::new(other)),
        },
    }
}

/// `Path([.a])` is just `.a`.
fn normalize(node: Filter) -> Filter {
    match node {
        Filter::Path(mut steps) if steps.len() == 1 && matches!(steps[0], PathStep::Field(_)) => {
            match steps.pop() {
                Some(PathStep::Field(name)) => Filter::Field(name),
                _ => Filter::Identity,
            }
        }
        Filter::Path(steps) if steps.is_empty() => Filter::Identity,
        other => other,
    }
}

fn compare_op(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::Eq => BinOp::Eq,
        Token::Ne => BinOp::Ne,
        Token::Lt => BinOp::Lt,
        Token::Le => BinOp::Le,
        Token::Gt => BinOp::Gt,
        Token::Ge => BinOp::Ge,
        _ => return None,
    })
}

fn assign_op(tok: &Token) -> Option<AssignOp> {
    Some(match tok {
        Token::Assign => AssignOp::Set,
        Token::UpdateAssign => AssignOp::Update,
        Token::PlusAssign => AssignOp::Add,
        Token::MinusAssign => AssignOp::Sub,
        Token::StarAssign => AssignOp::Mul,
        Token::SlashAssign => AssignOp::Div,
        Token::PercentAssign => AssignOp::Mod,
        Token::AltAssign => AssignOp::Alt,
        _ => return None,
    })
}

/// Tokens that may begin an operand; decides between prefix `not x` and
/// the bare `not` filter.
fn starts_term(tok: &Token) -> bool {
    matches!(
        tok,
        Token::Dot
            | Token::DotDot
            | Token::Path(_)
            | Token::LParen
            | Token::LBrack
            | Token::LBrace
            | Token::Minus
            | Token::Not
            | Token::Ident(_)
            | Token::Var(_)
            | Token::Format(_)
            | Token::Str(_)
            | Token::Interp(_)
            | Token::Int(_)
            | Token::Float(_)
            | Token::True
            | Token::False
            | Token::Null
            | Token::If
            | Token::Try
            | Token::Reduce
            | Token::Foreach
            | Token::Label
    )
}

/// Bare words usable as object keys, keywords included (`{if: 1}`).
fn key_name(tok: &Token) -> Option<String> {
    let word = match tok {
        Token::Ident(name) => return Some(name.clone()),
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::If => "if",
        Token::Then => "then",
        Token::Elif => "elif",
        Token::Else => "else",
        Token::End => "end",
        Token::And => "and",
        Token::Or => "or",
        Token::Not => "not",
        Token::As => "as",
        Token::Def => "def",
        Token::Reduce => "reduce",
        Token::Foreach => "foreach",
        Token::Try => "try",
        Token::Catch => "catch",
        Token::Label => "label",
        Token::Import => "import",
        Token::Include => "include",
        _ => return None,
    };
    Some(word.to_string())
}

fn pattern_vars(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Var(name) => out.push(name.clone()),
        Pattern::Array(items) => items.iter().for_each(|p| pattern_vars(p, out)),
        Pattern::Object(entries) => {
            for (key, p) in entries {
                if let Filter::Var(name) = key {
                    out.push(name.clone());
                }
                pattern_vars(p, out);
            }
        }
    }
}

/// Parse a token stream. `end` is the length of the source text, reported
/// as the offset of "unexpected end" errors.
pub fn parse(tokens: &[Lexeme], end: usize) -> Result<Filter> {
    Parser::new(tokens, end).parse_program()
}
