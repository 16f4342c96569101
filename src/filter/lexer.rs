/// jq filter language tokenizer.
///
/// Dotted runs (`.a.b."c d"`) come out as a single [`Token::Path`], so the
/// parser never has to re-split field chains. Every token carries the byte
/// offset where it starts, for error messages.
use memchr::memchr2;

use super::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Dot,       // .
    DotDot,    // ..
    Pipe,      // |
    LBrack,    // [
    RBrack,    // ]
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Question,  // ?
    // Comparison operators
    Eq, // ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    // Assignment
    Assign,        // =
    UpdateAssign,  // |=
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=
    AltAssign,     // //=
    // Logical
    DoubleSlash, // // (alternative operator)
    // Literals and identifiers
    /// `.a.b."c"`: one or more field names reached from `.`
    Path(Vec<String>),
    Ident(String),
    /// `$name`
    Var(String),
    /// `@name`
    Format(String),
    Str(String),
    /// A string literal containing `\(...)`.
    Interp(Vec<InterpPart>),
    Int(i64),
    Float(f64),
    // Keywords
    True,
    False,
    Null,
    If,
    Then,
    Elif,
    Else,
    End,
    And,
    Or,
    Not,
    As,
    Def,
    Reduce,
    Foreach,
    Try,
    Catch,
    Label,
    Import,
    Include,
}

/// A piece of an interpolated string. Embedded expressions are kept as
/// source text and parsed recursively by the parser, which owns scoping.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Lit(String),
    Expr { src: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

type Result<T> = std::result::Result<T, LexError>;

fn err<T>(offset: usize, message: impl Into<String>) -> Result<T> {
    Err(LexError {
        offset,
        message: message.into(),
    })
}

pub fn lex(input: &str) -> Result<Vec<Lexeme>> {
    lex_at(input, 0)
}

/// Tokenize `input`, reporting offsets relative to `base` (non-zero when
/// lexing the body of a string interpolation).
pub fn lex_at(input: &str, base: usize) -> Result<Vec<Lexeme>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let mut push = |token: Token| {
            tokens.push(Lexeme {
                token,
                offset: base + start,
            })
        };

        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comment to end of line
        if bytes[i] == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Three-char operator
        if bytes[i..].starts_with(b"//=") {
            push(Token::AltAssign);
            i += 3;
            continue;
        }

        // Two-char operators
        if i + 1 < bytes.len() {
            let tok = match (bytes[i], bytes[i + 1]) {
                (b'=', b'=') => Some(Token::Eq),
                (b'!', b'=') => Some(Token::Ne),
                (b'<', b'=') => Some(Token::Le),
                (b'>', b'=') => Some(Token::Ge),
                (b'/', b'/') => Some(Token::DoubleSlash),
                (b'|', b'=') => Some(Token::UpdateAssign),
                (b'+', b'=') => Some(Token::PlusAssign),
                (b'-', b'=') => Some(Token::MinusAssign),
                (b'*', b'=') => Some(Token::StarAssign),
                (b'/', b'=') => Some(Token::SlashAssign),
                (b'%', b'=') => Some(Token::PercentAssign),
                (b'.', b'.') => Some(Token::DotDot),
                _ => None,
            };
            if let Some(tok) = tok {
                push(tok);
                i += 2;
                continue;
            }
        }

        // Single-char tokens
        let tok = match bytes[i] {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBrack),
            b']' => Some(Token::RBrack),
            b'{' => Some(Token::LBrace),
            b'}' => Some(Token::RBrace),
            b'|' => Some(Token::Pipe),
            b',' => Some(Token::Comma),
            b':' => Some(Token::Colon),
            b';' => Some(Token::Semicolon),
            b'?' => Some(Token::Question),
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'%' => Some(Token::Percent),
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b'=' => Some(Token::Assign),
            _ => None,
        };
        if let Some(tok) = tok {
            push(tok);
            i += 1;
            continue;
        }

        // Dot: identity, a number like .5, or the start of a dotted path
        if bytes[i] == b'.' {
            if i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
                let (tok, consumed) = lex_number(input, i, base)?;
                push(tok);
                i += consumed;
                continue;
            }
            let mut segments = Vec::new();
            while i < bytes.len() && bytes[i] == b'.' && i + 1 < bytes.len() {
                let next = bytes[i + 1];
                if is_ident_start(next) {
                    let name_start = i + 1;
                    i = name_start;
                    while i < bytes.len() && is_ident_continue(bytes[i]) {
                        i += 1;
                    }
                    segments.push(input[name_start..i].to_string());
                } else if next == b'"' {
                    match lex_string(input, i + 1, base)? {
                        (Token::Str(s), consumed) => {
                            segments.push(s);
                            i += 1 + consumed;
                        }
                        _ => return err(base + i + 1, "interpolation is not allowed in a field name"),
                    }
                } else {
                    break;
                }
            }
            if segments.is_empty() {
                push(Token::Dot);
                i += 1;
            } else {
                push(Token::Path(segments));
            }
            continue;
        }

        // String literal
        if bytes[i] == b'"' {
            let (tok, consumed) = lex_string(input, i, base)?;
            push(tok);
            i += consumed;
            continue;
        }

        // Number
        if bytes[i].is_ascii_digit() {
            let (tok, consumed) = lex_number(input, i, base)?;
            push(tok);
            i += consumed;
            continue;
        }

        // $var and @format
        if bytes[i] == b'$' || bytes[i] == b'@' {
            let sigil = bytes[i];
            i += 1;
            if i >= bytes.len() || !is_ident_start(bytes[i]) {
                return err(base + start, format!("expected a name after '{}'", sigil as char));
            }
            let name_start = i;
            i = scan_ident(bytes, i);
            let name = input[name_start..i].to_string();
            push(if sigil == b'$' {
                Token::Var(name)
            } else {
                Token::Format(name)
            });
            continue;
        }

        // Identifier or keyword
        if is_ident_start(bytes[i]) {
            i = scan_ident(bytes, i);
            let word = &input[start..i];
            let tok = match word {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                "if" => Token::If,
                "then" => Token::Then,
                "elif" => Token::Elif,
                "else" => Token::Else,
                "end" => Token::End,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "as" => Token::As,
                "def" => Token::Def,
                "reduce" => Token::Reduce,
                "foreach" => Token::Foreach,
                "try" => Token::Try,
                "catch" => Token::Catch,
                "label" => Token::Label,
                "import" => Token::Import,
                "include" => Token::Include,
                _ => Token::Ident(word.to_string()),
            };
            push(tok);
            continue;
        }

        let ch = input[i..].chars().next().unwrap_or('?');
        return err(base + i, format!("unexpected character '{ch}'"));
    }

    Ok(tokens)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan an identifier, including module-qualified names like `lib::f`.
fn scan_ident(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && is_ident_continue(bytes[i]) {
            i += 1;
        }
        if bytes[i..].starts_with(b"::") && i + 2 < bytes.len() && is_ident_start(bytes[i + 2]) {
            i += 2;
        } else {
            return i;
        }
    }
}

/// Lex a string literal starting at the opening quote. Returns the token and
/// the number of bytes consumed.
fn lex_string(input: &str, start: usize, base: usize) -> Result<(Token, usize)> {
    let bytes = input.as_bytes();
    debug_assert_eq!(bytes[start], b'"');
    let mut i = start + 1;
    let mut s = String::new();
    let mut parts = Vec::new();

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let consumed = i + 1 - start;
                if parts.is_empty() {
                    return Ok((Token::Str(s), consumed));
                }
                if !s.is_empty() {
                    parts.push(InterpPart::Lit(s));
                }
                return Ok((Token::Interp(parts), consumed));
            }
            b'\\' => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'"' => s.push('"'),
                    b'\\' => s.push('\\'),
                    b'/' => s.push('/'),
                    b'n' => s.push('\n'),
                    b'r' => s.push('\r'),
                    b't' => s.push('\t'),
                    b'b' => s.push('\x08'),
                    b'f' => s.push('\x0c'),
                    b'u' => {
                        let (c, consumed) = lex_unicode_escape(bytes, i, base)?;
                        s.push(c);
                        i += consumed - 1;
                    }
                    b'(' => {
                        let expr_start = i + 1;
                        let expr_end = find_interp_end(input, expr_start, base)?;
                        if !s.is_empty() {
                            parts.push(InterpPart::Lit(std::mem::take(&mut s)));
                        }
                        parts.push(InterpPart::Expr {
                            src: input[expr_start..expr_end].to_string(),
                            offset: base + expr_start,
                        });
                        i = expr_end;
                    }
                    _ => {
                        let ch = input[i..].chars().next().unwrap_or('?');
                        return err(base + i - 1, format!("invalid escape '\\{ch}'"));
                    }
                }
                i += 1;
            }
            _ => {
                // Fast path: copy up to the next quote or backslash
                let end = memchr2(b'"', b'\\', &bytes[i..]).map_or(bytes.len(), |p| i + p);
                s.push_str(&input[i..end]);
                i = end;
            }
        }
    }
    err(base + start, "unterminated string")
}

/// Decode `\uXXXX` (with `i` on the `u`), joining surrogate pairs.
/// Returns the char and the bytes consumed counting from the `u`.
fn lex_unicode_escape(bytes: &[u8], i: usize, base: usize) -> Result<(char, usize)> {
    let hex4 = |at: usize| -> Option<u32> {
        let digits = bytes.get(at..at + 4)?;
        let text = std::str::from_utf8(digits).ok()?;
        u32::from_str_radix(text, 16).ok()
    };
    let Some(hi) = hex4(i + 1) else {
        return err(base + i - 1, "invalid \\u escape");
    };
    if (0xD800..0xDC00).contains(&hi) && bytes.get(i + 5..i + 7) == Some(b"\\u") {
        if let Some(lo) = hex4(i + 7).filter(|lo| (0xDC00..0xE000).contains(lo)) {
            let cp = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
            return Ok((char::from_u32(cp).unwrap_or('\u{FFFD}'), 11));
        }
    }
    Ok((char::from_u32(hi).unwrap_or('\u{FFFD}'), 5))
}

/// Find the `)` closing an interpolation whose body starts at `start`.
fn find_interp_end(input: &str, start: usize, base: usize) -> Result<usize> {
    let bytes = input.as_bytes();
    let mut depth = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            b'"' => {
                let (_, consumed) = lex_string(input, i, base)?;
                i += consumed;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    err(base + start - 2, "unterminated string interpolation")
}

fn lex_number(input: &str, start: usize, base: usize) -> Result<(Token, usize)> {
    let bytes = input.as_bytes();
    let mut i = start;
    let mut is_float = false;

    // Leading dot (e.g., .5) means it's a float
    if i < bytes.len() && bytes[i] == b'.' {
        is_float = true;
        i += 1;
    }

    // Integer part
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }

    // Decimal point (if not already seen)
    if !is_float && i < bytes.len() && bytes[i] == b'.' {
        // Make sure this isn't a field access like 1.field
        if i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            is_float = true;
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    // Exponent
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text = &input[start..i];
    let consumed = i - start;

    if !is_float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok((Token::Int(n), consumed));
        }
    }
    // Floats, and integers too large for i64
    match text.parse::<f64>() {
        Ok(f) => Ok((Token::Float(f), consumed)),
        Err(_) => err(base + start, format!("invalid number '{text}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<Token> {
        lex(input).unwrap().into_iter().map(|l| l.token).collect()
    }

    fn path(segs: &[&str]) -> Token {
        Token::Path(segs.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn lex_identity() {
        assert_eq!(toks("."), vec![Token::Dot]);
    }

    #[test]
    fn lex_dotted_path_is_one_token() {
        assert_eq!(toks(".foo"), vec![path(&["foo"])]);
        assert_eq!(toks(".a.b.c"), vec![path(&["a", "b", "c"])]);
        assert_eq!(toks(r#"."key with space".x"#), vec![path(&["key with space", "x"])]);
    }

    #[test]
    fn lex_keywords_allowed_as_field_names() {
        assert_eq!(toks(".end.if"), vec![path(&["end", "if"])]);
    }

    #[test]
    fn lex_iterate_and_pipe() {
        assert_eq!(
            toks(".items[] | .name"),
            vec![
                path(&["items"]),
                Token::LBrack,
                Token::RBrack,
                Token::Pipe,
                path(&["name"]),
            ]
        );
    }

    #[test]
    fn lex_recurse() {
        assert_eq!(toks(".."), vec![Token::DotDot]);
        assert_eq!(toks(".[0]"), vec![Token::Dot, Token::LBrack, Token::Int(0), Token::RBrack]);
    }

    #[test]
    fn lex_select_call() {
        assert_eq!(
            toks("select(.age > 30)"),
            vec![
                Token::Ident("select".into()),
                Token::LParen,
                path(&["age"]),
                Token::Gt,
                Token::Int(30),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            toks("== != < <= > >= // + - * / % and or not"),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::DoubleSlash,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::And,
                Token::Or,
                Token::Not,
            ]
        );
    }

    #[test]
    fn lex_assignment_operators() {
        assert_eq!(
            toks("= |= += -= *= /= %= //="),
            vec![
                Token::Assign,
                Token::UpdateAssign,
                Token::PlusAssign,
                Token::MinusAssign,
                Token::StarAssign,
                Token::SlashAssign,
                Token::PercentAssign,
                Token::AltAssign,
            ]
        );
    }

    #[test]
    fn lex_numbers() {
        assert_eq!(toks("42"), vec![Token::Int(42)]);
        assert_eq!(toks("3.14"), vec![Token::Float(3.14)]);
        assert_eq!(toks(".5"), vec![Token::Float(0.5)]);
        assert_eq!(toks("1e3"), vec![Token::Float(1000.0)]);
        assert_eq!(toks("99999999999999999999"), vec![Token::Float(1e20)]);
        // Minus is always an operator; the parser folds literals.
        assert_eq!(toks("-1"), vec![Token::Minus, Token::Int(1)]);
    }

    #[test]
    fn lex_strings_and_escapes() {
        assert_eq!(toks(r#""hello""#), vec![Token::Str("hello".into())]);
        assert_eq!(toks(r#""a\"b\né""#), vec![Token::Str("a\"b\né".into())]);
        assert_eq!(toks(r#""😀""#), vec![Token::Str("😀".into())]);
        assert_eq!(toks(r#""héllo""#), vec![Token::Str("héllo".into())]);
    }

    #[test]
    fn lex_interpolation() {
        assert_eq!(
            toks(r#""x=\(.a + (1)) y""#),
            vec![Token::Interp(vec![
                InterpPart::Lit("x=".into()),
                InterpPart::Expr {
                    src: ".a + (1)".into(),
                    offset: 5,
                },
                InterpPart::Lit(" y".into()),
            ])]
        );
    }

    #[test]
    fn lex_vars_formats_and_keywords() {
        assert_eq!(
            toks("reduce .[] as $x (0; . + $x) | @base64"),
            vec![
                Token::Reduce,
                Token::Dot,
                Token::LBrack,
                Token::RBrack,
                Token::As,
                Token::Var("x".into()),
                Token::LParen,
                Token::Int(0),
                Token::Semicolon,
                Token::Dot,
                Token::Plus,
                Token::Var("x".into()),
                Token::RParen,
                Token::Pipe,
                Token::Format("base64".into()),
            ]
        );
    }

    #[test]
    fn lex_module_qualified_ident() {
        assert_eq!(toks("lib::f"), vec![Token::Ident("lib::f".into())]);
    }

    #[test]
    fn lex_comment() {
        assert_eq!(toks(". # trailing\n| .a"), vec![Token::Dot, Token::Pipe, path(&["a"])]);
    }

    #[test]
    fn lex_offsets() {
        let lexemes = lex(".a | length").unwrap();
        let offsets: Vec<usize> = lexemes.iter().map(|l| l.offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
    }

    #[test]
    fn lex_errors() {
        let e = lex(r#".a == "open"#).unwrap_err();
        assert_eq!(e.offset, 6);
        assert_eq!(e.message, "unterminated string");

        let e = lex(".a ^ 1").unwrap_err();
        assert_eq!(e.offset, 3);

        assert!(lex(r#""\q""#).is_err());
        assert!(lex(r#""\(.a""#).is_err());
        assert!(lex("$ x").is_err());
    }
}
