mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value_ops;

use thiserror::Error;

use crate::value::Value;

pub use builtins::{Builtin, is_jq_builtin, lookup_native};

/// Tokenizer failure: unterminated string, stray character, bad escape.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// Grammar failure, including calls to unknown functions.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

/// Anything that can go wrong turning expression text into a [`Filter`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("syntax error")]
    Lex(#[from] LexError),
    #[error("syntax error")]
    Parse(#[from] ParseError),
}

/// Per-record evaluation failure. Never fatal to the stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{0}")]
    Runtime(String),
    /// A construct the native evaluator does not implement. The router keeps
    /// these expressions away from it, so reaching this is a routing bug.
    #[error("{0} is not supported by the native evaluator")]
    Unsupported(String),
}

impl EvalError {
    pub fn runtime(message: impl Into<String>) -> Self {
        EvalError::Runtime(message.into())
    }
}

/// A destructuring pattern for `as`, `reduce` and `foreach`.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `$x`
    Var(String),
    /// `[$a, $b]`
    Array(Vec<Pattern>),
    /// `{a: $x, $y, (expr): $z}`
    Object(Vec<(Filter, Pattern)>),
}

/// One literal step of a dotted path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `.foo`, `."foo"`, `.["foo"]`
    Field(String),
    /// `.[0]`, `.[-1]`
    Index(i64),
    /// `.[]`
    Iterate,
}

/// A jq filter AST node.
///
/// Built once from the expression text and shared read-only by every record
/// evaluated against it.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Identity: `.`
    Identity,
    /// Single field access: `.foo`
    Field(String),
    /// Literal path chain from the input: `.a.b[0][]`
    Path(Vec<PathStep>),
    /// Computed index `base[idx]`. `idx` is evaluated against the original
    /// input, not against the result of `base`.
    Index(Box<Filter>, Box<Filter>),
    /// `base[]`
    Iterate(Box<Filter>),
    /// `base[from:to]`
    Slice(Box<Filter>, Option<Box<Filter>>, Option<Box<Filter>>),
    /// `select(pred)`
    Select(Box<Filter>),
    /// `{k: v, ...}`. Keys are expressions; literal keys are string literals.
    ObjectConstruct(Vec<(Filter, Filter)>),
    /// `[e1, e2, ...]`; each element may produce any number of values.
    ArrayConstruct(Vec<Filter>),
    Literal(Value),
    /// `a | b`
    Pipe(Box<Filter>, Box<Filter>),
    /// `a, b, c`
    Comma(Vec<Filter>),
    /// `if c then a else b end`. A missing `else` is identity.
    If(Box<Filter>, Box<Filter>, Box<Filter>),
    /// `a // b`
    Alternative(Box<Filter>, Box<Filter>),
    /// Comparison, boolean logic and arithmetic.
    BinaryOp(BinOp, Box<Filter>, Box<Filter>),
    /// `not`, either `x | not` or prefix `not x`
    Not(Box<Filter>),
    /// Unary minus
    Neg(Box<Filter>),
    /// `f?` and `try f`: errors in `f` end its output silently.
    Try(Box<Filter>),
    /// Function call: a builtin or a `def`'d function.
    Call(String, Vec<Filter>),

    // Constructs below are parsed so the router can see them; only the
    // wrapper evaluates them.
    /// `..`
    Recurse,
    /// `$name`
    Var(String),
    /// `source as $x | body`
    Bind(Box<Filter>, Pattern, Box<Filter>),
    /// `reduce source as $x (init; update)`
    Reduce(Box<Filter>, Pattern, Box<Filter>, Box<Filter>),
    /// `foreach source as $x (init; update; extract)`
    Foreach(Box<Filter>, Pattern, Box<Filter>, Box<Filter>, Option<Box<Filter>>),
    /// `def name(params): body; rest`
    Def {
        name: String,
        params: Vec<String>,
        body: Box<Filter>,
        rest: Box<Filter>,
    },
    /// `try body catch handler`
    TryCatch(Box<Filter>, Box<Filter>),
    /// `label $name | body`
    Label(String, Box<Filter>),
    /// `break $name`
    Break(String),
    /// `path = v`, `path |= f`, `path += v`, ...
    Assign(AssignOp, Box<Filter>, Box<Filter>),
    /// `@base64`, or `@csv "..."` applied to a string.
    Format(String, Option<Box<Filter>>),
    /// `"text \(expr) text"`
    StringInterp(Vec<StringPart>),
    /// `import "path" as name;` / `include "path";` ahead of `body`.
    Import(String, Box<Filter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Update, // |=
    Set,    // =
    Add,    // +=
    Sub,    // -=
    Mul,    // *=
    Div,    // /=
    Mod,    // %=
    Alt,    // //=
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Lit(String),
    Expr(Filter),
}

/// Lex and parse an expression.
pub fn parse(expr: &str) -> Result<Filter, FilterError> {
    let tokens = lexer::lex(expr)?;
    Ok(parser::parse(&tokens, expr.len())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reports_lex_errors() {
        let err = parse(r#".name == "bob"#).unwrap_err();
        assert!(matches!(err, FilterError::Lex(LexError { offset: 9, .. })));
    }

    #[test]
    fn parse_reports_parse_errors() {
        let err = parse(".a | (").unwrap_err();
        assert!(matches!(err, FilterError::Parse(_)));
        assert_eq!(err.to_string(), "syntax error");
    }

    #[test]
    fn error_chain_names_the_cause_once() {
        let err = parse("recurse(.a; . != null) | frobnicate").unwrap_err();
        let chain = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(chain.matches("frobnicate/0 is not defined").count(), 1, "{chain}");
        assert!(chain.starts_with("syntax error: "), "{chain}");
    }

    #[test]
    fn eval_error_messages() {
        assert_eq!(EvalError::runtime("boom").to_string(), "boom");
        assert_eq!(
            EvalError::Unsupported("reduce".into()).to_string(),
            "reduce is not supported by the native evaluator"
        );
    }
}
