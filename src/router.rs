//! Native/wrapper routing.
//!
//! The decision is a pure function of the parsed expression, made once before
//! any input is read. It is an allow-list walk: every node must be one the
//! native evaluator implements, otherwise the whole expression goes to the
//! wrapper.

use thiserror::Error;

use crate::filter::{Filter, lookup_native};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Native,
    Wrapper,
}

/// How the caller wants routing done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteMode {
    #[default]
    Auto,
    /// `--native`: fail instead of delegating.
    ForceNative,
    /// `--wrapper`: delegate even when native would do.
    ForceWrapper,
}

/// The classification plus the first construct that forced the wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub route: Route,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expression uses {construct}, which the native evaluator does not support")]
pub struct RouteError {
    pub construct: String,
}

/// Classify an expression.
pub fn classify(filter: &Filter) -> Decision {
    match unsupported(filter) {
        None => Decision {
            route: Route::Native,
            reason: None,
        },
        Some(reason) => Decision {
            route: Route::Wrapper,
            reason: Some(reason),
        },
    }
}

/// Apply a [`RouteMode`] to an expression.
pub fn route(filter: &Filter, mode: RouteMode) -> Result<Decision, RouteError> {
    match mode {
        RouteMode::ForceWrapper => Ok(Decision {
            route: Route::Wrapper,
            reason: Some("--wrapper".into()),
        }),
        RouteMode::Auto => Ok(classify(filter)),
        RouteMode::ForceNative => {
            let decision = classify(filter);
            if decision.route == Route::Wrapper {
                return Err(RouteError {
                    construct: decision.reason.unwrap_or_default(),
                });
            }
            Ok(decision)
        }
    }
}

/// The first wrapper-only construct in `filter`, or `None` if every node is
/// natively supported.
fn unsupported(filter: &Filter) -> Option<String> {
    match filter {
        Filter::Identity | Filter::Field(_) | Filter::Path(_) | Filter::Literal(_) => None,

        Filter::Iterate(inner)
        | Filter::Select(inner)
        | Filter::Not(inner)
        | Filter::Neg(inner)
        | Filter::Try(inner) => unsupported(inner),

        Filter::Index(a, b)
        | Filter::Pipe(a, b)
        | Filter::Alternative(a, b)
        | Filter::BinaryOp(_, a, b) => unsupported(a).or_else(|| unsupported(b)),

        Filter::Slice(base, from, to) => unsupported(base)
            .or_else(|| from.as_deref().and_then(unsupported))
            .or_else(|| to.as_deref().and_then(unsupported)),

        Filter::If(c, t, e) => unsupported(c)
            .or_else(|| unsupported(t))
            .or_else(|| unsupported(e)),

        Filter::Comma(items) | Filter::ArrayConstruct(items) => {
            items.iter().find_map(unsupported)
        }

        Filter::ObjectConstruct(pairs) => pairs
            .iter()
            .find_map(|(k, v)| unsupported(k).or_else(|| unsupported(v))),

        Filter::Call(name, args) => {
            if lookup_native(name, args.len()).is_none() {
                return Some(format!("{name}/{}", args.len()));
            }
            if name == "del" {
                if let Some(reason) = args.first().and_then(unsupported_path) {
                    return Some(reason);
                }
            }
            args.iter().find_map(unsupported)
        }

        Filter::Recurse => Some("..".into()),
        Filter::Var(name) => Some(format!("${name}")),
        Filter::Bind(..) => Some("variable binding".into()),
        Filter::Reduce(..) => Some("reduce".into()),
        Filter::Foreach(..) => Some("foreach".into()),
        Filter::Def { name, .. } => Some(format!("def {name}")),
        Filter::TryCatch(..) => Some("try/catch".into()),
        Filter::Label(..) | Filter::Break(_) => Some("label/break".into()),
        Filter::Assign(..) => Some("assignment".into()),
        Filter::Format(name, _) => Some(format!("@{name}")),
        Filter::StringInterp(_) => Some("string interpolation".into()),
        Filter::Import(..) => Some("modules".into()),
    }
}

/// `del` only runs natively on path expressions the native path walker
/// understands.
fn unsupported_path(filter: &Filter) -> Option<String> {
    match filter {
        Filter::Identity | Filter::Field(_) | Filter::Path(_) => None,
        Filter::Index(base, _) | Filter::Iterate(base) | Filter::Slice(base, _, _) => {
            unsupported_path(base)
        }
        Filter::Select(_) => None,
        Filter::Try(inner) => unsupported_path(inner),
        Filter::Pipe(a, b) => unsupported_path(a).or_else(|| unsupported_path(b)),
        Filter::Comma(items) => items.iter().find_map(unsupported_path),
        Filter::If(_, t, e) => unsupported_path(t).or_else(|| unsupported_path(e)),
        Filter::Call(name, args) if args.is_empty() => match name.as_str() {
            "empty" | "first" | "last" => None,
            _ => Some(format!("del({name})")),
        },
        _ => Some("del with a complex path".into()),
    }
}
