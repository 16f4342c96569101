/// jq builtin functions: the native table and a dispatcher to category
/// sub-modules.
mod arrays;
mod math;
mod strings;
mod types;

use crate::filter::{EvalError, Filter};
use crate::value::Value;

/// A builtin the native evaluator implements, keyed by name and arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    // Types, objects and conversion
    Length,
    Type,
    Empty,
    Error,
    ErrorWith,
    Keys,
    KeysUnsorted,
    Values,
    Has,
    Contains,
    Del,
    ToEntries,
    FromEntries,
    WithEntries,
    ToString,
    ToNumber,
    ToJson,
    FromJson,

    // Arrays and collections
    Add,
    Min,
    Max,
    MinBy,
    MaxBy,
    Sort,
    SortBy,
    Unique,
    UniqueBy,
    GroupBy,
    Map,
    MapValues,
    Flatten,
    FlattenDepth,
    Reverse,
    First,
    Last,
    FirstOf,
    LastOf,
    Any,
    All,
    AnyOf,
    AllOf,

    // Strings
    Split,
    Join,
    AsciiUpcase,
    AsciiDowncase,
    StartsWith,
    EndsWith,
    LtrimStr,
    RtrimStr,

    // Math
    Floor,
    Ceil,
    Round,
    Sqrt,
}

/// Look up a native builtin. `None` means the native evaluator cannot run
/// this call, even when jq knows it.
pub fn lookup_native(name: &str, arity: usize) -> Option<Builtin> {
    use Builtin::*;
    Some(match (name, arity) {
        ("length", 0) => Length,
        ("type", 0) => Type,
        ("empty", 0) => Empty,
        ("error", 0) => Error,
        ("error", 1) => ErrorWith,
        ("keys", 0) => Keys,
        ("keys_unsorted", 0) => KeysUnsorted,
        ("values", 0) => Values,
        ("has", 1) => Has,
        ("contains", 1) => Contains,
        ("del", 1) => Del,
        ("to_entries", 0) => ToEntries,
        ("from_entries", 0) => FromEntries,
        ("with_entries", 1) => WithEntries,
        ("tostring", 0) => ToString,
        ("tonumber", 0) => ToNumber,
        ("tojson", 0) => ToJson,
        ("fromjson", 0) => FromJson,

        ("add", 0) => Add,
        ("min", 0) => Min,
        ("max", 0) => Max,
        ("min_by", 1) => MinBy,
        ("max_by", 1) => MaxBy,
        ("sort", 0) => Sort,
        ("sort_by", 1) => SortBy,
        ("unique", 0) => Unique,
        ("unique_by", 1) => UniqueBy,
        ("group_by", 1) => GroupBy,
        ("map", 1) => Map,
        ("map_values", 1) => MapValues,
        ("flatten", 0) => Flatten,
        ("flatten", 1) => FlattenDepth,
        ("reverse", 0) => Reverse,
        ("first", 0) => First,
        ("last", 0) => Last,
        ("first", 1) => FirstOf,
        ("last", 1) => LastOf,
        ("any", 0) => Any,
        ("all", 0) => All,
        ("any", 1) => AnyOf,
        ("all", 1) => AllOf,

        ("split", 1) => Split,
        ("join", 1) => Join,
        ("ascii_upcase", 0) => AsciiUpcase,
        ("ascii_downcase", 0) => AsciiDowncase,
        ("startswith", 1) => StartsWith,
        ("endswith", 1) => EndsWith,
        ("ltrimstr", 1) => LtrimStr,
        ("rtrimstr", 1) => RtrimStr,

        ("floor", 0) => Floor,
        ("ceil", 0) => Ceil,
        ("round", 0) => Round,
        ("sqrt", 0) => Sqrt,
        _ => return None,
    })
}

/// True when jq 1.7 itself defines `name/arity`. Calls to anything else
/// (outside the program's own `def`s) are parse errors; calls jq knows but
/// [`lookup_native`] does not go to the wrapper.
pub fn is_jq_builtin(name: &str, arity: usize) -> bool {
    match arity {
        0 => matches!(
            name,
            "length" | "utf8bytelength" | "not" | "type" | "empty" | "error" | "halt"
                | "halt_error" | "builtins" | "input" | "inputs" | "debug" | "stderr"
                | "input_filename" | "input_line_number" | "env" | "get_search_list"
                | "get_prog_origin" | "get_jq_origin" | "have_literal_numbers"
                | "have_decnum" | "infinite" | "nan" | "isinfinite" | "isnan" | "isnormal"
                | "values" | "nulls" | "booleans" | "numbers" | "strings" | "arrays"
                | "objects" | "iterables" | "scalars" | "finites" | "normals" | "toarray"
                | "keys" | "keys_unsorted" | "to_entries" | "from_entries" | "paths"
                | "leaf_paths" | "tostream" | "recurse" | "add" | "any" | "all" | "flatten"
                | "sort" | "unique" | "min" | "max" | "reverse" | "first" | "last"
                | "combinations" | "transpose" | "tojson" | "fromjson" | "abs" | "tostring"
                | "tonumber" | "ascii_downcase" | "ascii_upcase" | "trim" | "ltrim" | "rtrim"
                | "explode" | "implode" | "ascii" | "todate" | "fromdate" | "now" | "date"
                | "mktime" | "gmtime" | "localtime" | "todateiso8601" | "fromdateiso8601"
                | "dateiso8601" | "floor" | "ceil" | "round" | "sqrt" | "fabs" | "trunc"
                | "acos" | "acosh" | "asin" | "asinh" | "atan" | "atanh" | "cbrt" | "cos"
                | "cosh" | "exp" | "exp10" | "exp2" | "expm1" | "gamma" | "j0" | "j1"
                | "lgamma" | "log" | "log10" | "log1p" | "log2" | "logb" | "nearbyint"
                | "pow10" | "rint" | "significand" | "sin" | "sinh" | "tan" | "tanh"
                | "tgamma" | "y0" | "y1" | "frexp" | "modf" | "lgamma_r"
        ),
        1 => matches!(
            name,
            "error" | "halt_error" | "debug" | "isvalid" | "select" | "has" | "in"
                | "inside" | "contains" | "with_entries" | "path" | "paths" | "getpath"
                | "delpaths" | "del" | "pick" | "fromstream" | "truncate_stream" | "recurse"
                | "walk" | "map_values" | "map" | "any" | "all" | "range" | "flatten"
                | "sort_by" | "group_by" | "unique_by" | "min_by" | "max_by" | "indices"
                | "index" | "rindex" | "first" | "last" | "nth" | "repeat" | "isempty"
                | "combinations" | "bsearch" | "IN" | "INDEX" | "splits" | "ltrimstr"
                | "rtrimstr" | "startswith" | "endswith" | "split" | "join" | "test"
                | "match" | "capture" | "scan" | "strftime" | "strflocaltime" | "strptime"
                | "date"
        ),
        2 => matches!(
            name,
            "setpath" | "any" | "all" | "range" | "nth" | "limit" | "until" | "while" | "IN"
                | "INDEX" | "JOIN" | "recurse" | "splits" | "split" | "test" | "match"
                | "capture" | "scan" | "sub" | "gsub" | "dateadd" | "datesub" | "pow" | "atan2"
                | "copysign" | "drem" | "fdim" | "fmax" | "fmin" | "fmod" | "hypot" | "ldexp"
                | "nextafter" | "nexttoward" | "scalb" | "scalbln"
        ),
        3 => matches!(name, "range" | "JOIN" | "sub" | "gsub" | "fma"),
        4 => name == "JOIN",
        _ => false,
    }
}

pub(super) fn call_builtin(
    builtin: Builtin,
    args: &[Filter],
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    use Builtin::*;
    match builtin {
        Length | Type | Empty | Error | ErrorWith | Keys | KeysUnsorted | Values | Has
        | Contains | Del | ToEntries | FromEntries | WithEntries | ToString | ToNumber
        | ToJson | FromJson => types::call(builtin, args, input, output),

        Add | Min | Max | MinBy | MaxBy | Sort | SortBy | Unique | UniqueBy | GroupBy | Map
        | MapValues | Flatten | FlattenDepth | Reverse | First | Last | FirstOf | LastOf
        | Any | All | AnyOf | AllOf => arrays::call(builtin, args, input, output),

        Split | Join | AsciiUpcase | AsciiDowncase | StartsWith | EndsWith | LtrimStr
        | RtrimStr => strings::call(builtin, args, input, output),

        Floor | Ceil | Round | Sqrt => math::call(builtin, input, output),
    }
}

/// Evaluate a value argument and call `f` once per output, jq style:
/// `startswith("a", "b")` runs twice.
pub(super) fn for_each_arg(
    arg: Option<&Filter>,
    input: &Value,
    f: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    super::eval::eval(required(arg)?, input, f)
}

pub(super) fn required(arg: Option<&Filter>) -> Result<&Filter, EvalError> {
    arg.ok_or_else(|| EvalError::runtime("missing builtin argument"))
}
