use crate::filter::EvalError;
use crate::filter::value_ops::{describe, f64_to_value};
use crate::value::Value;

use super::Builtin;

pub(super) fn call(
    builtin: Builtin,
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    let f = match input {
        // Integers are already integral; only sqrt has work to do.
        Value::Int(_) if builtin != Builtin::Sqrt => return output(input.clone()),
        Value::Int(_) | Value::Float(_) => input.as_f64().unwrap_or(f64::NAN),
        _ => {
            return Err(EvalError::Runtime(format!("{} number required", describe(input))));
        }
    };
    let result = match builtin {
        Builtin::Floor => f.floor(),
        Builtin::Ceil => f.ceil(),
        // Half away from zero, like C's round()
        Builtin::Round => f.round(),
        Builtin::Sqrt => f.sqrt(),
        _ => return Err(EvalError::Unsupported(format!("{builtin:?}"))),
    };
    output(f64_to_value(result))
}

#[cfg(test)]
mod tests {
    use crate::filter::eval::collect;
    use crate::filter::parse;
    use crate::input::parse_line;
    use crate::output::format_compact;

    fn ok(expr: &str, input: &str) -> Vec<String> {
        let filter = parse(expr).unwrap();
        let input = parse_line(input.as_bytes()).unwrap().unwrap();
        collect(&filter, &input).unwrap().iter().map(format_compact).collect()
    }

    #[test]
    fn rounding() {
        assert_eq!(ok("[.[] | floor]", "[1.5,-1.5,3]"), ["[1,-2,3]"]);
        assert_eq!(ok("[.[] | ceil]", "[1.5,-1.5,3]"), ["[2,-1,3]"]);
        assert_eq!(ok("[.[] | round]", "[1.5,-1.5,2.4]"), ["[2,-2,2]"]);
    }

    #[test]
    fn sqrt() {
        assert_eq!(ok("sqrt", "16"), ["4"]);
        assert_eq!(ok("sqrt", "2"), ["1.4142135623730951"]);
    }

    #[test]
    fn huge_values_stay_float() {
        assert_eq!(ok("floor", "1e300"), ["1e+300"]);
    }

    #[test]
    fn non_numbers_are_errors() {
        let filter = parse("floor").unwrap();
        let err = collect(&filter, &crate::value::Value::String("x".into())).unwrap_err();
        assert_eq!(err.to_string(), r#"string ("x") number required"#);
    }
}
