use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use message_selector::error;
use message_selector::{Selector, SelectorError, Value};

const USAGE: &str = "usage: message_selector <selector> [name=value ...]";

/// Compiles a selector and evaluates it against properties given on the command line.
/// Exits with 0 on a match, 1 otherwise and 2 on a rejected selector or bad argument.
fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    let selector = match run(&args[1], true) {
        Ok(selector) => selector,
        Err(_) => return ExitCode::from(2),
    };

    let properties = match parse_properties(&args[2..]) {
        Ok(properties) => properties,
        Err(arg) => {
            eprintln!("invalid property '{}', expected name=value\n{}", arg, USAGE);
            return ExitCode::from(2);
        }
    };

    println!("{}", selector.expr());
    let result = selector.evaluate(&|name| properties.get(name).cloned());
    println!("{}", result);

    if result == Value::Bool(true) { ExitCode::SUCCESS } else { ExitCode::from(1) }
}

pub fn run(source: &str, print_error: bool) -> Result<Selector, SelectorError> {
    let result = Selector::compile(source);
    if let (Err(e), true) = (&result, print_error) {
        if error::print_error(source, e).is_err() {
            eprintln!("{}", e);
        }
    }
    result
}

fn parse_properties(args: &[String]) -> Result<HashMap<String, Value>, String> {
    let mut properties = HashMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                properties.insert(name.to_string(), parse_value(value));
            }
            _ => return Err(arg.clone()),
        }
    }
    Ok(properties)
}

/// Property values: integers, decimals, true/false, null, 'quoted' strings;
/// anything else is taken as a bare string.
fn parse_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Long(n)
    }
    if let Ok(x) = raw.parse::<f64>() {
        if x.is_finite() {
            return Value::Double(x)
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    match raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => Value::Str(quoted.replace("''", "'")),
        None => Value::Str(raw.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input() {
        let cases = vec![
            "a = 1",
            "a = -1",
            "a = 1.324",
            "a >= 10 AND b < 10",
            "a <= 10 OR b <> 10",
            "color IN ('red', 'green', 'blue')",
            "color NOT IN ('red')",
            "age BETWEEN 18 AND 65",
            "name LIKE 'J%n'",
            "name LIKE '\\_%' ESCAPE '\\'",
            "name IS NOT NULL",
            "(a = 1)",
            "(a = 1 AND b = 2) OR c = 3",
            "a = 1 AND (b = 2 OR c = 3)",
            "((a = 1))",
            "a * (b + c) / 2 > 1e3",
            "JMSPriority > 4 AND JMSType = 'car'",
        ];

        for case in cases {
            let result = run(case, false);
            assert!(result.is_ok(), "Failed to parse valid input {:?}", case);
        }
    }

    #[test]
    fn test_invalid_input() {
        let cases = vec![
            "a == 1",
            "a != 1",
            "a = 1 &",
            "a = \"x\"",
            "#a = 1",
            "a =",
            "a = 1,",
            "a = -",
            "(a = 1",
            "a = 1 b = 2",
            "[a = 1]",
            "{a = 1}",
            "()",
            "a = 'unterminated",
            "a BETWEEN 1",
            "a IN ()",
            "a LIKE 1",
        ];

        for case in cases {
            let result = run(case, false);
            assert!(result.is_err(), "Expected parse to fail. Input: {}, Got: {:?}", case, result);
        }
    }

    #[test]
    fn test_parse_properties() {
        let args: Vec<String> = ["a=1", "b=2.5", "c=TRUE", "d='x y'", "e=null", "f=plain", "g="]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let properties = parse_properties(&args).unwrap();
        assert_eq!(properties["a"], Value::Long(1));
        assert_eq!(properties["b"], Value::Double(2.5));
        assert_eq!(properties["c"], Value::Bool(true));
        assert_eq!(properties["d"], Value::from("x y"));
        assert_eq!(properties["e"], Value::Null);
        assert_eq!(properties["f"], Value::from("plain"));
        assert_eq!(properties["g"], Value::from(""));

        assert_eq!(parse_properties(&["novalue".to_string()]), Err("novalue".to_string()));
        assert_eq!(parse_properties(&["=1".to_string()]), Err("=1".to_string()));
    }

    #[test]
    fn test_parse_value_keeps_words_as_strings() {
        assert_eq!(parse_value("inf"), Value::from("inf"));
        assert_eq!(parse_value("NaN"), Value::from("NaN"));
        assert_eq!(parse_value("'it''s'"), Value::from("it's"));
    }
}
