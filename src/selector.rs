use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

use crate::error::SelectorError;
use crate::evaluator::evaluate;
use crate::expr::Expr;
use crate::parser::parse;
use crate::scanner::tokenize;
use crate::value::Value;

/// A selector compiled from its source text.
///
/// Immutable and `Send + Sync`: one instance can be evaluated against many
/// messages from many threads at once.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    expr: Expr,
    identifiers: Vec<Arc<str>>,
}

impl Selector {
    /// Compiles `source`. Lexical and syntax errors are reported here and
    /// never at evaluation time.
    pub fn compile(source: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(source)?;
        let parsed = parse(&tokens)?;
        log::debug!("compiled selector {:?} ({} identifiers)", source, parsed.identifiers.len());
        Ok(Selector {
            source: source.to_string(),
            expr: parsed.expr,
            identifiers: parsed.identifiers,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Distinct identifiers referenced by the selector, in order of first appearance.
    pub fn identifiers(&self) -> &[Arc<str>] {
        &self.identifiers
    }

    /// Evaluates the selector to TRUE, FALSE, `Null` (UNKNOWN) or, for a
    /// non-boolean selector such as `a + 1`, to a scalar.
    pub fn evaluate(&self, bind: &dyn Fn(&str) -> Option<Value>) -> Value {
        evaluate(&self.expr, bind)
    }

    /// Only an exact TRUE matches; FALSE, UNKNOWN and non-boolean results do not.
    pub fn matches(&self, bind: &dyn Fn(&str) -> Option<Value>) -> bool {
        self.evaluate(bind) == Value::Bool(true)
    }

    /// Matches against a message's property map.
    pub fn matches_properties<S: BuildHasher>(&self, properties: &HashMap<String, Value, S>) -> bool {
        self.matches(&|name| properties.get(name).cloned())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_selector_is_shareable() {
        assert_send_sync::<Selector>();
        assert_send_sync::<Expr>();
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(Selector::compile("a = 'x"), Err(SelectorError::Lex(_))));
        assert!(matches!(Selector::compile("a = = 1"), Err(SelectorError::Parse(_))));
    }

    #[test]
    fn test_identifiers() {
        let selector = Selector::compile("b > 1 AND a < 2 AND b <> 5").unwrap();
        let names: Vec<&str> = selector.identifiers().iter().map(|n| n.as_ref()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(selector.source(), "b > 1 AND a < 2 AND b <> 5");
    }

    #[test]
    fn test_matches_properties() {
        let selector = Selector::compile("age > 30 AND (color = 'red' OR color = 'blue')").unwrap();
        let mut properties = HashMap::new();
        properties.insert("age".to_string(), Value::Long(42));
        properties.insert("color".to_string(), Value::from("blue"));
        assert!(selector.matches_properties(&properties));

        properties.insert("color".to_string(), Value::from("green"));
        assert!(!selector.matches_properties(&properties));

        properties.remove("age");
        properties.insert("color".to_string(), Value::from("red"));
        assert!(!selector.matches_properties(&properties));
        assert_eq!(selector.evaluate(&|name| properties.get(name).cloned()), Value::Null);
    }

    #[test]
    fn test_non_boolean_selector_never_matches() {
        let selector = Selector::compile("a + 1").unwrap();
        assert_eq!(selector.evaluate(&|_| Some(Value::Long(1))), Value::Long(2));
        assert!(!selector.matches(&|_| Some(Value::Long(1))));
    }
}
