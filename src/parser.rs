/// A recursive descent parser for message selectors.
///
/// Grammar of selector syntax, lowest precedence first:
///
/// or_expr   -> and_expr ( "OR" and_expr )*
/// and_expr  -> not_expr ( "AND" not_expr )*
/// not_expr  -> "NOT" not_expr | predicate
/// predicate -> add_expr ( comp_op add_expr
///                       | "NOT"? "BETWEEN" add_expr "AND" add_expr
///                       | "NOT"? "IN" "(" in_literal ( "," in_literal )* ")"
///                       | "NOT"? "LIKE" STRING ( "ESCAPE" STRING )?
///                       | "IS" "NOT"? "NULL" )?
/// add_expr  -> mul_expr ( ( "+" | "-" ) mul_expr )*
/// mul_expr  -> primary ( ( "*" | "/" ) primary )*
/// primary   -> literal | IDENTIFIER | "(" or_expr ")" | ( "+" | "-" ) primary
/// in_literal -> STRING | ( "+" | "-" )? ( LONG | DOUBLE ) | "TRUE" | "FALSE"
///
/// Comparisons do not associate: the operands of a comparison are arithmetic
/// expressions, so "a = b = c" is rejected.
///
/// Examples: "age > 30 AND (color = 'red' OR color = 'blue')", "name LIKE 'A%'",
/// "price * quantity BETWEEN 10 AND 20", "region NOT IN ('EU', 'US')"

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ParseError;
use crate::expr::{BinaryOp, Expr, LikePattern, LikePatternError, UnaryOp};
use crate::scanner::Token;
use crate::token_type::TokenType::{self, *};
use crate::value::Value;

/// Result of a successful parse: the tree and every distinct identifier it
/// references, in order of first appearance.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub expr: Expr,
    pub identifiers: Vec<Arc<str>>,
}

/// Deepest expression tree the parser will build. Parsing, evaluating and
/// dropping a tree all recurse once per level, so this bounds their stack use.
pub const MAX_DEPTH: usize = 256;

/// A subtree under construction and its height.
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Node { expr, height: 1 }
    }
}

/// Parses a complete token stream, as produced by `scanner::tokenize`.
pub fn parse(tokens: &[Token]) -> Result<Parsed, ParseError> {
    Parser::new(tokens)?.parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    identifiers: Vec<Arc<str>>,
    interned: HashMap<&'a str, Arc<str>>,
    nesting: usize, // open parentheses, NOT and sign operators
}

impl<'a> Parser<'a> {

    /// The token stream must be terminated by an EOF token.
    pub fn new(tokens: &'a [Token]) -> Result<Self, ParseError> {
        match tokens.last() {
            Some(token) if token.variant == EOF => Ok(Parser {
                tokens,
                current: 0,
                identifiers: Vec::new(),
                interned: HashMap::new(),
                nesting: 0,
            }),
            _ => Err(ParseError {
                message: "Token stream is not terminated".to_string(),
                position: tokens.last().map(|t| t.position).unwrap_or_default(),
            }),
        }
    }

    /// Parses all tokens to return a syntax tree. Aborts on the first error.
    pub fn parse(mut self) -> Result<Parsed, ParseError> {
        if self.at_end() {
            return Err(self.error("Expected expression, found empty selector".to_string()));
        }
        let node = self.or_expr()?;
        if !self.at_end() {
            // Ex.: "a = 1 b = 2" or "a = b = c"
            let msg = format!("Expected AND, OR or end of input, found {}", self.describe_current());
            return Err(self.error(msg));
        }
        Ok(Parsed { expr: node.expr, identifiers: self.identifiers })
    }

    /// Matches production: or_expr -> and_expr ( "OR" and_expr )*
    fn or_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.and_expr()?;
        while self.match_token(&[Or]) {
            let right = self.and_expr()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    /// Matches production: and_expr -> not_expr ( "AND" not_expr )*
    fn and_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.not_expr()?;
        while self.match_token(&[And]) {
            let right = self.not_expr()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    /// Matches production: not_expr -> "NOT" not_expr | predicate
    fn not_expr(&mut self) -> Result<Node, ParseError> {
        if self.match_token(&[Not]) {
            self.enter()?;
            let operand = self.not_expr()?;
            self.leave();
            return self.unary(UnaryOp::Not, operand)
        }
        self.predicate()
    }

    /// Matches production: predicate -> add_expr ( comparison | between | in | like | is_null )?
    fn predicate(&mut self) -> Result<Node, ParseError> {
        let left = self.add_expr()?;

        if let Some(op) = self.comparison_operator() {
            let right = self.add_expr()?;
            return self.binary(op, left, right)
        }

        if self.match_token(&[Is]) {
            let op = if self.match_token(&[Not]) { UnaryOp::IsNotNull } else { UnaryOp::IsNull };
            self.consume(Null)?;
            return self.unary(op, left)
        }

        // NOT is only legal here in front of BETWEEN, IN or LIKE
        let negated = if self.check(&Not) {
            match self.peek_next().variant {
                Between | In | Like => { self.advance(); true },
                _ => {
                    let msg = format!("Expected BETWEEN, IN or LIKE after NOT, found {}", self.describe_next());
                    self.advance();
                    return Err(self.error(msg))
                }
            }
        } else {
            false
        };

        if self.match_token(&[Between]) {
            self.between(left, negated)
        } else if self.match_token(&[In]) {
            self.in_list(left, negated)
        } else if self.match_token(&[Like]) {
            self.like(left, negated)
        } else {
            Ok(left)
        }
    }

    fn comparison_operator(&mut self) -> Option<BinaryOp> {
        let op = match self.peek().variant {
            Equal => BinaryOp::Eq,
            NotEqual => BinaryOp::Neq,
            Greater => BinaryOp::Gt,
            GreaterEqual => BinaryOp::Ge,
            Less => BinaryOp::Lt,
            LessEqual => BinaryOp::Le,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Matches: add_expr "BETWEEN" add_expr "AND" add_expr
    /// Ex.: "price BETWEEN 10 AND 20"
    fn between(&mut self, operand: Node, negated: bool) -> Result<Node, ParseError> {
        let low = self.add_expr()?;
        self.consume(And)?;
        let high = self.add_expr()?;
        let height = operand.height.max(low.height).max(high.height) + 1;
        let expr = Expr::Between {
            operand: Box::new(operand.expr),
            low: Box::new(low.expr),
            high: Box::new(high.expr),
            negated,
        };
        self.node(expr, height)
    }

    /// Matches: add_expr "IN" "(" in_literal ( "," in_literal )* ")"
    /// Ex.: "color IN ('red', 'blue')"
    fn in_list(&mut self, operand: Node, negated: bool) -> Result<Node, ParseError> {
        self.consume(LeftParen)?;
        let mut list = vec![self.in_literal()?];
        while self.match_token(&[Comma]) {
            list.push(self.in_literal()?);
        }
        self.consume(RightParen)?;
        let height = operand.height + 1;
        self.node(Expr::In { operand: Box::new(operand.expr), list, negated }, height)
    }

    /// Matches production: in_literal -> STRING | ( "+" | "-" )? ( LONG | DOUBLE ) | "TRUE" | "FALSE"
    fn in_literal(&mut self) -> Result<Value, ParseError> {
        let sign = if self.match_token(&[Minus]) {
            Some(true)
        } else if self.match_token(&[Plus]) {
            Some(false)
        } else {
            None
        };

        let token = self.peek();
        let value = match (token.variant, &token.literal, sign) {
            (Long, Some(Value::Long(n)), Some(true)) => Value::Long(-n),
            (Double, Some(Value::Double(x)), Some(true)) => Value::Double(-x),
            (Long | Double, Some(value), _) => value.clone(),
            (Str, Some(value), None) => value.clone(),
            (True, _, None) => Value::Bool(true),
            (False, _, None) => Value::Bool(false),
            _ => {
                let msg = format!("Expected string, number or boolean literal, found {}", self.describe_current());
                return Err(self.error(msg))
            }
        };
        self.advance();
        Ok(value)
    }

    /// Matches: add_expr "LIKE" STRING ( "ESCAPE" STRING )?
    /// Ex.: "name LIKE 'A%'" or "code LIKE '100!%' ESCAPE '!'"
    fn like(&mut self, operand: Node, negated: bool) -> Result<Node, ParseError> {
        let pattern_token = self.peek().clone();
        let pattern = self.string_literal()?;

        let escape = if self.match_token(&[Escape]) {
            let escape_token = self.peek().clone();
            let escape = self.string_literal()?;
            let mut chars = escape.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => {
                    return Err(ParseError {
                        message: "ESCAPE must be a single character".to_string(),
                        position: escape_token.position,
                    })
                }
            }
        } else {
            None
        };

        let pattern = LikePattern::new(&pattern, escape).map_err(|e| ParseError {
            message: match e {
                LikePatternError::DanglingEscape => "LIKE pattern ends with the escape character".to_string(),
                LikePatternError::Regex(msg) => format!("Invalid LIKE pattern: {}", msg),
            },
            position: pattern_token.position,
        })?;
        let height = operand.height + 1;
        self.node(Expr::Like { operand: Box::new(operand.expr), pattern, negated }, height)
    }

    fn string_literal(&mut self) -> Result<String, ParseError> {
        if let Some(Value::Str(s)) = &self.peek().literal {
            let s = s.clone();
            self.advance();
            return Ok(s)
        }
        let msg = format!("Expected string, found {}", self.describe_current());
        Err(self.error(msg))
    }

    /// Matches production: add_expr -> mul_expr ( ( "+" | "-" ) mul_expr )*
    fn add_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.mul_expr()?;
        loop {
            let op = if self.match_token(&[Plus]) {
                BinaryOp::Add
            } else if self.match_token(&[Minus]) {
                BinaryOp::Sub
            } else {
                break
            };
            let right = self.mul_expr()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    /// Matches production: mul_expr -> primary ( ( "*" | "/" ) primary )*
    fn mul_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.primary()?;
        loop {
            let op = if self.match_token(&[Star]) {
                BinaryOp::Mul
            } else if self.match_token(&[Slash]) {
                BinaryOp::Div
            } else {
                break
            };
            let right = self.primary()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    /// Matches production: primary -> literal | IDENTIFIER | "(" or_expr ")" | ( "+" | "-" ) primary
    fn primary(&mut self) -> Result<Node, ParseError> {
        let token = self.peek();
        let expr = match token.variant {
            Long | Double | Str => match &token.literal {
                Some(value) => Expr::Literal(value.clone()),
                None => return Err(self.error("Literal token without a value".to_string())),
            },
            True => Expr::Literal(Value::Bool(true)),
            False => Expr::Literal(Value::Bool(false)),
            Null => Expr::Literal(Value::Null),
            Identifier => {
                let name = self.intern(token);
                Expr::Identifier(name)
            }
            Minus | Plus => {
                let op = if token.variant == Minus { UnaryOp::Neg } else { UnaryOp::Plus };
                self.advance();
                self.enter()?;
                let operand = self.primary()?;
                self.leave();
                return self.unary(op, operand)
            }
            LeftParen => {
                self.advance();
                self.enter()?;
                let node = self.or_expr()?;
                self.leave();
                self.consume(RightParen)?;
                return Ok(node)
            }
            _ => {
                let msg = format!("Expected expression, found {}", self.describe_current());
                return Err(self.error(msg))
            }
        };
        self.advance();
        Ok(Node::leaf(expr))
    }

    fn unary(&self, op: UnaryOp, operand: Node) -> Result<Node, ParseError> {
        let height = operand.height + 1;
        self.node(Expr::Unary { op, operand: Box::new(operand.expr) }, height)
    }

    fn binary(&self, op: BinaryOp, left: Node, right: Node) -> Result<Node, ParseError> {
        let height = left.height.max(right.height) + 1;
        let expr = Expr::Binary { op, left: Box::new(left.expr), right: Box::new(right.expr) };
        self.node(expr, height)
    }

    fn node(&self, expr: Expr, height: usize) -> Result<Node, ParseError> {
        if height > MAX_DEPTH {
            return Err(self.too_deep())
        }
        Ok(Node { expr, height })
    }

    /// Guards recursion into a nested sub-expression; pair with `leave`.
    fn enter(&mut self) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(self.too_deep())
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn too_deep(&self) -> ParseError {
        self.error("Selector is nested too deeply".to_string())
    }

    /// Returns the one shared name for an identifier, recording it on first use.
    fn intern(&mut self, token: &'a Token) -> Arc<str> {
        if let Some(name) = self.interned.get(token.lexeme.as_str()) {
            return Arc::clone(name)
        }
        let name: Arc<str> = Arc::from(token.lexeme.as_str());
        self.interned.insert(token.lexeme.as_str(), Arc::clone(&name));
        self.identifiers.push(Arc::clone(&name));
        name
    }

    fn consume(&mut self, token_type: TokenType) -> Result<(), ParseError> {
        if self.match_token(&[token_type]) {
            return Ok(())
        }
        let msg = format!("Expected {}, found {}", token_type, self.describe_current());
        Err(self.error(msg))
    }

    fn match_token(&mut self, token_types: &[TokenType]) -> bool {
        for token_type in token_types {
            if self.check(token_type) {
                self.advance();
                return true
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        self.peek().variant == *token_type
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.current += 1;
        }
    }

    fn peek(&self) -> &'a Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> &'a Token {
        let next = (self.current + 1).min(self.tokens.len() - 1);
        &self.tokens[next]
    }

    fn at_end(&self) -> bool {
        self.peek().variant == EOF
    }

    fn describe_current(&self) -> String {
        describe(self.peek())
    }

    fn describe_next(&self) -> String {
        describe(self.peek_next())
    }

    /// Creates a ParseError located at the current token.
    fn error(&self, message: String) -> ParseError {
        ParseError { message, position: self.peek().position }
    }
}

fn describe(token: &Token) -> String {
    match token.variant {
        EOF => token.variant.to_string(),
        _ => format!("'{}'", token.lexeme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tokenize;

    fn run(source: &str) -> Result<Parsed, ParseError> {
        let tokens = tokenize(source).expect("test input should lex");
        parse(&tokens)
    }

    fn render(source: &str) -> String {
        run(source).unwrap().expr.to_string()
    }

    #[test]
    fn test_valid_input() {
        let cases = vec![
            "a = 1",
            "age > 30 AND (color = 'red' OR color = 'blue')",
            "4 + 2 * 3 / 2 = 7",
            "4 * ((-2 / -1) - 4) = -8",
            "-12345 = -1 * 12345",
            "NOT NOT a = 1",
            "a BETWEEN 1 AND 10",
            "a NOT BETWEEN -1 AND +1.5e3",
            "a IN ('x', 'y')",
            "a NOT IN (1, -2, 3.5, TRUE)",
            "a LIKE 'A%'",
            "a NOT LIKE 'A!%' ESCAPE '!'",
            "a IS NULL",
            "a IS NOT NULL OR b IS NULL",
            "active",
            "TRUE",
            "(a = 1) = TRUE",
            "$x_1 <> 'y'",
            "a between 1 and 2 and b like 'c' or not c in ('d')",
        ];

        for case in cases {
            let result = run(case);
            assert!(result.is_ok(), "Failed to parse valid input {:?}: {:?}", case, result);
        }
    }

    #[test]
    fn test_invalid_input() {
        let cases = vec![
            "",
            "a = b = c",
            "a < b > c",
            "a =",
            "a = 1 b = 2",
            "(a = 1",
            "a = 1)",
            "()",
            "a AND",
            "OR a",
            "a BETWEEN 1",
            "a BETWEEN 1 OR 2",
            "a IN ()",
            "a IN (b)",
            "a IN ('x',)",
            "a IN 'x'",
            "a IN (-'x')",
            "a LIKE b",
            "a LIKE 'x' ESCAPE 'ab'",
            "a LIKE 'x' ESCAPE ''",
            "a LIKE 'x!' ESCAPE '!'",
            "a IS 1",
            "a IS NOT",
            "a NOT = 1",
            "a NOT NULL",
            "NOT",
            "a LIKE 'x' LIKE 'y'",
            "a IS NULL IS NULL",
        ];

        for case in cases {
            let result = run(case);
            assert!(result.is_err(), "Expected parse to fail. Input: {}, Got: {:?}", case, result);
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(render("a + b * c"), "(a + (b * c))");
        assert_eq!(render("a - b - c"), "((a - b) - c)");
        assert_eq!(render("a / b * c"), "((a / b) * c)");
        assert_eq!(render("a OR b AND c"), "(a OR (b AND c))");
        assert_eq!(render("a AND b AND c"), "((a AND b) AND c)");
        assert_eq!(render("NOT a = 1 AND b"), "((NOT (a = 1)) AND b)");
        assert_eq!(render("NOT NOT a = 1"), "(NOT (NOT (a = 1)))");
        assert_eq!(render("- - a"), "(- (- a))");
        assert_eq!(render("-a * b"), "((- a) * b)");
        assert_eq!(render("a + 1 BETWEEN b AND c * 2"), "((a + 1) BETWEEN b AND (c * 2))");
        assert_eq!(render("a IS NOT NULL"), "(a IS NOT NULL)");
        assert_eq!(render("a NOT IN (-1, 'x')"), "(a NOT IN (-1, 'x'))");
    }

    #[test]
    fn test_identifiers_are_shared() {
        let parsed = run("a = 1 OR b = 2 OR a = 3 OR A = 4").unwrap();
        let names: Vec<&str> = parsed.identifiers.iter().map(|n| n.as_ref()).collect();
        assert_eq!(names, vec!["a", "b", "A"]);

        let mut occurrences = Vec::new();
        collect_identifiers(&parsed.expr, &mut occurrences);
        let a: Vec<&Arc<str>> = occurrences.iter().filter(|n| n.as_ref() == "a").collect();
        assert_eq!(a.len(), 2);
        assert!(Arc::ptr_eq(a[0], a[1]));
        assert!(Arc::ptr_eq(a[0], &parsed.identifiers[0]));
    }

    fn collect_identifiers(expr: &Expr, out: &mut Vec<Arc<str>>) {
        match expr {
            Expr::Identifier(name) => out.push(Arc::clone(name)),
            Expr::Literal(_) => {}
            Expr::Unary { operand, .. } | Expr::In { operand, .. } | Expr::Like { operand, .. } => {
                collect_identifiers(operand, out)
            }
            Expr::Binary { left, right, .. } => {
                collect_identifiers(left, out);
                collect_identifiers(right, out);
            }
            Expr::Between { operand, low, high, .. } => {
                collect_identifiers(operand, out);
                collect_identifiers(low, out);
                collect_identifiers(high, out);
            }
        }
    }

    #[test]
    fn test_error_positions() {
        let error = run("a = b = c").unwrap_err();
        assert_eq!(error.position.column, 7);
        assert!(error.message.contains("'='"), "{}", error.message);

        let error = run("(a = 1").unwrap_err();
        assert_eq!(error.position.offset, 6);
        assert_eq!(error.message, "Expected ')', found end of input");

        let error = run("a LIKE 'x' ESCAPE 'ab'").unwrap_err();
        assert_eq!(error.position.column, 19);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("{}a = 1{}", "(".repeat(10_000), ")".repeat(10_000));
        let error = run(&source).unwrap_err();
        assert_eq!(error.message, "Selector is nested too deeply");

        let source = format!("{}a = 1", "NOT ".repeat(10_000));
        assert!(run(&source).is_err());

        let source = format!("{}1 = 1", "- ".repeat(10_000));
        assert!(run(&source).is_err());
    }

    #[test]
    fn test_long_chains_are_rejected() {
        let source = vec!["a = 1"; 100_000].join(" OR ");
        let error = run(&source).unwrap_err();
        assert_eq!(error.message, "Selector is nested too deeply");

        let source = format!("a = {}", vec!["1"; 100_000].join(" + "));
        assert!(run(&source).is_err());
    }

    #[test]
    fn test_depth_limit_counts_every_level() {
        // comparisons have height 2, each OR adds a level
        let source = vec!["a = 1"; MAX_DEPTH - 1].join(" OR ");
        assert!(run(&source).is_ok());
        let source = vec!["a = 1"; MAX_DEPTH].join(" OR ");
        assert!(run(&source).is_err());

        // chains inside nested groups add up
        let group = vec!["a"; 200].join(" + ");
        let source = format!("({}){} = 1", group, " + 1".repeat(100));
        assert!(run(&source).is_err());
        let source = format!("({}) = 1", group);
        assert!(run(&source).is_ok());
    }

    #[test]
    fn test_display_reparses() {
        let source = "a + -2 * b NOT BETWEEN 1 AND 2.5 OR c LIKE 'it''s%' ESCAPE '$' AND d IS NULL";
        let first = run(source).unwrap().expr;
        let second = run(&first.to_string()).unwrap().expr;
        assert_eq!(first, second);
    }
}
