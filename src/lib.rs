//! Compiler and evaluator for SQL92-style message selectors, the boolean
//! filters a subscriber attaches to a publish/subscribe subscription, such as
//! `age > 30 AND (color = 'red' OR color = 'blue')`.
//!
//! ```
//! use message_selector::{Selector, Value};
//!
//! let selector = Selector::compile("fruit LIKE 'A%' AND price < 2.5").unwrap();
//! let matched = selector.matches(&|name| match name {
//!     "fruit" => Some(Value::from("Apple")),
//!     "price" => Some(Value::Double(1.99)),
//!     _ => None,
//! });
//! assert!(matched);
//! ```

pub mod cache;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod parser;
pub mod scanner;
pub mod selector;
pub mod token_type;
pub mod value;

pub use cache::SelectorCache;
pub use error::{LexError, ParseError, Position, SelectorError};
pub use evaluator::evaluate;
pub use expr::Expr;
pub use selector::Selector;
pub use value::Value;
