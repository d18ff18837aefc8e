#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TokenType {
    #[strum(to_string = "'('")] LeftParen,
    #[strum(to_string = "')'")] RightParen,
    #[strum(to_string = "','")] Comma,
    #[strum(to_string = "'+'")] Plus,
    #[strum(to_string = "'-'")] Minus,
    #[strum(to_string = "'*'")] Star,
    #[strum(to_string = "'/'")] Slash,
    #[strum(to_string = "'='")] Equal,
    #[strum(to_string = "'<>'")] NotEqual,
    #[strum(to_string = "'>'")] Greater,
    #[strum(to_string = "'>='")] GreaterEqual,
    #[strum(to_string = "'<'")] Less,
    #[strum(to_string = "'<='")] LessEqual,
    // Keywords
    #[strum(to_string = "AND")] And,
    #[strum(to_string = "OR")] Or,
    #[strum(to_string = "NOT")] Not,
    #[strum(to_string = "BETWEEN")] Between,
    #[strum(to_string = "IN")] In,
    #[strum(to_string = "LIKE")] Like,
    #[strum(to_string = "ESCAPE")] Escape,
    #[strum(to_string = "IS")] Is,
    #[strum(to_string = "NULL")] Null,
    #[strum(to_string = "TRUE")] True,
    #[strum(to_string = "FALSE")] False,
    // Literals
    #[strum(to_string = "identifier")] Identifier,
    #[strum(to_string = "integer")] Long,
    #[strum(to_string = "number")] Double,
    #[strum(to_string = "string")] Str,
    #[strum(to_string = "end of input")] EOF,
}

/// Reserved words of the selector language. Matched case-insensitively and
/// always take priority over identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Keyword {
    And,
    Or,
    Not,
    Between,
    In,
    Like,
    Escape,
    Is,
    Null,
    True,
    False,
}

impl From<Keyword> for TokenType {
    fn from(keyword: Keyword) -> Self {
        match keyword {
            Keyword::And => TokenType::And,
            Keyword::Or => TokenType::Or,
            Keyword::Not => TokenType::Not,
            Keyword::Between => TokenType::Between,
            Keyword::In => TokenType::In,
            Keyword::Like => TokenType::Like,
            Keyword::Escape => TokenType::Escape,
            Keyword::Is => TokenType::Is,
            Keyword::Null => TokenType::Null,
            Keyword::True => TokenType::True,
            Keyword::False => TokenType::False,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(Keyword::from_str("and"), Ok(Keyword::And));
        assert_eq!(Keyword::from_str("BeTwEeN"), Ok(Keyword::Between));
        assert_eq!(Keyword::from_str("NULL"), Ok(Keyword::Null));
        assert!(Keyword::from_str("color").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenType::NotEqual.to_string(), "'<>'");
        assert_eq!(TokenType::from(Keyword::Escape).to_string(), "ESCAPE");
        assert_eq!(TokenType::EOF.to_string(), "end of input");
    }
}
