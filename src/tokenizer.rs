use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Operands
    Name,
    IntNumber,
    RealNumber,
    String,

    // int, unsigned_int, float, string, system_handler
    Specifier,

    // Keywords
    If,
    Else,
    While,
    For,
    In,
    Do,
    Done,
    Put,
    Ret,

    // Operators
    AddOperator,
    MultOperator,
    BooleanOperator,
    And,
    Or,
    Assign,
    Dot,
    Comma,
    Semicolon,
    OpeningParenthesis,
    ClosingParenthesis,

    // Only emitted by the precedence converter
    FunctionCall,
    NoArgFunctionName,
    NextLine,

    // End of file
    Eof,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenType::Name => "name",
            TokenType::IntNumber => "integer",
            TokenType::RealNumber => "real",
            TokenType::String => "string",
            TokenType::Specifier => "specifier",
            TokenType::If => "if",
            TokenType::Else => "else",
            TokenType::While => "while",
            TokenType::For => "for",
            TokenType::In => "in",
            TokenType::Do => "do",
            TokenType::Done => "done",
            TokenType::Put => "put",
            TokenType::Ret => "ret",
            TokenType::AddOperator => "additive operator",
            TokenType::MultOperator => "multiplicative operator",
            TokenType::BooleanOperator => "comparison operator",
            TokenType::And => "and",
            TokenType::Or => "or",
            TokenType::Assign => "=",
            TokenType::Dot => ".",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::OpeningParenthesis => "(",
            TokenType::ClosingParenthesis => ")",
            TokenType::FunctionCall => "function call",
            TokenType::NoArgFunctionName => "no-arg function call",
            TokenType::NextLine => "end of statement",
            TokenType::Eof => "end of file",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            token_type,
            lexeme: lexeme.into(),
            span,
        }
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    /// Same position, different kind. Used by the converter for the tokens it synthesizes.
    pub fn retyped(&self, token_type: TokenType) -> Self {
        Self {
            token_type,
            lexeme: self.lexeme.clone(),
            span: self.span,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \"{}\" at {}", self.token_type, self.lexeme, self.span)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {line},{column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string starting at {line},{column}")]
    UnterminatedString { line: usize, column: usize },
}

pub struct Tokenizer<'a> {
    remaining: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            remaining: source,
            line: 1,
            column: 1,
        }
    }

    pub fn token(&mut self) -> Result<Token, TokenizeError> {
        while let Some((_, rest)) = maximal(&[whitespace, comment], self.remaining) {
            self.advance(rest);
        }

        let (line, column) = (self.line, self.column);
        let Some(character) = self.remaining.chars().next() else {
            return Ok(Token::new(
                TokenType::Eof,
                "",
                Span::new(line, column, line, column),
            ));
        };

        let matched = maximal(
            &[
                // Single-character tokens
                opening_parenthesis,
                closing_parenthesis,
                comma,
                dot,
                semicolon,
                plus,
                minus,
                star,
                slash,
                // one or two character tokens
                assign,
                equal_equal,
                bang_equal,
                less,
                less_equal,
                greater,
                greater_equal,
                // specifiers
                int,
                unsigned_int,
                float,
                string_specifier,
                system_handler,
                // keywords
                if_,
                else_,
                while_,
                for_,
                in_,
                do_,
                done,
                put,
                ret,
                and,
                or,
                // literals
                name,
                string,
                number,
            ],
            self.remaining,
        );

        let Some((token_type, rest)) = matched else {
            return Err(if character == '"' {
                TokenizeError::UnterminatedString { line, column }
            } else {
                TokenizeError::UnexpectedCharacter {
                    character,
                    line,
                    column,
                }
            });
        };

        let consumed = &self.remaining[..self.remaining.len() - rest.len()];
        let lexeme = match token_type {
            TokenType::String => &consumed[1..consumed.len() - 1],
            _ => consumed,
        };
        let lexeme = lexeme.to_string();
        self.advance(rest);

        Ok(Token::new(
            token_type,
            lexeme,
            Span::new(line, column, self.line, self.column),
        ))
    }

    fn advance(&mut self, rest: &'a str) {
        let consumed = &self.remaining[..self.remaining.len() - rest.len()];
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.remaining = rest;
    }
}

/// Tokenizes the whole source. The returned vector always ends with `Eof`.
pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        let is_eof = token.token_type == TokenType::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    Ok(tokens)
}

fn maximal<'a, T>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { opening_parenthesis, "(", TokenType::OpeningParenthesis }
match_literal! { closing_parenthesis, ")", TokenType::ClosingParenthesis }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { plus, "+", TokenType::AddOperator }
match_literal! { minus, "-", TokenType::AddOperator }
match_literal! { star, "*", TokenType::MultOperator }
match_literal! { slash, "/", TokenType::MultOperator }
match_literal! { assign, "=", TokenType::Assign }
match_literal! { equal_equal, "==", TokenType::BooleanOperator }
match_literal! { bang_equal, "!=", TokenType::BooleanOperator }
match_literal! { less, "<", TokenType::BooleanOperator }
match_literal! { less_equal, "<=", TokenType::BooleanOperator }
match_literal! { greater, ">", TokenType::BooleanOperator }
match_literal! { greater_equal, ">=", TokenType::BooleanOperator }
match_literal! { int, "int", TokenType::Specifier }
match_literal! { unsigned_int, "unsigned_int", TokenType::Specifier }
match_literal! { float, "float", TokenType::Specifier }
match_literal! { string_specifier, "string", TokenType::Specifier }
match_literal! { system_handler, "system_handler", TokenType::Specifier }
match_literal! { if_, "if", TokenType::If }
match_literal! { else_, "else", TokenType::Else }
match_literal! { while_, "while", TokenType::While }
match_literal! { for_, "for", TokenType::For }
match_literal! { in_, "in", TokenType::In }
match_literal! { do_, "do", TokenType::Do }
match_literal! { done, "done", TokenType::Done }
match_literal! { put, "put", TokenType::Put }
match_literal! { ret, "ret", TokenType::Ret }
match_literal! { and, "and", TokenType::And }
match_literal! { or, "or", TokenType::Or }

fn name(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    Some((TokenType::Name, &source[len..]))
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    if !source.starts_with('"') {
        return None;
    }

    let mut len = 1;
    for c in source.chars().skip(1) {
        len += c.len_utf8();
        if c == '"' {
            return Some((TokenType::String, &source[len..]));
        }
    }
    None
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let whole = digits(source);
    if whole == 0 {
        return None;
    }

    let rest = &source[whole..];
    if let Some(fraction) = rest.strip_prefix('.') {
        let fraction_len = digits(fraction);
        if fraction_len > 0 {
            return Some((TokenType::RealNumber, &fraction[fraction_len..]));
        }
    }

    Some((TokenType::IntNumber, rest))
}

#[cfg(test)]
mod test {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        tokens(source)
            .unwrap()
            .into_iter()
            .map(|token| token.token_type)
            .collect()
    }

    #[test]
    fn test_tokens() {
        let source = "int x;";
        let expected = vec![
            TokenType::Specifier,
            TokenType::Name,
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(types(source), expected);
    }

    #[test]
    fn test_tokens_with_comments() {
        let source = "x = 1; // comment";
        let expected = vec![
            TokenType::Name,
            TokenType::Assign,
            TokenType::IntNumber,
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(types(source), expected);
    }

    #[test]
    fn test_tokens_with_string() {
        let tokens = tokens("s = \"hello\";").unwrap();
        assert_eq!(tokens[2].token_type, TokenType::String);
        assert_eq!(tokens[2].lexeme, "hello");
    }

    #[test]
    fn test_tokens_with_number() {
        let tokens = tokens("1.5 42").unwrap();
        assert_eq!(tokens[0].token_type, TokenType::RealNumber);
        assert_eq!(tokens[0].lexeme, "1.5");
        assert_eq!(tokens[1].token_type, TokenType::IntNumber);
        assert_eq!(tokens[1].lexeme, "42");
    }

    #[test]
    fn test_keyword_prefix_is_a_name() {
        let tokens = tokens("integer done_flag int").unwrap();
        assert_eq!(tokens[0].token_type, TokenType::Name);
        assert_eq!(tokens[1].token_type, TokenType::Name);
        assert_eq!(tokens[2].token_type, TokenType::Specifier);
    }

    #[test]
    fn test_specifiers() {
        let source = "int unsigned_int float string system_handler";
        assert!(types(source)
            .iter()
            .take(5)
            .all(|t| *t == TokenType::Specifier));
    }

    #[test]
    fn test_double_equal() {
        let tokens = tokens("a==b").unwrap();
        assert_eq!(tokens[1].token_type, TokenType::BooleanOperator);
        assert_eq!(tokens[1].lexeme, "==");
    }

    #[test]
    fn test_field_reference_is_not_a_number() {
        let expected = vec![
            TokenType::Name,
            TokenType::Dot,
            TokenType::Name,
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(types("h.start;"), expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokens("int x;\n  put x;").unwrap();
        assert_eq!(tokens[1].span, Span::new(1, 5, 1, 6));
        assert_eq!(tokens[3].span, Span::new(2, 3, 2, 6));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokens("x = 1 $ 2;").unwrap_err();
        assert!(matches!(
            err,
            TokenizeError::UnexpectedCharacter {
                character: '$',
                line: 1,
                column: 7
            }
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokens("put \"abc").unwrap_err();
        assert!(matches!(
            err,
            TokenizeError::UnterminatedString { line: 1, column: 5 }
        ));
    }
}
