//! XPath Lexer
//!
//! Tokenizes XPath expressions into tokens.
//!
//! `and`, `or`, `div`, `mod` and `*` are only operators when they follow a
//! token that can end an operand, so `/data/div` and `count(*)` lex as names.

/// XPath token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Star,        // * (name test)
    Multiply,    // * (operator)
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Literals
    Number(f64),
    String(String),

    // Names
    Name(String),     // NCName
    NameTest(String), // namespace:* or NCName:NCName
    NodeType(String), // node(), text(), comment(), processing-instruction()

    // Axis
    Axis(String), // child::, descendant::, etc.

    // Special
    DoubleColon, // ::
    Comma,       // ,
    Dollar,      // $

    /// Character that cannot start a token, or an unterminated literal
    Invalid(String),

    // End of input
    Eof,
}

/// XPath lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    operator_position: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            operator_position: false,
        }
    }

    /// Get the remaining input
    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Peek at current character
    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Peek at character at offset
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Advance by n bytes
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        let token = self.scan();
        // A following `*` or operator name is an operator only after an operand
        self.operator_position = matches!(
            token,
            Token::Number(_)
                | Token::String(_)
                | Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::Dot
                | Token::DoubleDot
                | Token::RightParen
                | Token::RightBracket
        );
        token
    }

    fn scan(&mut self) -> Token {
        self.skip_whitespace();

        let c = match self.peek() {
            Some(c) => c,
            None => return Token::Eof,
        };

        match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    return self.read_number();
                }
                self.advance(1);
                if self.peek() == Some('.') {
                    self.advance(1);
                    Token::DoubleDot
                } else {
                    Token::Dot
                }
            }
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => {
                if self.operator_position {
                    self.single(Token::Multiply)
                } else {
                    self.single(Token::Star)
                }
            }
            '=' => self.single(Token::Eq),
            '!' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Token::NotEq
                } else {
                    Token::Invalid("!".to_string())
                }
            }
            '<' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            '$' => self.single(Token::Dollar),
            ':' => {
                self.advance(1);
                if self.peek() == Some(':') {
                    self.advance(1);
                    Token::DoubleColon
                } else {
                    Token::Invalid(":".to_string())
                }
            }
            '"' | '\'' => self.read_string(c),
            '0'..='9' => self.read_number(),
            _ if is_name_start_char(c) => self.read_name_or_keyword(),
            _ => {
                self.advance(c.len_utf8());
                Token::Invalid(c.to_string())
            }
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance(1);
        token
    }

    /// Read a number literal (`1`, `1.5`, `1.`, `.5`)
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            self.advance(1);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(1);
            }
        }

        let num_str = &self.input[start..self.pos];
        let value = num_str.parse().unwrap_or(f64::NAN);
        Token::Number(value)
    }

    /// Read a string literal
    fn read_string(&mut self, quote: char) -> Token {
        self.advance(1); // Skip opening quote
        let start = self.pos;

        match self.remaining().find(quote) {
            Some(len) => {
                let value = self.input[start..start + len].to_string();
                self.advance(len + 1);
                Token::String(value)
            }
            None => {
                self.pos = self.input.len();
                Token::Invalid(format!("{}{}", quote, &self.input[start..]))
            }
        }
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Read a name or keyword
    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_ncname();

        if self.operator_position {
            match name {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }

        // Namespace prefix: prefix:local or prefix:*
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            let next = self.peek_at(1);
            if next == Some('*') {
                self.advance(2);
                return Token::NameTest(format!("{}:*", name));
            }
            if next.is_some_and(is_name_start_char) {
                self.advance(1);
                let local = self.read_ncname();
                return Token::NameTest(format!("{}:{}", name, local));
            }
        }

        // Axis or node type lookahead skips whitespace without consuming it
        let rest = self.remaining().trim_start();
        if rest.starts_with("::") {
            Token::Axis(name.to_string())
        } else if rest.starts_with('(') {
            match name {
                "node" | "text" | "comment" | "processing-instruction" => {
                    Token::NodeType(name.to_string())
                }
                _ => Token::Name(name.to_string()),
            }
        } else {
            Token::Name(name.to_string())
        }
    }

    /// Tokenize entire input
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if matches!(token, Token::Eof) {
                break;
            }
            tokens.push(token);
        }
        tokens
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_simple_path() {
        let mut lexer = Lexer::new("/root/child");
        assert_eq!(lexer.next_token(), Token::Slash);
        assert_eq!(lexer.next_token(), name("root"));
        assert_eq!(lexer.next_token(), Token::Slash);
        assert_eq!(lexer.next_token(), name("child"));
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn test_predicate() {
        let tokens = Lexer::new("item[@id='test']").tokenize();
        assert_eq!(
            tokens,
            vec![
                name("item"),
                Token::LeftBracket,
                Token::At,
                name("id"),
                Token::Eq,
                Token::String("test".to_string()),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_axis() {
        let mut lexer = Lexer::new("child::element");
        assert_eq!(lexer.next_token(), Token::Axis("child".to_string()));
        assert_eq!(lexer.next_token(), Token::DoubleColon);
        assert_eq!(lexer.next_token(), name("element"));
    }

    #[test]
    fn test_operator_names_depend_on_position() {
        let tokens = Lexer::new("/data/div div 2").tokenize();
        assert_eq!(
            tokens,
            vec![
                Token::Slash,
                name("data"),
                Token::Slash,
                name("div"),
                Token::Div,
                Token::Number(2.0),
            ]
        );
        let tokens = Lexer::new("count(*) * 2").tokenize();
        assert_eq!(tokens[2], Token::Star);
        assert_eq!(tokens[4], Token::Multiply);
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("1. + .5 + 2.25").tokenize();
        assert_eq!(tokens[0], Token::Number(1.0));
        assert_eq!(tokens[2], Token::Number(0.5));
        assert_eq!(tokens[4], Token::Number(2.25));
    }

    #[test]
    fn test_qualified_names() {
        let tokens = Lexer::new("/data/orx:meta/jr:*").tokenize();
        assert_eq!(tokens[3], Token::NameTest("orx:meta".to_string()));
        assert_eq!(tokens[5], Token::NameTest("jr:*".to_string()));
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(Lexer::new("#").next_token(), Token::Invalid(_)));
        assert!(matches!(Lexer::new("'open").next_token(), Token::Invalid(_)));
    }
}
