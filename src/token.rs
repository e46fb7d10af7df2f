use std::{collections::VecDeque, fmt};

/// A lexeme tagged with its kind.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: Box<str>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<Box<str>>) -> Token {
        Token {
            kind,
            lexeme: lexeme.into(),
        }
    }

    /// The end-of-stream sentinel.
    pub fn null() -> Token {
        Token::new(TokenKind::Null, "")
    }

    pub fn is_null(&self) -> bool {
        self.kind == TokenKind::Null
    }

    /// Checks whether this is the given punctuation, parenthesis or brace.
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind.is_punctuation() && &*self.lexeme == punct
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && &*self.lexeme == op
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?})", self.kind, self.lexeme)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Integer,
    Float,
    String,
    Bool,
    Punctuation,
    Operator,
    Parenthesis,
    Brace,
    /// Marks the end of the stream.
    Null,
}

impl TokenKind {
    /// Punctuation, parentheses and braces are all routed through the same
    /// parser handler.
    pub fn is_punctuation(self) -> bool {
        matches!(
            self,
            TokenKind::Punctuation | TokenKind::Parenthesis | TokenKind::Brace
        )
    }
}

/// Reserved words that are not type names. Built-in type names are keywords
/// too, see [`crate::types::builtins::is_type_name`].
pub static KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "func",
    "return",
    "if",
    "elif",
    "else",
    "while",
    "for",
    "const",
};

/// Produces tokens one at a time. Once exhausted, every further call must
/// return [`Token::null`].
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
}

impl<I> TokenSource for I
where
    I: Iterator<Item = Token>,
{
    fn next_token(&mut self) -> Token {
        self.next().unwrap_or_else(Token::null)
    }
}

/// A buffered token source over an already lexed sequence.
pub struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> TokenStream {
        TokenStream {
            tokens: tokens.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_source_keeps_yielding_null() {
        let mut stream = TokenStream::new(vec![Token::new(TokenKind::Identifier, "x")]);
        assert_eq!(stream.next_token(), Token::new(TokenKind::Identifier, "x"));
        assert!(stream.next_token().is_null());
        assert!(stream.next_token().is_null());
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn punctuation_matches_parens_and_braces() {
        assert!(Token::new(TokenKind::Parenthesis, "(").is_punct("("));
        assert!(Token::new(TokenKind::Brace, "}").is_punct("}"));
        assert!(Token::new(TokenKind::Punctuation, ";").is_punct(";"));
        assert!(!Token::new(TokenKind::Operator, "(").is_punct("("));
        assert!(Token::new(TokenKind::Operator, "==").is_operator("=="));
    }
}
