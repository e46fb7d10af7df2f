use std::iter::Peekable;

use crate::{
    token::{Token, TokenKind, KEYWORDS},
    types::builtins,
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
/// The buffer always ends with a single [`TokenKind::Null`] token.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::CharIndices<'src>>,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        while let Some(token) = self.scan_token() {
            self.tokens.push(token);
        }
        self.tokens.push(Token::null());
    }

    /// Scans the next token, skipping whitespace and comments. Returns `None`
    /// once the input is exhausted.
    fn scan_token(&mut self) -> Option<Token> {
        use TokenKind::*;
        loop {
            let c = self.mark_advance()?;
            let kind = match c {
                c if c.is_whitespace() => continue,
                '/' if self.peek() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                    continue;
                }
                '(' | ')' => Parenthesis,
                '{' | '}' => Brace,
                ',' | ':' | ';' | '.' => Punctuation,
                '=' | '!' | '<' | '>' => {
                    self.advance_if('=');
                    Operator
                }
                '&' => {
                    self.advance_if('&');
                    Operator
                }
                '|' => {
                    if self.advance_if('|') {
                        Operator
                    } else {
                        Punctuation
                    }
                }
                '+' | '-' | '*' | '/' | '%' => Operator,
                '"' => return Some(self.string()),
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                c if c.is_ascii_digit() => self.number(),
                _ => Punctuation,
            };
            return Some(Token::new(kind, self.substr()));
        }
    }

    fn word(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = self.substr();
        if builtins::is_type_name(word) {
            // Pointer types are spelled with stars glued to the type name.
            while self.advance_if('*') {}
            return TokenKind::Keyword;
        }
        match word {
            "true" | "false" => TokenKind::Bool,
            word if KEYWORDS.contains(word) => TokenKind::Keyword,
            _ => TokenKind::Identifier,
        }
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let mut ahead = self.iter.clone();
        ahead.next();
        let fraction_follows = matches!(ahead.peek(), Some((_, c)) if c.is_ascii_digit());
        if self.peek() != '.' || !fraction_follows {
            return TokenKind::Integer;
        }
        self.advance();
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Float
    }

    /// Lexes a string literal. The produced lexeme is unquoted and escaped.
    /// An unclosed string runs until the end of the input.
    fn string(&mut self) -> Token {
        let mut buf = String::new();
        let mut escaping = false;
        while let Some(c) = self.advance() {
            match (escaping, c) {
                (false, '"') => break,
                (false, '\\') => {
                    escaping = true;
                    continue;
                }
                (true, 'n') => buf.push('\n'),
                (true, 't') => buf.push('\t'),
                (_, c) => buf.push(c),
            }
            escaping = false;
        }
        Token::new(TokenKind::String, buf)
    }
}

impl Lexer<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.char_indices().peekable(),
            current_lo: 0,
            tokens,
        }
    }
}

impl<'src> Lexer<'src, '_> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor();
        self.advance()
    }

    fn advance(&mut self) -> Option<char> {
        self.iter.next().map(|(_, c)| c)
    }

    /// Advances only if the next character is `expected`.
    fn advance_if(&mut self, expected: char) -> bool {
        let matches = self.peek() == expected;
        if matches {
            self.advance();
        }
        matches
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().map_or('\0', |&(_, c)| c)
    }

    fn cursor(&mut self) -> usize {
        self.iter.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&mut self) -> &'src str {
        let hi = self.cursor();
        &self.src[self.current_lo..hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tests_with_kinds() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "func add(a: i32): i32 { return a; }" => [
                (Keyword, "func"),
                (Identifier, "add"),
                (Parenthesis, "("),
                (Identifier, "a"),
                (Punctuation, ":"),
                (Keyword, "i32"),
                (Parenthesis, ")"),
                (Punctuation, ":"),
                (Keyword, "i32"),
                (Brace, "{"),
                (Keyword, "return"),
                (Identifier, "a"),
                (Punctuation, ";"),
                (Brace, "}"),
            ],
            "1 + 2.5 == 3. // trailing comment" => [
                (Integer, "1"),
                (Operator, "+"),
                (Float, "2.5"),
                (Operator, "=="),
                (Integer, "3"),
                (Punctuation, "."),
            ],
            "i32** p = &x; bool b = !true" => [
                (Keyword, "i32**"),
                (Identifier, "p"),
                (Operator, "="),
                (Operator, "&"),
                (Identifier, "x"),
                (Punctuation, ";"),
                (Keyword, "bool"),
                (Identifier, "b"),
                (Operator, "="),
                (Operator, "!"),
                (Bool, "true"),
            ],
            r#"x = "say \"hi\"\n" # y"# => [
                (Identifier, "x"),
                (Operator, "="),
                (String, "say \"hi\"\n"),
                (Punctuation, "#"),
                (Identifier, "y"),
            ],
            "a <= b != c && d || e" => [
                (Identifier, "a"),
                (Operator, "<="),
                (Identifier, "b"),
                (Operator, "!="),
                (Identifier, "c"),
                (Operator, "&&"),
                (Identifier, "d"),
                (Operator, "||"),
                (Identifier, "e"),
            ],
            "\"unclosed" => [(String, "unclosed")],
        });

        for (input, mut tokens) in cases {
            tokens.push(Token::null());
            assert_eq!(lex_in_new(input), tokens);
        }
    }

    #[test]
    fn empty_input_is_only_the_sentinel() {
        assert_eq!(lex_in_new("   // nothing\n"), [Token::null()]);
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $lexeme:expr)),* $(,)?]),* $(,)?
        }) => {{
            vec![$((
                $str,
                vec![$(Token::new($kind, $lexeme)),*],
            )),*]
        }};
    }
    use cases;
}
