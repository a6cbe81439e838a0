//! Tokenizer for the expression language.

use std::iter::Peekable;
use std::str::CharIndices;

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Splits `source` into tokens. `base` is added to every reported offset.
pub fn tokenize(source: &str, base: usize) -> Result<Vec<Spanned>, EvalError> {
    Lexer {
        source,
        chars: source.char_indices().peekable(),
        base,
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    base: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Spanned>, EvalError> {
        let mut tokens = Vec::new();
        while let Some(&(offset, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            let token = match c {
                '0'..='9' => self.number(offset)?,
                '.' if self.next_is_digit(offset) => self.number(offset)?,
                '"' | '\'' | '`' => self.string(offset, c)?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.word(offset),
                _ => self.symbol(offset, c)?,
            };
            tokens.push(Spanned {
                token,
                offset: self.base + offset,
            });
        }
        Ok(tokens)
    }

    fn next_is_digit(&self, offset: usize) -> bool {
        self.source[offset + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> EvalError {
        EvalError::syntax(message, self.base + offset)
    }

    fn number(&mut self, start: usize) -> Result<Token, EvalError> {
        let mut end = start;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(&(i, c)) = self.chars.peek() {
            let accept = match c {
                '0'..='9' => true,
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    true
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    true
                }
                '+' | '-' => matches!(self.source[..i].chars().last(), Some('e' | 'E')),
                _ => false,
            };
            if !accept {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{text}'"), start))
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, EvalError> {
        self.chars.next();
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c if c == quote => return Ok(Token::Str(out)),
                c => out.push(c),
            }
        }
        Err(self.error("unterminated string literal", start))
    }

    fn word(&mut self, start: usize) -> Token {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '$') {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        let word = &self.source[start..end];
        if word.eq_ignore_ascii_case("and") {
            Token::And
        } else if word.eq_ignore_ascii_case("or") {
            Token::Or
        } else if word.eq_ignore_ascii_case("not") {
            Token::Not
        } else {
            Token::Ident(word.to_string())
        }
    }

    fn symbol(&mut self, offset: usize, c: char) -> Result<Token, EvalError> {
        self.chars.next();
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '=' => {
                // `=`, `==` and `===` all mean equality.
                self.eat('=');
                self.eat('=');
                Token::Eq
            }
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                    Token::Ne
                } else {
                    Token::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else if self.eat('>') {
                    Token::Ne
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            other => return Err(self.error(format!("unexpected character '{other}'"), offset)),
        };
        Ok(token)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source, 0)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_arithmetic_tokens() {
        assert_eq!(
            tokens("amount - refund * 1.5e2"),
            vec![
                Token::Ident("amount".into()),
                Token::Minus,
                Token::Ident("refund".into()),
                Token::Star,
                Token::Number(150.0),
            ]
        );
    }

    #[test]
    fn test_equality_spellings() {
        assert_eq!(tokens("a = b"), tokens("a === b"));
        assert_eq!(tokens("a == b")[1], Token::Eq);
        assert_eq!(tokens("a !== b")[1], Token::Ne);
        assert_eq!(tokens("a <> b")[1], Token::Ne);
        assert_eq!(tokens("a <= b")[1], Token::Le);
    }

    #[test]
    fn test_keyword_operators() {
        assert_eq!(
            tokens("a AND b or not c"),
            vec![
                Token::Ident("a".into()),
                Token::And,
                Token::Ident("b".into()),
                Token::Or,
                Token::Not,
                Token::Ident("c".into()),
            ]
        );
        assert_eq!(tokens("a && b || !c"), tokens("a and b or not c"));
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(tokens(r#""it\"s""#), vec![Token::Str("it\"s".into())]);
        assert_eq!(tokens("'paid'"), vec![Token::Str("paid".into())]);
        assert_eq!(tokens(".5"), vec![Token::Number(0.5)]);
    }

    #[test]
    fn test_row_access_tokens() {
        assert_eq!(
            tokens("row.amount"),
            vec![Token::Ident("row".into()), Token::Dot, Token::Ident("amount".into())]
        );
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("a; b", 0).unwrap_err();
        assert_eq!(
            err,
            EvalError::Syntax {
                message: "unexpected character ';'".into(),
                position: 1
            }
        );
        assert!(tokenize("a & b", 0).is_err());
        assert!(tokenize("'open", 0).is_err());
        assert!(tokenize("{ x }", 0).is_err());
    }

    #[test]
    fn test_offsets_include_base() {
        let spanned = tokenize("x > 1", 7).unwrap();
        assert_eq!(spanned[1].offset, 9);
    }
}
