//! Tokenizer for the §6.2 DQL subset.
//!
//! Keywords are matched case-insensitively, grounded on
//! `original_source/case_changing_charstream.h`'s trick of lowercasing
//! keyword spans as they stream past rather than lowercasing the whole
//! input (identifiers and string contents keep their original case).

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Select,
    From,
    Where,
    And,
    Or,
    Order,
    By,
    Limit,
    As,
    Asc,
    Desc,
    Not,
    In,
    Is,
    Null,
    Like,
    ContainAll,
    ContainAny,
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Star,
    Minus,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

fn keyword(lower: &str) -> Option<Token> {
    Some(match lower {
        "select" => Token::Select,
        "from" => Token::From,
        "where" => Token::Where,
        "and" => Token::And,
        "or" => Token::Or,
        "order" => Token::Order,
        "by" => Token::By,
        "limit" => Token::Limit,
        "as" => Token::As,
        "asc" => Token::Asc,
        "desc" => Token::Desc,
        "not" => Token::Not,
        "in" => Token::In,
        "is" => Token::Is,
        "null" => Token::Null,
        "like" => Token::Like,
        "contain_all" => Token::ContainAll,
        "contain_any" => Token::ContainAny,
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        _ => return None,
    })
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), QueryError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(QueryError::lex("unterminated block comment", line, col)),
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn read_string(&mut self, quote: char) -> Result<String, QueryError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(QueryError::lex("unterminated string literal", line, col)),
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some(c) => s.push(c),
                    None => return Err(QueryError::lex("unterminated string literal", line, col)),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }

    fn read_number(&mut self) -> Result<Token, QueryError> {
        let (line, col) = (self.line, self.col);
        let mut s = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if is_float {
            s.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| QueryError::lex(format!("invalid float literal: {e}"), line, col))
        } else {
            s.parse::<i64>()
                .map(Token::Int)
                .map_err(|e| QueryError::lex(format!("invalid integer literal: {e}"), line, col))
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, QueryError> {
        self.skip_trivia()?;
        let (line, col) = (self.line, self.col);
        let Some(c) = self.peek() else {
            return Ok(Spanned {
                token: Token::Eof,
                line,
                col,
            });
        };

        let token = match c {
            '\'' | '"' => Token::Str(self.read_string(c)?),
            '0'..='9' => self.read_number()?,
            ',' => {
                self.bump();
                Token::Comma
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '[' => {
                self.bump();
                Token::LBracket
            }
            ']' => {
                self.bump();
                Token::RBracket
            }
            '*' => {
                self.bump();
                Token::Star
            }
            '-' => {
                self.bump();
                Token::Minus
            }
            '=' => {
                self.bump();
                Token::Eq
            }
            '!' if self.peek2() == Some('=') => {
                self.bump();
                self.bump();
                Token::Ne
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Token::Le
                    }
                    Some('>') => {
                        self.bump();
                        Token::Ne
                    }
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Token::Ge
                    }
                    _ => Token::Gt,
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                keyword(&s.to_ascii_lowercase()).unwrap_or(Token::Ident(s))
            }
            other => return Err(QueryError::lex(format!("unexpected character '{other}'"), line, col)),
        };

        Ok(Spanned { token, line, col })
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, QueryError> {
        let mut out = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            out.push(spanned);
            if is_eof {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(tokens("SeLeCt")[0], Token::Select);
        assert_eq!(tokens("where")[0], Token::Where);
    }

    #[test]
    fn both_quote_styles_accepted() {
        assert_eq!(tokens("'a'")[0], Token::Str("a".into()));
        assert_eq!(tokens("\"b\"")[0], Token::Str("b".into()));
    }

    #[test]
    fn comments_are_skipped() {
        let t = tokens("select /* c */ x // trailing\nfrom t");
        assert_eq!(t[0], Token::Select);
        assert_eq!(t[1], Token::Ident("x".into()));
        assert_eq!(t[2], Token::From);
    }

    #[test]
    fn relational_operators() {
        assert_eq!(tokens("<="), vec![Token::Le, Token::Eof]);
        assert_eq!(tokens("!="), vec![Token::Ne, Token::Eof]);
        assert_eq!(tokens(">="), vec![Token::Ge, Token::Eof]);
    }

    #[test]
    fn minus_is_its_own_token() {
        assert_eq!(tokens("-3"), vec![Token::Minus, Token::Int(3), Token::Eof]);
        assert_eq!(tokens("a-b"), vec![
            Token::Ident("a".into()),
            Token::Minus,
            Token::Ident("b".into()),
            Token::Eof
        ]);
    }

    #[test]
    fn unterminated_string_errors_with_position() {
        let err = Lexer::new("'abc").tokenize().unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.col, 1);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_non_negative_integer_round_trips(v in 0i64..i64::MAX) {
            prop_assert_eq!(tokens(&v.to_string()), vec![Token::Int(v), Token::Eof]);
        }

        #[test]
        fn unary_minus_lexes_separately_from_any_integer(v in 0i64..i64::MAX) {
            let input = format!("-{v}");
            prop_assert_eq!(tokens(&input), vec![Token::Minus, Token::Int(v), Token::Eof]);
        }
    }
}
