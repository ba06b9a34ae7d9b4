//! Lexer for the filter expression language.

use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Dotted identifier path, e.g. `objectRef.namespace`.
    Path(String),
    Str(String),
    Int(i64),
    True,
    False,
    In,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn lex(input: &str) -> Result<Vec<Spanned>, FilterError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Spanned { token: Token::LParen, offset: i });
                i += 1;
            }
            ')' => {
                tokens.push(Spanned { token: Token::RParen, offset: i });
                i += 1;
            }
            '[' => {
                tokens.push(Spanned { token: Token::LBracket, offset: i });
                i += 1;
            }
            ']' => {
                tokens.push(Spanned { token: Token::RBracket, offset: i });
                i += 1;
            }
            ',' => {
                tokens.push(Spanned { token: Token::Comma, offset: i });
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned { token: Token::EqEq, offset: i });
                    i += 2;
                } else {
                    return Err(FilterError::syntax(i, "expected '==', found '='"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned { token: Token::NotEq, offset: i });
                    i += 2;
                } else {
                    tokens.push(Spanned { token: Token::Not, offset: i });
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned { token: Token::Le, offset: i });
                    i += 2;
                } else {
                    tokens.push(Spanned { token: Token::Lt, offset: i });
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned { token: Token::Ge, offset: i });
                    i += 2;
                } else {
                    tokens.push(Spanned { token: Token::Gt, offset: i });
                    i += 1;
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Spanned { token: Token::AndAnd, offset: i });
                    i += 2;
                } else {
                    return Err(FilterError::syntax(i, "expected '&&', found '&'"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Spanned { token: Token::OrOr, offset: i });
                    i += 2;
                } else {
                    return Err(FilterError::syntax(i, "expected '||', found '|'"));
                }
            }
            '\'' => {
                let (value, next) = lex_string(input, i)?;
                tokens.push(Spanned { token: Token::Str(value), offset: i });
                i = next;
            }
            '0'..='9' | '-' => {
                let start = i;
                if c == '-' {
                    i += 1;
                    if !matches!(bytes.get(i), Some(b'0'..=b'9')) {
                        return Err(FilterError::syntax(start, "expected digits after '-'"));
                    }
                }
                while matches!(bytes.get(i), Some(b'0'..=b'9')) {
                    i += 1;
                }
                let text = &input[start..i];
                let value: i64 = text
                    .parse()
                    .map_err(|_| FilterError::syntax(start, format!("bad integer {:?}", text)))?;
                tokens.push(Spanned { token: Token::Int(value), offset: start });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while matches!(bytes.get(i), Some(b) if (*b as char).is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
                {
                    i += 1;
                }
                let text = &input[start..i];
                if text.ends_with('.') || text.contains("..") {
                    return Err(FilterError::syntax(start, format!("bad identifier {:?}", text)));
                }
                let token = match text {
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Path(text.to_string()),
                };
                tokens.push(Spanned { token, offset: start });
            }
            other => {
                return Err(FilterError::syntax(i, format!("unexpected character {:?}", other)));
            }
        }
    }

    Ok(tokens)
}

/// Single-quoted string with `\'` and `\\` escapes.
fn lex_string(input: &str, start: usize) -> Result<(String, usize), FilterError> {
    let bytes = input.as_bytes();
    let mut value = String::new();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => return Ok((value, i + 1)),
            b'\\' => match bytes.get(i + 1) {
                Some(b'\'') => {
                    value.push('\'');
                    i += 2;
                }
                Some(b'\\') => {
                    value.push('\\');
                    i += 2;
                }
                _ => return Err(FilterError::syntax(i, "bad escape in string literal")),
            },
            _ => {
                // Advance over a full UTF-8 code point.
                let rest = &input[i..];
                let ch = rest.chars().next().unwrap();
                value.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    Err(FilterError::syntax(start, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_operators_and_paths() {
        let tokens = lex("user.username == 'jane' && responseStatus.code >= 200").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|s| s.token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Path("user.username".into()),
                Token::EqEq,
                Token::Str("jane".into()),
                Token::AndAnd,
                Token::Path("responseStatus.code".into()),
                Token::Ge,
                Token::Int(200),
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        let tokens = lex(r"'it\'s \\ fine'").unwrap();
        assert_eq!(tokens[0].token, Token::Str(r"it's \ fine".into()));
    }

    #[test]
    fn rejects_single_equals_and_unterminated_strings() {
        assert!(matches!(lex("verb = 'get'"), Err(FilterError::Syntax { .. })));
        assert!(matches!(lex("'oops"), Err(FilterError::Syntax { .. })));
    }

    #[test]
    fn keywords_only_apply_to_bare_segments() {
        let tokens = lex("verb in ['get']").unwrap();
        assert_eq!(tokens[1].token, Token::In);
        let tokens = lex("spec.in_flight").unwrap();
        assert_eq!(tokens[0].token, Token::Path("spec.in_flight".into()));
    }
}
