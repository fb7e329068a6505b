//! Tokenizer for the reference script language.

use super::ScriptError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// A token with its source line.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Spanned {
    pub(super) token: Token,
    pub(super) line: usize,
}

/// Punctuators ordered so that longer ones are matched first.
const PUNCTUATORS: [&str; 40] = [
    "===", "!==", "**", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "*=", "/=", "%=",
    "++", "--", "?.", "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?", "+", "-", "*", "/",
    "%", "<", ">", "=", "!", "&", "|",
];

/// Splits the source into tokens.
pub(super) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let chars = source.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    while pos < chars.len() {
        let ch = chars[pos];
        if ch == '\n' {
            line += 1;
            pos += 1;
        } else if ch.is_whitespace() {
            pos += 1;
        } else if ch == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
        } else if ch == '/' && chars.get(pos + 1) == Some(&'*') {
            pos += 2;
            loop {
                match chars.get(pos) {
                    Some('*') if chars.get(pos + 1) == Some(&'/') => {
                        pos += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        pos += 1;
                    }
                    Some(_) => pos += 1,
                    None => return Err(ScriptError::syntax(line, "unterminated comment")),
                }
            }
        } else if ch.is_ascii_digit()
            || (ch == '.' && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
                pos += 1;
                if pos < chars.len() && matches!(chars[pos], '+' | '-') {
                    pos += 1;
                }
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text = chars[start..pos].iter().collect::<String>();
            let number = text
                .parse::<f64>()
                .map_err(|_| ScriptError::syntax(line, format!("invalid number `{text}`")))?;
            tokens.push(Spanned {
                token: Token::Number(number),
                line,
            });
        } else if ch == '"' || ch == '\'' || ch == '`' {
            let (text, next) = read_string(&chars, pos, line)?;
            line += chars[pos..next].iter().filter(|&&c| c == '\n').count();
            pos = next;
            tokens.push(Spanned {
                token: Token::Str(text),
                line,
            });
        } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
            {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(chars[start..pos].iter().collect()),
                line,
            });
        } else {
            let punct = PUNCTUATORS.iter().copied().find(|p| {
                p.chars()
                    .enumerate()
                    .all(|(i, c)| chars.get(pos + i) == Some(&c))
            });
            match punct {
                Some(p) => {
                    pos += p.chars().count();
                    tokens.push(Spanned {
                        token: Token::Punct(p),
                        line,
                    });
                }
                None => {
                    return Err(ScriptError::syntax(
                        line,
                        format!("unexpected character `{ch}`"),
                    ));
                }
            }
        }
    }
    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

/// Reads a quoted string starting at `start` and returns it with the next position.
fn read_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), ScriptError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;
    loop {
        let Some(&ch) = chars.get(pos) else {
            return Err(ScriptError::syntax(line, "unterminated string literal"));
        };
        pos += 1;
        if ch == quote {
            return Ok((text, pos));
        }
        if ch == '\n' && quote != '`' {
            return Err(ScriptError::syntax(line, "unterminated string literal"));
        }
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        let Some(&escaped) = chars.get(pos) else {
            return Err(ScriptError::syntax(line, "unterminated string literal"));
        };
        pos += 1;
        match escaped {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            '0' => text.push('\0'),
            'u' => {
                let hex = chars
                    .get(pos..pos + 4)
                    .map(|digits| digits.iter().collect::<String>())
                    .ok_or_else(|| ScriptError::syntax(line, "invalid unicode escape"))?;
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ScriptError::syntax(line, "invalid unicode escape"))?;
                text.push(code);
                pos += 4;
            }
            '\n' => {}
            other => text.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn it_tokenizes_expressions() {
        assert_eq!(
            kinds("return x+1;"),
            vec![
                Token::Ident("return".to_owned()),
                Token::Ident("x".to_owned()),
                Token::Punct("+"),
                Token::Number(1.0),
                Token::Punct(";"),
                Token::Eof,
            ]
        );
        assert_eq!(
            kinds("a !== b // done"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Punct("!=="),
                Token::Ident("b".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn it_reads_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb" "\u0041""#),
            vec![
                Token::Str("it's".to_owned()),
                Token::Str("a\nb".to_owned()),
                Token::Str("A".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn it_reports_lines_of_errors() {
        let err = tokenize("let a = 1;\nlet b = 'oops").unwrap_err();
        assert_eq!(err.to_string(), "SyntaxError: unterminated string literal (line 2)");
        assert!(tokenize("a # b").is_err());
    }
}
