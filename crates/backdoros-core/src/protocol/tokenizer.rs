//! Shell-style command line splitting.
//!
//! Rules:
//!
//! - Unquoted whitespace (space, tab, `\r`) separates words.
//! - `'single quotes'` keep their content verbatim.
//! - `"double quotes"` keep their content, except `\"` and `\\` escapes.
//! - Outside quotes, a backslash makes the next character literal.
//! - Adjacent quoted and unquoted pieces join into one word: `a"b c"d` → `ab cd`.

use thiserror::Error;

/// Errors raised while splitting a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("No closing quotation")]
    UnclosedQuote,

    #[error("No escaped character")]
    TrailingEscape,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    None,
    Single,
    Double,
}

/// Splits `line` into words.
///
/// # Errors
///
/// [`TokenizeError::UnclosedQuote`] if a quote is never closed and
/// [`TokenizeError::TrailingEscape`] if the line ends in a lone backslash.
///
/// # Example
///
/// ```rust
/// use backdoros_core::split_command_line;
///
/// let words = split_command_line(r#"WRITE "my file.txt" 'a b'"#).unwrap();
/// assert_eq!(words, vec!["WRITE", "my file.txt", "a b"]);
/// ```
pub fn split_command_line(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut words = Vec::new();
    let mut current = String::new();
    // Distinguishes `""` (an empty word) from no word at all.
    let mut in_word = false;
    let mut state = QuoteState::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            QuoteState::None => match c {
                ' ' | '\t' | '\r' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    state = QuoteState::Single;
                    in_word = true;
                }
                '"' => {
                    state = QuoteState::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars.next().ok_or(TokenizeError::TrailingEscape)?;
                    current.push(escaped);
                    in_word = true;
                }
                other => {
                    current.push(other);
                    in_word = true;
                }
            },
            QuoteState::Single => match c {
                '\'' => state = QuoteState::None,
                other => current.push(other),
            },
            QuoteState::Double => match c {
                '"' => state = QuoteState::None,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\')) => current.push(e),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(TokenizeError::UnclosedQuote),
                },
                other => current.push(other),
            },
        }
    }

    if state != QuoteState::None {
        return Err(TokenizeError::UnclosedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_whitespace() {
        assert_eq!(
            split_command_line("  READ \t notes.txt  ").unwrap(),
            vec!["READ", "notes.txt"]
        );
    }

    #[test]
    fn test_empty_line_has_no_words() {
        assert!(split_command_line("").unwrap().is_empty());
        assert!(split_command_line("   \r").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_carriage_return_is_whitespace() {
        assert_eq!(split_command_line("DIR\r").unwrap(), vec!["DIR"]);
    }

    #[test]
    fn test_double_quoted_argument_with_spaces_is_one_word() {
        assert_eq!(
            split_command_line(r#"WRITE - "my notes.txt""#).unwrap(),
            vec!["WRITE", "-", "my notes.txt"]
        );
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(
            split_command_line(r#"READ 'a \"b\" c'"#).unwrap(),
            vec!["READ", r#"a \"b\" c"#]
        );
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(
            split_command_line(r#"X "say \"hi\" \\ \n""#).unwrap(),
            vec!["X", r#"say "hi" \ \n"#]
        );
    }

    #[test]
    fn test_backslash_escapes_space_outside_quotes() {
        assert_eq!(
            split_command_line(r"READ my\ file").unwrap(),
            vec!["READ", "my file"]
        );
    }

    #[test]
    fn test_adjacent_pieces_join() {
        assert_eq!(split_command_line(r#"a"b c"d"#).unwrap(), vec!["ab cd"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_word() {
        assert_eq!(split_command_line(r#"READ """#).unwrap(), vec!["READ", ""]);
    }

    #[test]
    fn test_unclosed_quote_is_error() {
        assert_eq!(
            split_command_line(r#"WRITE "oops"#),
            Err(TokenizeError::UnclosedQuote)
        );
        assert_eq!(split_command_line("READ 'x"), Err(TokenizeError::UnclosedQuote));
    }

    #[test]
    fn test_trailing_backslash_is_error() {
        assert_eq!(split_command_line("READ x\\"), Err(TokenizeError::TrailingEscape));
    }
}
