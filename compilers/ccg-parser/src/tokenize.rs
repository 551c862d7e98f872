use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{multispace0, one_of},
    combinator::map,
    IResult,
};

use crate::token::{Span, Token, TokenKind};

const PUNCTUATION: &str = ".,;:?!";

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-'
}

#[derive(Debug, Clone)]
enum RawToken<'a> {
    Word(&'a str),
    Punct(char),
}

fn raw_token(input: &str) -> IResult<&str, RawToken<'_>> {
    alt((
        map(take_while1(is_word_char), RawToken::Word),
        map(one_of(PUNCTUATION), RawToken::Punct),
    ))(input)
}

/// Splits text into word, number and punctuation tokens with byte spans.
/// Whitespace separates tokens; characters that start no token are skipped.
pub fn tokenize(original_input: &str) -> Vec<Token<'_>> {
    let mut input = original_input;
    let mut result = Vec::new();

    loop {
        let (next_input, _) = match multispace0::<&str, nom::error::Error<&str>>(input) {
            Ok(res) => res,
            Err(_) => break,
        };
        input = next_input;

        if input.is_empty() {
            break;
        }

        match raw_token(input) {
            Ok((next_input, raw)) => {
                let len = input.len() - next_input.len();
                let start = original_input.len() - input.len();
                let text = &original_input[start..start + len];
                let kind = match raw {
                    RawToken::Punct(c) => TokenKind::Punctuation(c),
                    RawToken::Word(w) if w.chars().all(|c| c.is_ascii_digit()) => TokenKind::Number,
                    RawToken::Word(_) => TokenKind::Word,
                };
                result.push(Token { span: Span::new(start, start + len), text, kind });
                input = next_input;
            }
            Err(_) => {
                // Skip one char to recover
                if let Some(c) = input.chars().next() {
                    input = &input[c.len_utf8()..];
                } else {
                    break;
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_numbers_and_punctuation() {
        let tokens = tokenize("John ate 3 apples, didn't he?");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["John", "ate", "3", "apples", ",", "didn't", "he", "?"]);
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[4].kind, TokenKind::Punctuation(','));
        assert_eq!(tokens[1].span, Span::new(5, 8));
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let tokens = tokenize("  a * apple  ");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a", "apple"]);
        assert_eq!(tokens[1].span, Span::new(6, 11));
    }

    #[test]
    fn test_unicode_spans() {
        let tokens = tokenize("Ο άνθρωπος.");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "άνθρωπος");
        assert_eq!(&"Ο άνθρωπος."[tokens[1].span.start..tokens[1].span.end], "άνθρωπος");
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("   ").is_empty());
    }
}
