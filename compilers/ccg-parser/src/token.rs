/// Byte range of a token in the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    Punctuation(char),
}

#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub span: Span,
    pub text: &'a str,
    pub kind: TokenKind,
}

impl<'a> Token<'a> {
    /// A word token without a source position, for callers that tokenize
    /// on their own.
    pub fn word(text: &'a str) -> Self {
        Self {
            span: Span::new(0, text.len()),
            text,
            kind: TokenKind::Word,
        }
    }
}
