//! Chart parsing for combinatory categorial grammars.
//!
//! [`Parser`] tokenizes text, looks up lexical categories (optionally
//! filtered by a [`Supertagger`]), fills a packed chart with a
//! [`ChartCompleter`] and unpacks the n best [`Derivation`]s.

pub mod cell;
pub mod chart;
pub mod completer;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lexicon;
pub mod parser;
pub mod scored;
pub mod scorer;
pub mod search;
pub mod sign;
pub mod supertagger;
pub mod token;
pub mod tokenize;
pub mod unpack;

pub use chart::{Chart, ChartBacking, ChartError};
pub use completer::{ChartCompleter, CompleterConfig, Forest};
pub use config::{BeamDirection, ParserConfig};
pub use diagnostics::{ChartSnapshot, DerivationGraph, ForestEdge};
pub use error::{ConfigError, Limit, ParseError, ParseFailure};
pub use lexicon::{DictionaryLexicon, LexicalEntry, Lexicon, LexiconError};
pub use parser::{ParseProduct, Parser, Timing};
pub use scored::{ScoredSymbol, SymbolArena};
pub use scorer::{LogLinearScorer, SymbolScorer};
pub use search::{AttemptOutcome, BeamSearch, SearchState, Transition};
pub use sign::{Segment, Sign};
pub use supertagger::{BetaSupertagger, Supertag, Supertagger};
pub use token::{Span, Token, TokenKind};
pub use tokenize::tokenize;
pub use unpack::Derivation;
