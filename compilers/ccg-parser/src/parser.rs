use std::time::{Duration, Instant};

use ccg_grammar::{Category, RuleSet, Semantics};
use tracing::{debug, info};

use crate::chart::Chart;
use crate::completer::{ChartCompleter, CompleterConfig, Forest};
use crate::config::ParserConfig;
use crate::error::{ParseError, ParseFailure};
use crate::lexicon::{Lexicon, LexiconError};
use crate::scorer::{LogLinearScorer, SymbolScorer};
use crate::search::{AttemptOutcome, BeamSearch, Transition};
use crate::sign::Segment;
use crate::supertagger::Supertagger;
use crate::token::Token;
use crate::tokenize::tokenize;
use crate::unpack::Derivation;

/// Wall-clock time spent in each stage of the attempt that produced a
/// result. With a supertagger, earlier attempts at other beams are not
/// included.
///
/// `parse` runs from the start of chart completion to the end of
/// unpacking, so lexical lookup is counted only in `lex`, and
/// `unpacking` is always `parse - chart`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub lex: Duration,
    pub chart: Duration,
    pub unpacking: Duration,
    pub parse: Duration,
}

impl Timing {
    fn completed(lex: Duration, chart: Duration, parse: Duration) -> Self {
        Self { lex, chart, unpacking: parse.saturating_sub(chart), parse }
    }

    fn gave_up(lex: Duration, elapsed: Duration) -> Self {
        Self { lex, chart: elapsed, unpacking: Duration::ZERO, parse: elapsed }
    }
}

/// A successful parse.
#[derive(Debug)]
pub struct ParseProduct {
    /// Best first.
    pub analyses: Vec<Derivation>,
    pub timing: Timing,
    /// Supertagger beam the analyses were found at.
    pub beam: Option<f64>,
    /// The glue rule was enabled for the successful attempt.
    pub glued: bool,
    pub forest: Forest,
}

impl ParseProduct {
    pub fn best(&self) -> Option<&Derivation> {
        self.analyses.first()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.analyses.iter().map(|a| a.score).collect()
    }

    /// The analysis whose semantics `similarity` rates highest against some
    /// gold reading, and whether it rated `1.0`. Earlier analyses win ties;
    /// nothing is returned when no analysis rates above zero.
    pub fn oracle_best(&self, similarity: impl Fn(&Semantics) -> f64) -> Option<(&Derivation, bool)> {
        let mut best: Option<(&Derivation, f64)> = None;
        for analysis in &self.analyses {
            let rating = similarity(&analysis.semantics);
            if rating > best.map_or(0.0, |(_, b)| b) {
                best = Some((analysis, rating));
            }
        }
        best.map(|(analysis, rating)| (analysis, rating >= 1.0))
    }
}

struct Seed {
    category: Category,
    semantics: Semantics,
    score: f64,
}

/// Parses text with a lexicon and a rule set, optionally under a
/// supertagger that filters lexical categories.
pub struct Parser<L: Lexicon, R: RuleSet> {
    lexicon: L,
    rules: R,
    scorer: Box<dyn SymbolScorer>,
    supertagger: Option<Box<dyn Supertagger>>,
    config: ParserConfig,
}

impl<L: Lexicon, R: RuleSet> Parser<L, R> {
    pub fn new(lexicon: L, rules: R, config: ParserConfig) -> Self {
        Self {
            lexicon,
            rules,
            scorer: Box::new(LogLinearScorer::default()),
            supertagger: None,
            config,
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: impl SymbolScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    #[must_use]
    pub fn with_supertagger(mut self, supertagger: impl Supertagger + 'static) -> Self {
        self.supertagger = Some(Box::new(supertagger));
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &L {
        &self.lexicon
    }

    /// Current beam of the configured supertagger.
    pub fn supertagger_beam(&self) -> Option<f64> {
        self.supertagger.as_ref().map(|t| t.current_beam_value())
    }

    /// Log probability the supertagger assigns, at its current beam, to the
    /// category of each leaf of `derivation`, left to right. `None` where
    /// the category is outside the beam or the word is unknown to the
    /// tagger, and for every leaf when there is no supertagger.
    pub fn supertagger_log_probs(&mut self, derivation: &Derivation) -> Vec<Option<f64>> {
        let leaves = derivation.leaves();
        let Some(tagger) = self.supertagger.as_mut() else { return vec![None; leaves.len()] };
        let tokens: Vec<Token<'_>> =
            leaves.iter().map(|leaf| Token::word(leaf.word.as_deref().unwrap_or_default())).collect();
        tagger.map_tokens(&tokens);
        let log_probs: Vec<Option<f64>> = leaves
            .iter()
            .enumerate()
            .map(|(index, leaf)| {
                tagger.select_token(index);
                let signature = leaf.category.signature();
                tagger
                    .current_candidates()
                    .into_iter()
                    .find(|tag| tag.category == signature)
                    .map(|tag| tag.probability.ln())
            })
            .collect();
        tagger.clear_tokens();
        log_probs
    }

    pub fn parse(&mut self, text: &str) -> Result<ParseProduct, ParseFailure> {
        let tokens = tokenize(text);
        self.parse_tokens(&tokens)
    }

    pub fn parse_tokens(&mut self, tokens: &[Token<'_>]) -> Result<ParseProduct, ParseFailure> {
        let result = match self.supertagger.take() {
            None => self.attempt(tokens, self.config.glue_fallback, None),
            Some(mut tagger) => {
                let result = self.parse_beta_best(tokens, tagger.as_mut());
                self.supertagger = Some(tagger);
                result
            }
        };
        match &result {
            Ok(product) => info!(
                tokens = tokens.len(),
                analyses = product.analyses.len(),
                parse_ms = product.timing.parse.as_millis() as u64,
                "parsed"
            ),
            Err(failure) => info!(tokens = tokens.len(), error = %failure.error, "parse failed"),
        }
        result
    }

    fn parse_beta_best(
        &self,
        tokens: &[Token<'_>],
        tagger: &mut dyn Supertagger,
    ) -> Result<ParseProduct, ParseFailure> {
        let mut search = BeamSearch::new(self.config.beam_direction);
        tagger.map_tokens(tokens);
        search.start(tagger);
        loop {
            search.begin_attempt();
            let result = self.attempt(tokens, search.glue(), Some(&mut *tagger));
            let outcome = match &result {
                Ok(_) => Some(AttemptOutcome::Success),
                Err(failure) => match failure.error {
                    ParseError::LexiconLookup(_) => Some(AttemptOutcome::LexiconFailure),
                    ParseError::NoAnalysis => Some(AttemptOutcome::NoAnalysis),
                    ParseError::LimitExceeded(_) => Some(AttemptOutcome::LimitExceeded),
                    ParseError::Chart(_) => None,
                },
            };
            let Some(outcome) = outcome else {
                tagger.clear_tokens();
                return result;
            };
            match search.next(outcome, tagger) {
                Transition::Finish | Transition::GiveUp => return result,
                Transition::Loosen | Transition::Tighten | Transition::EnableGlue => {}
            }
        }
    }

    // Candidates per token, filtered by the tagger when there is one.
    fn lookup<'t>(
        &self,
        tokens: &[Token<'_>],
        mut tagger: Option<&mut (dyn Supertagger + 't)>,
    ) -> Result<Vec<Vec<Seed>>, LexiconError> {
        let mut seeds = Vec::with_capacity(tokens.len());
        for (index, token) in tokens.iter().enumerate() {
            let entries = self.lexicon.recognize(token, index)?;
            if entries.is_empty() {
                return Err(LexiconError::UnknownForm { form: token.text.to_string(), index });
            }
            let tags = match tagger.as_deref_mut() {
                Some(tagger) => {
                    tagger.select_token(index);
                    Some((tagger.current_candidates(), tagger.current_beam_value()))
                }
                None => None,
            };

            let mut token_seeds = Vec::with_capacity(entries.len());
            for entry in entries {
                let bonus = match &tags {
                    Some((tags, _)) if !tags.is_empty() => {
                        let signature = entry.category.signature();
                        match tags.iter().find(|t| t.category == signature) {
                            Some(tag) => tag.probability.ln(),
                            None => continue,
                        }
                    }
                    _ => 0.0,
                };
                token_seeds.push(Seed {
                    category: entry.category,
                    semantics: Semantics::pred(&entry.predicate),
                    score: entry.weight + bonus,
                });
            }
            if token_seeds.is_empty() {
                let beam = tags.map_or(0.0, |(_, beam)| beam);
                return Err(LexiconError::Filtered { form: token.text.to_string(), index, beam });
            }
            seeds.push(token_seeds);
        }
        Ok(seeds)
    }

    /// One pass: lexical lookup, chart completion, unpacking.
    fn attempt<'t>(
        &self,
        tokens: &[Token<'_>],
        glue: bool,
        mut tagger: Option<&mut (dyn Supertagger + 't)>,
    ) -> Result<ParseProduct, ParseFailure> {
        let lex_started = Instant::now();
        let beam = tagger.as_ref().map(|t| t.current_beam_value());

        let seeds = self.lookup(tokens, tagger.as_deref_mut());
        let lex = lex_started.elapsed();
        let seeds = match seeds {
            Ok(seeds) => seeds,
            Err(e) => {
                debug!(error = %e, ?beam, "lexical lookup failed");
                let timing = Timing::gave_up(lex, Duration::ZERO);
                return Err(ParseFailure { error: e.into(), timing, forest: None });
            }
        };

        let config = CompleterConfig {
            time_limit: self.config.time_limit(),
            edge_limit: self.config.edge_limit(),
            prune_limit: self.config.prune_limit,
            cell_prune_limit: self.config.cell_prune_limit,
        };
        let started = Instant::now();
        let chart = Chart::new(self.config.chart_backing, tokens.len());
        let mut completer = ChartCompleter::new(&self.rules, self.scorer.as_ref(), chart, config);

        let completed = self.complete(&mut completer, tokens, seeds, glue);
        let chart_time = started.elapsed();
        let whole = match completed {
            Ok(whole) => whole,
            Err(error) => {
                let timing = Timing::gave_up(lex, chart_time);
                let forest = completer.into_forest();
                if self.config.debug_failed_parses {
                    debug!("failed chart:\n{}", forest);
                }
                return Err(ParseFailure { error, timing, forest: Some(forest) });
            }
        };

        let analyses = completer
            .unpack(whole, self.config.n_best, self.config.lazy_unpacking)
            .map_err(ParseError::from);
        let timing = Timing::completed(lex, chart_time, started.elapsed());
        let forest = completer.into_forest();
        match analyses {
            Ok(analyses) if !analyses.is_empty() => {
                debug!(
                    tokens = tokens.len(),
                    analyses = analyses.len(),
                    symbols = forest.symbols().len(),
                    chart_ms = timing.chart.as_millis() as u64,
                    ?beam,
                    glue,
                    "attempt succeeded"
                );
                Ok(ParseProduct { analyses, timing, beam, glued: glue, forest })
            }
            Ok(_) => Err(ParseFailure { error: ParseError::NoAnalysis, timing, forest: Some(forest) }),
            Err(error) => Err(ParseFailure { error, timing, forest: Some(forest) }),
        }
    }

    fn complete(
        &self,
        completer: &mut ChartCompleter<'_>,
        tokens: &[Token<'_>],
        seeds: Vec<Vec<Seed>>,
        glue: bool,
    ) -> Result<Segment, ParseError> {
        for (index, (token, token_seeds)) in tokens.iter().zip(seeds).enumerate() {
            for seed in token_seeds {
                completer.add_lexical(index, token.text, &seed.category, seed.semantics, seed.score)?;
            }
        }
        completer.complete(glue)?;
        let whole = completer.forest().whole().ok_or(ParseError::NoAnalysis)?;
        if completer.is_empty(whole)? {
            return Err(ParseError::NoAnalysis);
        }
        Ok(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::DictionaryLexicon;
    use crate::supertagger::BetaSupertagger;
    use ccg_grammar::CombinatoryRules;

    fn lexicon() -> DictionaryLexicon {
        let mut lexicon = DictionaryLexicon::new();
        lexicon.insert("john", "NP", "john", 0.0).unwrap();
        lexicon.insert("mary", "NP", "mary", 0.0).unwrap();
        lexicon.insert("likes", "(S[dcl]\\NP)/NP", "likes", 0.0).unwrap();
        lexicon.insert("likes", "N", "likes", -2.0).unwrap();
        lexicon
    }

    #[test]
    fn test_transitive_sentence() {
        let mut parser = Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default());
        let failure = parser.parse("John likes Mary.").unwrap_err();
        // The full stop has no entry
        assert!(matches!(failure.error, ParseError::LexiconLookup(LexiconError::UnknownForm { index: 3, .. })));

        let product = parser.parse("John likes Mary").unwrap();
        let best = product.best().unwrap();
        assert_eq!(best.category.to_string(), "S[dcl]");
        assert_eq!(best.semantics.to_string(), "likes(mary, john)");
        assert_eq!(product.beam, None);
        assert!(!product.glued);
        let timing = product.timing;
        assert_eq!(timing.unpacking, timing.parse - timing.chart);
        assert!(timing.parse >= timing.chart);
    }

    #[test]
    fn test_empty_input() {
        let mut parser = Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default());
        let failure = parser.parse("   ").unwrap_err();
        assert_eq!(failure.error, ParseError::NoAnalysis);
    }

    #[test]
    fn test_no_analysis_keeps_forest() {
        let mut parser = Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default());
        let failure = parser.parse("John Mary").unwrap_err();
        assert_eq!(failure.error, ParseError::NoAnalysis);
        let forest = failure.forest.unwrap();
        assert_eq!(forest.size(), 2);
        assert!(!forest.is_empty(Segment::token(1)).unwrap());
    }

    #[test]
    fn test_tagger_scores_and_beam() {
        let tagger = BetaSupertagger::new(vec![0.5, 0.05])
            .with_tag("likes", "N", 0.9)
            .with_tag("likes", "(S[dcl]\\NP)/NP", 0.1);
        let mut parser =
            Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default()).with_supertagger(tagger);
        assert_eq!(parser.supertagger_beam(), Some(0.5));

        let product = parser.parse("John likes Mary").unwrap();
        assert_eq!(product.beam, Some(0.05));
        let expected = 0.1f64.ln();
        assert!((product.best().unwrap().score - expected).abs() < 1e-9);
        // Timing covers the attempt at the final beam only
        assert_eq!(product.timing.unpacking, product.timing.parse - product.timing.chart);
    }

    #[test]
    fn test_supertagger_log_probs_of_leaves() {
        let tagger = BetaSupertagger::new(vec![0.5, 0.05])
            .with_tag("likes", "N", 0.9)
            .with_tag("likes", "(S[dcl]\\NP)/NP", 0.1);
        let mut tagged =
            Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default()).with_supertagger(tagger);
        let product = tagged.parse("John likes Mary").unwrap();
        let best = product.best().unwrap();
        assert_eq!(best.leaves().len(), 3);

        let log_probs = tagged.supertagger_log_probs(best);
        assert_eq!(log_probs.len(), 3);
        assert_eq!(log_probs[0], None);
        assert!((log_probs[1].unwrap() - 0.1f64.ln()).abs() < 1e-9);
        assert_eq!(log_probs[2], None);

        let mut untagged = Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default());
        assert_eq!(untagged.supertagger_log_probs(best), vec![None, None, None]);
    }

    #[test]
    fn test_oracle_best() {
        let mut parser = Parser::new(lexicon(), CombinatoryRules::new(), ParserConfig::default());
        let product = parser.parse("John likes Mary").unwrap();
        let gold = "likes(mary, john)";

        let (found, exact) = product.oracle_best(|s| if s.to_string() == gold { 1.0 } else { 0.0 }).unwrap();
        assert!(exact);
        assert_eq!(found.semantics.to_string(), gold);

        let (_, exact) = product.oracle_best(|s| if s.mentions("mary") { 0.5 } else { 0.0 }).unwrap();
        assert!(!exact);
        assert!(product.oracle_best(|_| 0.0).is_none());
    }
}
