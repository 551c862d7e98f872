use std::collections::HashSet;
use std::time::{Duration, Instant};

use ccg_grammar::{Category, RuleOutput, RuleSet, Semantics, UnifyContext};
use ccg_protocol::SymbolId;
use tracing::{trace, warn};

use crate::cell::PruneLimits;
use crate::chart::{Chart, ChartError};
use crate::error::{Limit, ParseError};
use crate::scored::{ScoredSymbol, SymbolArena};
use crate::scorer::SymbolScorer;
use crate::sign::{History, Segment, Sign};
use crate::unpack::{self, Derivation};

/// Resource bounds and pruning for one chart completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompleterConfig {
    pub time_limit: Option<Duration>,
    /// Derived symbols allowed before giving up. Lexical seeds don't count.
    pub edge_limit: Option<usize>,
    pub prune_limit: usize,
    pub cell_prune_limit: usize,
}

impl CompleterConfig {
    fn limits(&self) -> PruneLimits {
        PruneLimits { per_class: self.prune_limit, per_cell: self.cell_prune_limit }
    }
}

/// A packed chart together with the symbols its cells refer to.
#[derive(Debug, Clone)]
pub struct Forest {
    chart: Chart,
    symbols: SymbolArena,
}

impl Forest {
    pub fn new(chart: Chart) -> Self {
        Self { chart, symbols: SymbolArena::new() }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn symbols(&self) -> &SymbolArena {
        &self.symbols
    }

    pub fn size(&self) -> usize {
        self.chart.size()
    }

    /// The segment spanning every token, if there are any.
    pub fn whole(&self) -> Option<Segment> {
        (self.size() > 0).then(|| Segment::new(0, self.size() - 1))
    }

    pub fn is_empty(&self, segment: Segment) -> Result<bool, ChartError> {
        Ok(self.chart.get(segment.first, segment.last)?.map_or(true, |c| c.is_empty()))
    }

    /// Class representatives at a segment, in class creation order.
    pub fn representatives(&self, segment: Segment) -> Result<Vec<SymbolId>, ChartError> {
        Ok(self
            .chart
            .get(segment.first, segment.last)?
            .map(|c| c.representatives().collect())
            .unwrap_or_default())
    }
}

/// Fills a chart bottom-up with the analyses a rule set licenses.
///
/// One completer serves one parse attempt: it owns the forest it builds and
/// the unification context that numbers category variables.
pub struct ChartCompleter<'g> {
    rules: &'g dyn RuleSet,
    scorer: &'g dyn SymbolScorer,
    unify: UnifyContext,
    config: CompleterConfig,
    forest: Forest,
    edges: usize,
    started: Instant,
}

impl<'g> ChartCompleter<'g> {
    pub fn new(rules: &'g dyn RuleSet, scorer: &'g dyn SymbolScorer, chart: Chart, config: CompleterConfig) -> Self {
        let mut unify = UnifyContext::new();
        unify.start_sequence();
        Self {
            rules,
            scorer,
            unify,
            config,
            forest: Forest::new(chart),
            edges: 0,
            started: Instant::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.forest.size()
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Derived symbols created so far.
    pub fn edges(&self) -> usize {
        self.edges
    }

    pub fn is_empty(&self, segment: Segment) -> Result<bool, ChartError> {
        self.forest.is_empty(segment)
    }

    /// Seeds a lexical analysis of the token at `index`. The category's
    /// variables are renamed apart from every other seed.
    pub fn add_lexical(
        &mut self,
        index: usize,
        word: &str,
        category: &Category,
        semantics: Semantics,
        score: f64,
    ) -> Result<SymbolId, ChartError> {
        let category = self.unify.reindex(category);
        let cell = self.forest.chart.get_or_insert(index, index)?;
        let id = self.forest.symbols.alloc(Sign::lexical(word, category, semantics, index), score);
        cell.push(id);
        Ok(id)
    }

    /// Runs the whole completion: seeds, spans of growing length and, when
    /// `glue` is set and nothing spans the input, the glue pass.
    pub fn complete(&mut self, glue: bool) -> Result<(), ParseError> {
        let size = self.size();
        for i in 0..size {
            self.annotate(Segment::token(i))?;
        }
        self.fill(false)?;
        if let Some(whole) = self.forest.whole() {
            if glue && self.is_empty(whole)? {
                trace!("nothing spans the input, gluing");
                self.fill(true)?;
            }
        }
        Ok(())
    }

    // Spans of growing length. The glue pass only packs what it adds.
    fn fill(&mut self, glue: bool) -> Result<(), ParseError> {
        let size = self.size();
        for last in 1..size {
            for first in (0..last).rev() {
                for split in first..last {
                    let (left, right) = (Segment::new(first, split), Segment::new(split + 1, last));
                    if glue {
                        self.glue(left, right)?;
                    } else {
                        self.combine(left, right)?;
                    }
                    self.check_limits()?;
                }
                if glue {
                    self.pack(Segment::new(first, last))?;
                } else {
                    self.annotate(Segment::new(first, last))?;
                }
            }
        }
        Ok(())
    }

    /// Fails once the edge or time bound is exceeded.
    pub fn check_limits(&self) -> Result<(), ParseError> {
        if let Some(limit) = self.config.edge_limit {
            if self.edges > limit {
                warn!(edges = self.edges, limit, "edge limit exceeded");
                return Err(ParseError::LimitExceeded(Limit::Edges(limit)));
            }
        }
        if let Some(limit) = self.config.time_limit {
            if self.started.elapsed() > limit {
                warn!(limit_ms = limit.as_millis() as u64, "time limit exceeded");
                return Err(ParseError::LimitExceeded(Limit::Time(limit)));
            }
        }
        Ok(())
    }

    /// Packs the segment's pending symbols, then applies unary rules once
    /// to the classes present. An output joins the class of its signature
    /// unless that class is one of the output's own sources.
    pub fn annotate(&mut self, segment: Segment) -> Result<(), ChartError> {
        let limits = self.config.limits();
        let reps: Vec<SymbolId> = match self.forest.chart.get_mut(segment.first, segment.last)? {
            Some(cell) => {
                cell.pack(&mut self.forest.symbols, limits);
                cell.representatives().collect()
            }
            None => return Ok(()),
        };

        for rep in reps {
            let category = self.forest.symbols.get(rep).sign().category.clone();
            let signature = category.signature();
            // Cell pruning may have dropped the class since
            if self.class_representative(segment, &signature)? != Some(rep) {
                continue;
            }
            for output in self.rules.apply_unary(&mut self.unify, &category) {
                let output_signature = output.category.signature();
                if output_signature == signature {
                    continue;
                }
                if let Some(existing) = self.class_representative(segment, &output_signature)? {
                    if self.forest.symbols.reaches(&[rep], existing) {
                        trace!(from = %signature, to = %output_signature, "unary cycle skipped");
                        continue;
                    }
                }
                let Some(id) = self.derive(output, vec![rep], segment) else { continue };
                if let Some(cell) = self.forest.chart.get_mut(segment.first, segment.last)? {
                    cell.push(id);
                    cell.pack(&mut self.forest.symbols, limits);
                }
            }
        }
        Ok(())
    }

    fn class_representative(&self, segment: Segment, signature: &str) -> Result<Option<SymbolId>, ChartError> {
        Ok(self
            .forest
            .chart
            .get(segment.first, segment.last)?
            .and_then(|cell| cell.class_of(signature))
            .map(|class| class.representative()))
    }

    /// Applies the binary rules to every pair of classes in two adjacent
    /// segments, adding results to the segment they span.
    pub fn combine(&mut self, left: Segment, right: Segment) -> Result<(), ChartError> {
        self.pair(left, right, false)
    }

    pub fn glue(&mut self, left: Segment, right: Segment) -> Result<(), ChartError> {
        self.pair(left, right, true)
    }

    fn pair(&mut self, left: Segment, right: Segment, glue: bool) -> Result<(), ChartError> {
        let lefts = self.categorized(left)?;
        let rights = self.categorized(right)?;
        if lefts.is_empty() || rights.is_empty() {
            return Ok(());
        }
        let target = Segment::new(left.first, right.last);

        let mut derived = Vec::new();
        for (l, left_category) in &lefts {
            for (r, right_category) in &rights {
                let outputs = if glue {
                    self.rules.apply_glue(&mut self.unify, left_category, right_category)
                } else {
                    self.rules.apply_binary(&mut self.unify, left_category, right_category)
                };
                for output in outputs {
                    derived.extend(self.derive(output, vec![*l, *r], target));
                }
            }
        }
        if !derived.is_empty() {
            let cell = self.forest.chart.get_or_insert(target.first, target.last)?;
            for id in derived {
                cell.push(id);
            }
        }
        Ok(())
    }

    fn categorized(&self, segment: Segment) -> Result<Vec<(SymbolId, Category)>, ChartError> {
        Ok(self
            .forest
            .representatives(segment)?
            .into_iter()
            .map(|id| (id, self.forest.symbols.get(id).sign().category.clone()))
            .collect())
    }

    fn derive(&mut self, output: RuleOutput, inputs: Vec<SymbolId>, segment: Segment) -> Option<SymbolId> {
        let symbols = &self.forest.symbols;
        let semantics = {
            let operands: Vec<&Semantics> = inputs.iter().map(|id| &symbols.get(*id).sign().semantics).collect();
            output.op.evaluate(&operands)?
        };
        let scores: Vec<f64> = inputs.iter().map(|id| symbols.best_score(*id)).collect();
        let sign = Sign {
            category: output.category,
            semantics,
            segment,
            history: History::Rule { rule: output.rule, op: output.op, inputs },
        };
        let score = self.scorer.score(&sign, &scores);
        self.edges += 1;
        Some(self.forest.symbols.alloc(sign, score))
    }

    /// Packs pending symbols at a segment into its classes.
    pub fn pack(&mut self, segment: Segment) -> Result<(), ChartError> {
        let limits = self.config.limits();
        if let Some(cell) = self.forest.chart.get_mut(segment.first, segment.last)? {
            cell.pack(&mut self.forest.symbols, limits);
        }
        Ok(())
    }

    /// The `k` best analyses over a segment, best first.
    pub fn unpack(&self, segment: Segment, k: usize, lazy: bool) -> Result<Vec<Derivation>, ChartError> {
        let reps = self.forest.representatives(segment)?;
        Ok(unpack::unpack(&self.forest.symbols, self.scorer, &reps, k, lazy))
    }

    /// Like [`ChartCompleter::unpack`], but only over alternatives `keep`
    /// accepts. Alternatives are restored afterwards.
    pub fn unpack_filtered(
        &mut self,
        segment: Segment,
        k: usize,
        lazy: bool,
        keep: impl Fn(&ScoredSymbol) -> bool,
    ) -> Result<Vec<Derivation>, ChartError> {
        let reps = self.forest.representatives(segment)?;
        let symbols = &mut self.forest.symbols;

        let mut visited = HashSet::new();
        let mut stack = reps.clone();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) || !symbols.get(id).is_representative() {
                continue;
            }
            let all = symbols.expansions(id);
            let kept: Vec<SymbolId> = all.iter().copied().filter(|a| keep(symbols.get(*a))).collect();
            for alt in &all {
                stack.extend_from_slice(symbols.get(*alt).sign().inputs());
            }
            symbols.replace_alternatives(id, kept);
        }

        let found = unpack::unpack(symbols, self.scorer, &reps, k, lazy);
        for rep in reps {
            symbols.restore_alternatives(rep);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartBacking;
    use crate::scorer::LogLinearScorer;
    use ccg_grammar::rules::{FORWARD_COMPOSITION, GLUE, TYPE_RAISING};
    use ccg_grammar::{parse_category, CombinatoryRules, SemanticOp};

    fn seed(completer: &mut ChartCompleter<'_>, words: &[(usize, &str, &str, f64)]) {
        for (index, word, category, score) in words {
            let category = parse_category(category).unwrap();
            completer.add_lexical(*index, word, &category, Semantics::pred(word), *score).unwrap();
        }
    }

    fn a_big_apple(completer: &mut ChartCompleter<'_>) {
        seed(
            completer,
            &[(0, "a", "NP[sg]/N[sg]", -1.0), (1, "big", "N/N", -0.5), (2, "apple", "N[sg]", -0.25)],
        );
    }

    #[test]
    fn test_determiner_noun() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 2), CompleterConfig::default());
        seed(&mut completer, &[(0, "a", "NP[sg]/N[sg]", -1.0), (1, "apple", "N[sg]", -0.5)]);
        completer.complete(false).unwrap();

        let whole = Segment::new(0, 1);
        assert!(!completer.is_empty(whole).unwrap());
        let found = completer.unpack(whole, 10, true).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category.to_string(), "NP[sg]");
        assert_eq!(found[0].semantics.to_string(), "a(apple)");
        assert_eq!(found[0].score, -1.5);
        assert_eq!(found[0].words(), vec!["a", "apple"]);
        assert_eq!(completer.edges(), 1);
    }

    #[test]
    fn test_spurious_ambiguity_is_packed() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Dense, 3), CompleterConfig::default());
        a_big_apple(&mut completer);
        completer.complete(false).unwrap();

        let whole = Segment::new(0, 2);
        let reps = completer.forest().representatives(whole).unwrap();
        assert_eq!(reps.len(), 1);
        assert_eq!(completer.forest().symbols().get(reps[0]).alternatives().len(), 2);

        let lazy = completer.unpack(whole, 0, true).unwrap();
        let eager = completer.unpack(whole, 0, false).unwrap();
        assert_eq!(lazy, eager);
        assert_eq!(lazy[0].semantics.to_string(), "a(big(apple))");
        assert_eq!(lazy[1].semantics.to_string(), "(a . big)(apple)");
        assert!(lazy[1].rules().contains(&FORWARD_COMPOSITION));
    }

    #[test]
    fn test_edge_limit() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let config = CompleterConfig { edge_limit: Some(1), ..Default::default() };
        let mut completer = ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 3), config);
        a_big_apple(&mut completer);

        let err = completer.complete(false).unwrap_err();
        assert_eq!(err, ParseError::LimitExceeded(Limit::Edges(1)));
        assert!(err.is_limit());
        assert!(!completer.is_empty(Segment::new(0, 1)).unwrap());
    }

    #[test]
    fn test_time_limit() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let limit = Duration::from_millis(1);
        let config = CompleterConfig { time_limit: Some(limit), ..Default::default() };
        let mut completer = ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 3), config);
        a_big_apple(&mut completer);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(completer.complete(false).unwrap_err(), ParseError::LimitExceeded(Limit::Time(limit)));
    }

    #[test]
    fn test_unary_rules_apply_once() {
        let rules = CombinatoryRules::new().with_type_raising(parse_category("NP").unwrap());
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 1), CompleterConfig::default());
        seed(&mut completer, &[(0, "john", "NP", -1.0)]);
        completer.complete(false).unwrap();

        let found = completer.unpack(Segment::token(0), 0, true).unwrap();
        let categories: Vec<String> = found.iter().map(|d| d.category.signature()).collect();
        assert_eq!(categories, vec!["NP", "$0/($0\\NP)"]);
        assert_eq!(found[1].semantics.to_string(), "^john");
    }

    #[test]
    fn test_raised_outputs_join_lexical_classes() {
        let rules = CombinatoryRules::new().with_type_raising(parse_category("NP").unwrap());
        let scorer = LogLinearScorer::new().with_rule_penalty(TYPE_RAISING, 0.5);
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 2), CompleterConfig::default());
        seed(
            &mut completer,
            &[(0, "he", "NP", 0.0), (0, "he", "$X/($X\\NP)", -5.0), (1, "sleeps", "S\\NP", -1.0)],
        );
        completer.complete(false).unwrap();

        let reps = completer.forest().representatives(Segment::token(0)).unwrap();
        assert_eq!(reps.len(), 2);
        let symbols = completer.forest().symbols();
        assert_eq!(symbols.get(reps[1]).alternatives().len(), 2);
        assert_eq!(symbols.best_score(reps[1]), 0.5);

        let whole = Segment::new(0, 1);
        let found = completer.unpack(whole, 0, true).unwrap();
        let readings: Vec<(String, f64)> = found.iter().map(|d| (d.semantics.to_string(), d.score)).collect();
        assert_eq!(
            readings,
            vec![
                ("^he(sleeps)".to_string(), -0.5),
                ("sleeps(he)".to_string(), -1.0),
                ("he(sleeps)".to_string(), -6.0),
            ]
        );
        assert_eq!(found, completer.unpack(whole, 0, false).unwrap());
    }

    // Rewrites A as B and B as A.
    struct Swap;

    impl RuleSet for Swap {
        fn apply_unary(&self, _ctx: &mut UnifyContext, input: &Category) -> Vec<RuleOutput> {
            let to = match input.to_string().as_str() {
                "A" => "B",
                "B" => "A",
                _ => return Vec::new(),
            };
            vec![RuleOutput { rule: "swap", category: Category::atom(to), op: SemanticOp::Raise { operand: 0 } }]
        }

        fn apply_binary(&self, _ctx: &mut UnifyContext, _left: &Category, _right: &Category) -> Vec<RuleOutput> {
            Vec::new()
        }

        fn apply_glue(&self, _ctx: &mut UnifyContext, _left: &Category, _right: &Category) -> Vec<RuleOutput> {
            Vec::new()
        }
    }

    #[test]
    fn test_unary_outputs_never_feed_their_own_class() {
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&Swap, &scorer, Chart::new(ChartBacking::Dense, 1), CompleterConfig::default());
        seed(&mut completer, &[(0, "a", "A", -1.0), (0, "b", "B", -2.0)]);
        completer.complete(false).unwrap();

        // A feeds B; B may not feed A back
        assert_eq!(completer.edges(), 1);
        let reps = completer.forest().representatives(Segment::token(0)).unwrap();
        let symbols = completer.forest().symbols();
        assert_eq!(symbols.get(reps[0]).alternatives().len(), 1);
        assert_eq!(symbols.get(reps[1]).alternatives().len(), 2);

        let found = completer.unpack(Segment::token(0), 0, true).unwrap();
        let readings: Vec<String> = found.iter().map(|d| d.semantics.to_string()).collect();
        assert_eq!(readings, vec!["a", "^a", "b"]);
        assert_eq!(found, completer.unpack(Segment::token(0), 0, false).unwrap());
    }

    #[test]
    fn test_glue_only_when_requested() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let words = [(0, "apple", "N", -1.0), (1, "pear", "N", -1.0)];
        let whole = Segment::new(0, 1);

        let mut plain =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 2), CompleterConfig::default());
        seed(&mut plain, &words);
        plain.complete(false).unwrap();
        assert!(plain.is_empty(whole).unwrap());

        let mut glued =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 2), CompleterConfig::default());
        seed(&mut glued, &words);
        glued.complete(true).unwrap();
        let found = glued.unpack(whole, 1, true).unwrap();
        assert_eq!(found[0].category.to_string(), "Frag");
        assert_eq!(found[0].rule, Some(GLUE));
        assert_eq!(found[0].semantics.to_string(), "glue(apple, pear)");
        assert_eq!(found[0].score, -12.0);
    }

    #[test]
    fn test_filtered_unpacking_restores_alternatives() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 3), CompleterConfig::default());
        a_big_apple(&mut completer);
        completer.complete(false).unwrap();
        let whole = Segment::new(0, 2);
        let rep = completer.forest().representatives(whole).unwrap()[0];
        let before = completer.forest().symbols().get(rep).alternatives().to_vec();

        let found = completer
            .unpack_filtered(whole, 0, true, |s| s.sign().rule() != Some(FORWARD_COMPOSITION))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].semantics.to_string(), "a(big(apple))");

        assert_eq!(completer.forest().symbols().get(rep).alternatives(), before.as_slice());
        assert_eq!(completer.unpack(whole, 0, false).unwrap().len(), 2);
    }

    #[test]
    fn test_seed_out_of_bounds() {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Dense, 1), CompleterConfig::default());
        let err = completer
            .add_lexical(1, "x", &Category::atom("N"), Semantics::pred("x"), 0.0)
            .unwrap_err();
        assert_eq!(err, ChartError::OutOfBounds { first: 1, last: 1, size: 1 });
    }
}
