//! Enumerates the best analyses packed behind a set of representatives.
//!
//! Both strategies produce the same ranking: by score, then by a structural
//! key (alternative index, then children, left to right). The lazy one only
//! expands what the requested number of analyses needs.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use ccg_grammar::{Category, Semantics};
use ccg_protocol::SymbolId;

use crate::scored::SymbolArena;
use crate::scorer::SymbolScorer;
use crate::sign::{History, Segment};

/// One analysis in unpacking: the alternative chosen for a node and the
/// analyses chosen for its inputs.
#[derive(Debug)]
struct Unpacked {
    symbol: SymbolId,
    alt: usize,
    score: f64,
    children: Vec<Rc<Unpacked>>,
}

fn cmp_key(a: &Unpacked, b: &Unpacked) -> Ordering {
    a.alt.cmp(&b.alt).then_with(|| {
        a.children
            .iter()
            .zip(&b.children)
            .map(|(x, y)| cmp_key(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.children.len().cmp(&b.children.len()))
    })
}

// Less means `a` ranks first.
fn rank(a: &Unpacked, b: &Unpacked) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| cmp_key(a, b))
}

fn rank_top(a: &(usize, Rc<Unpacked>), b: &(usize, Rc<Unpacked>)) -> Ordering {
    b.1.score
        .total_cmp(&a.1.score)
        .then_with(|| a.0.cmp(&b.0))
        .then_with(|| cmp_key(&a.1, &b.1))
}

fn build(
    symbols: &SymbolArena,
    scorer: &dyn SymbolScorer,
    alt_index: usize,
    alt: SymbolId,
    children: Vec<Rc<Unpacked>>,
) -> Rc<Unpacked> {
    let symbol = symbols.get(alt);
    let score = if symbol.sign().is_lexical() {
        symbol.score()
    } else {
        let scores: Vec<f64> = children.iter().map(|c| c.score).collect();
        scorer.score(symbol.sign(), &scores)
    };
    Rc::new(Unpacked { symbol: alt, alt: alt_index, score, children })
}

/// The `k` best analyses under `roots`, best first; `k == 0` means all.
pub fn unpack(
    symbols: &SymbolArena,
    scorer: &dyn SymbolScorer,
    roots: &[SymbolId],
    k: usize,
    lazy: bool,
) -> Vec<Derivation> {
    let k = if k == 0 { usize::MAX } else { k };
    let found = if lazy {
        LazyUnpacker::new(symbols, scorer).top(roots, k)
    } else {
        EagerUnpacker::new(symbols, scorer).top(roots, k)
    };
    found.iter().map(|u| materialize(symbols, u)).collect()
}

struct Candidate {
    item: Rc<Unpacked>,
    alt: SymbolId,
    ranks: Vec<usize>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Max-heap: the better candidate compares greater.
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&other.item, &self.item)
    }
}

#[derive(Default)]
struct NodeState {
    started: bool,
    kbest: Vec<Rc<Unpacked>>,
    heap: BinaryHeap<Candidate>,
    seen: HashSet<(usize, Vec<usize>)>,
    last: Option<(usize, SymbolId, Vec<usize>)>,
}

struct LazyUnpacker<'a> {
    symbols: &'a SymbolArena,
    scorer: &'a dyn SymbolScorer,
    nodes: HashMap<SymbolId, NodeState>,
}

impl<'a> LazyUnpacker<'a> {
    fn new(symbols: &'a SymbolArena, scorer: &'a dyn SymbolScorer) -> Self {
        Self { symbols, scorer, nodes: HashMap::new() }
    }

    fn candidate(&mut self, node: SymbolId, alt_index: usize, alt: SymbolId, ranks: Vec<usize>) {
        let state = self.nodes.entry(node).or_default();
        if !state.seen.insert((alt_index, ranks.clone())) {
            return;
        }
        let inputs = self.symbols.get(alt).sign().inputs().to_vec();
        let mut children = Vec::with_capacity(inputs.len());
        for (input, r) in inputs.iter().zip(&ranks) {
            match self.kth(*input, *r) {
                Some(child) => children.push(child),
                None => return,
            }
        }
        let item = build(self.symbols, self.scorer, alt_index, alt, children);
        if let Some(state) = self.nodes.get_mut(&node) {
            state.heap.push(Candidate { item, alt, ranks });
        }
    }

    /// The `k`-th best analysis of `node`, counting from zero.
    fn kth(&mut self, node: SymbolId, k: usize) -> Option<Rc<Unpacked>> {
        loop {
            let state = self.nodes.entry(node).or_default();
            if let Some(found) = state.kbest.get(k) {
                return Some(found.clone());
            }

            if !state.started {
                state.started = true;
                for (i, alt) in self.symbols.expansions(node).into_iter().enumerate() {
                    let arity = self.symbols.get(alt).sign().inputs().len();
                    self.candidate(node, i, alt, vec![0; arity]);
                }
            } else if let Some((alt_index, alt, ranks)) = state.last.take() {
                for i in 0..ranks.len() {
                    let mut next = ranks.clone();
                    next[i] += 1;
                    self.candidate(node, alt_index, alt, next);
                }
            }

            let state = self.nodes.get_mut(&node)?;
            let best = state.heap.pop()?;
            state.last = Some((best.item.alt, best.alt, best.ranks));
            state.kbest.push(best.item);
        }
    }

    fn top(&mut self, roots: &[SymbolId], k: usize) -> Vec<Rc<Unpacked>> {
        let mut heap: BinaryHeap<TopCandidate> = BinaryHeap::new();
        for (class, root) in roots.iter().enumerate() {
            if let Some(item) = self.kth(*root, 0) {
                heap.push(TopCandidate { entry: (class, item), rank: 0 });
            }
        }
        let mut found = Vec::new();
        while found.len() < k {
            let Some(TopCandidate { entry: (class, item), rank }) = heap.pop() else { break };
            found.push(item);
            if let Some(next) = self.kth(roots[class], rank + 1) {
                heap.push(TopCandidate { entry: (class, next), rank: rank + 1 });
            }
        }
        found
    }
}

struct TopCandidate {
    entry: (usize, Rc<Unpacked>),
    rank: usize,
}

impl PartialEq for TopCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TopCandidate {}

impl PartialOrd for TopCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TopCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_top(&other.entry, &self.entry)
    }
}

struct EagerUnpacker<'a> {
    symbols: &'a SymbolArena,
    scorer: &'a dyn SymbolScorer,
    memo: HashMap<SymbolId, Rc<Vec<Rc<Unpacked>>>>,
}

impl<'a> EagerUnpacker<'a> {
    fn new(symbols: &'a SymbolArena, scorer: &'a dyn SymbolScorer) -> Self {
        Self { symbols, scorer, memo: HashMap::new() }
    }

    /// Every analysis of `node`, ranked.
    fn all(&mut self, node: SymbolId) -> Rc<Vec<Rc<Unpacked>>> {
        if let Some(found) = self.memo.get(&node) {
            return found.clone();
        }
        let mut items = Vec::new();
        for (i, alt) in self.symbols.expansions(node).into_iter().enumerate() {
            let inputs = self.symbols.get(alt).sign().inputs().to_vec();
            let mut combos: Vec<Vec<Rc<Unpacked>>> = vec![Vec::new()];
            for input in inputs {
                let options = self.all(input);
                combos = combos
                    .into_iter()
                    .flat_map(|prefix| {
                        options.iter().map(move |option| {
                            let mut children = prefix.clone();
                            children.push(option.clone());
                            children
                        })
                    })
                    .collect();
            }
            for children in combos {
                items.push(build(self.symbols, self.scorer, i, alt, children));
            }
        }
        items.sort_by(|a, b| rank(a, b));
        let items = Rc::new(items);
        self.memo.insert(node, items.clone());
        items
    }

    fn top(&mut self, roots: &[SymbolId], k: usize) -> Vec<Rc<Unpacked>> {
        let mut entries: Vec<(usize, Rc<Unpacked>)> = Vec::new();
        for (class, root) in roots.iter().enumerate() {
            entries.extend(self.all(*root).iter().map(|item| (class, item.clone())));
        }
        entries.sort_by(rank_top);
        entries.into_iter().take(k).map(|(_, item)| item).collect()
    }
}

/// A fully unpacked analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub symbol: SymbolId,
    pub category: Category,
    pub semantics: Semantics,
    pub segment: Segment,
    /// Rule that built this node; `None` for lexical leaves.
    pub rule: Option<&'static str>,
    pub word: Option<String>,
    pub score: f64,
    pub children: Vec<Derivation>,
}

impl Derivation {
    /// Words at the leaves, left to right.
    pub fn words(&self) -> Vec<&str> {
        match &self.word {
            Some(word) => vec![word.as_str()],
            None => self.children.iter().flat_map(|c| c.words()).collect(),
        }
    }

    /// Lexical leaves, left to right.
    pub fn leaves(&self) -> Vec<&Derivation> {
        if self.word.is_some() {
            return vec![self];
        }
        self.children.iter().flat_map(|c| c.leaves()).collect()
    }

    /// Rules used, in pre-order.
    pub fn rules(&self) -> Vec<&'static str> {
        let mut rules: Vec<&'static str> = self.rule.into_iter().collect();
        for child in &self.children {
            rules.extend(child.rules());
        }
        rules
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let label = self.rule.map(str::to_string).or_else(|| self.word.as_ref().map(|w| format!("`{}`", w)));
        writeln!(
            f,
            "{:indent$}{} {} : {} [{:.3}]",
            "",
            label.unwrap_or_default(),
            self.category,
            self.semantics,
            self.score,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

// Semantics are rebuilt from the chosen children rather than read off the
// packed sign, whose inputs may be other members of the same class.
fn materialize(symbols: &SymbolArena, item: &Unpacked) -> Derivation {
    let children: Vec<Derivation> = item.children.iter().map(|c| materialize(symbols, c)).collect();
    let sign = symbols.get(item.symbol).sign();
    let semantics = match &sign.history {
        History::Lexical { .. } => sign.semantics.clone(),
        History::Rule { op, .. } => {
            let operands: Vec<&Semantics> = children.iter().map(|c| &c.semantics).collect();
            op.evaluate(&operands).unwrap_or_else(|| sign.semantics.clone())
        }
    };
    Derivation {
        symbol: item.symbol,
        category: sign.category.clone(),
        semantics,
        segment: sign.segment,
        rule: sign.rule(),
        word: sign.word().map(str::to_string),
        score: item.score,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::LogLinearScorer;
    use crate::sign::Sign;
    use ccg_grammar::SemanticOp;

    fn leaf(symbols: &mut SymbolArena, word: &str, index: usize, score: f64) -> SymbolId {
        symbols.alloc(Sign::lexical(word, Category::atom("N"), Semantics::pred(word), index), score)
    }

    // X = {x1: -1, x2: -3}, Y = {y1: -2, y2: -2.5}, top = X Y
    fn forest() -> (SymbolArena, SymbolId) {
        let mut symbols = SymbolArena::new();
        let x1 = leaf(&mut symbols, "x1", 0, -1.0);
        let x2 = leaf(&mut symbols, "x2", 0, -3.0);
        let y1 = leaf(&mut symbols, "y1", 1, -2.0);
        let y2 = leaf(&mut symbols, "y2", 1, -2.5);
        symbols.set_alternatives(x1, vec![x1, x2]);
        symbols.set_alternatives(y1, vec![y1, y2]);
        let top = symbols.alloc(
            Sign {
                category: Category::atom("S"),
                semantics: Semantics::pred("s"),
                segment: Segment::new(0, 1),
                history: History::Rule {
                    rule: "glue",
                    op: SemanticOp::Glue { left: 0, right: 1 },
                    inputs: vec![x1, y1],
                },
            },
            -3.0,
        );
        symbols.init_alternatives(top);
        (symbols, top)
    }

    fn scores(found: &[Derivation]) -> Vec<f64> {
        found.iter().map(|d| d.score).collect()
    }

    #[test]
    fn test_lazy_k_best() {
        let (symbols, top) = forest();
        let scorer = LogLinearScorer::new().with_glue_penalty(0.0);
        let found = unpack(&symbols, &scorer, &[top], 3, true);
        assert_eq!(scores(&found), vec![-3.0, -3.5, -5.0]);
        assert_eq!(found[1].semantics.to_string(), "glue(x1, y2)");
        assert_eq!(found[2].words(), vec!["x2", "y1"]);
    }

    #[test]
    fn test_eager_matches_lazy() {
        let (symbols, top) = forest();
        let scorer = LogLinearScorer::new();
        for k in 0..6 {
            assert_eq!(unpack(&symbols, &scorer, &[top], k, true), unpack(&symbols, &scorer, &[top], k, false));
        }
        assert_eq!(unpack(&symbols, &scorer, &[top], 0, false).len(), 4);
    }

    #[test]
    fn test_empty_alternatives_yield_nothing() {
        let (mut symbols, top) = forest();
        let x1 = symbols.get(top).sign().inputs()[0];
        symbols.replace_alternatives(x1, Vec::new());
        let scorer = LogLinearScorer::new();
        assert!(unpack(&symbols, &scorer, &[top], 5, true).is_empty());
        assert!(unpack(&symbols, &scorer, &[top], 5, false).is_empty());
    }

    #[test]
    fn test_tree_display() {
        let (symbols, top) = forest();
        let scorer = LogLinearScorer::new().with_glue_penalty(0.0);
        let best = &unpack(&symbols, &scorer, &[top], 1, true)[0];
        let text = best.to_string();
        assert!(text.starts_with("glue S : glue(x1, y1) [-3.000]"));
        assert!(text.contains("  `x1` N : x1 [-1.000]"));
    }
}
