//! Ways to look inside a forest after the fact: a text dump, a JSON
//! snapshot and a graph of the packed derivations.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ccg_protocol::SymbolId;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::chart::ChartError;
use crate::completer::Forest;
use crate::scored::ScoredSymbol;
use crate::sign::Segment;

fn fmt_score(score: f64) -> String {
    if score == 0.0 || score.abs() >= 0.001 {
        format!("{:.3}", score)
    } else {
        format!("{:.2e}", score)
    }
}

fn fmt_symbol(f: &mut fmt::Formatter<'_>, id: SymbolId, symbol: &ScoredSymbol) -> fmt::Result {
    let sign = symbol.sign();
    write!(f, "{} [{}] {} :- {}", id, fmt_score(symbol.score()), sign.semantics, sign.category)?;
    match sign.rule() {
        Some(rule) => {
            write!(f, " ({}", rule)?;
            for input in sign.inputs() {
                write!(f, " {}", input)?;
            }
            write!(f, ")")
        }
        None => write!(f, " `{}`", sign.word().unwrap_or_default()),
    }
}

impl fmt::Display for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols = self.symbols();
        for segment in self.chart().segments() {
            let Ok(Some(cell)) = self.chart().get(segment.first, segment.last) else { continue };
            writeln!(f, "{}:", segment)?;
            for class in cell.classes() {
                let rep = class.representative();
                write!(f, "  ")?;
                fmt_symbol(f, rep, symbols.get(rep))?;
                writeln!(f)?;
                for alt in symbols.get(rep).alternatives().iter().filter(|a| **a != rep) {
                    write!(f, "    | ")?;
                    fmt_symbol(f, *alt, symbols.get(*alt))?;
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub id: u32,
    pub category: String,
    pub semantics: String,
    pub score: f64,
    pub rule: Option<String>,
    pub word: Option<String>,
    pub inputs: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSnapshot {
    pub signature: String,
    pub representative: u32,
    pub alternatives: Vec<SymbolSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub segment: Segment,
    pub classes: Vec<ClassSnapshot>,
}

/// Serializable copy of a chart's packed contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub size: usize,
    pub cells: Vec<CellSnapshot>,
}

impl ChartSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Forest {
    pub fn snapshot(&self) -> ChartSnapshot {
        let symbols = self.symbols();
        let symbol = |id: SymbolId| {
            let sign = symbols.get(id).sign();
            SymbolSnapshot {
                id: id.into(),
                category: sign.category.to_string(),
                semantics: sign.semantics.to_string(),
                score: symbols.get(id).score(),
                rule: sign.rule().map(str::to_string),
                word: sign.word().map(str::to_string),
                inputs: sign.inputs().iter().map(|i| u32::from(*i)).collect(),
            }
        };
        let cells = self
            .chart()
            .segments()
            .into_iter()
            .filter_map(|segment| {
                let cell = self.chart().get(segment.first, segment.last).ok().flatten()?;
                let classes = cell
                    .classes()
                    .iter()
                    .map(|class| ClassSnapshot {
                        signature: class.signature().to_string(),
                        representative: class.representative().into(),
                        alternatives: symbols.get(class.representative()).alternatives().iter().map(|a| symbol(*a)).collect(),
                    })
                    .collect();
                Some(CellSnapshot { segment, classes })
            })
            .collect();
        ChartSnapshot { size: self.size(), cells }
    }

    /// The packed derivations reachable from a segment's classes.
    pub fn derivation_graph(&self, segment: Segment) -> Result<DerivationGraph, ChartError> {
        let symbols = self.symbols();
        let mut graph = DerivationGraph::new();
        let mut visited = HashSet::new();
        let mut stack = self.representatives(segment)?;
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            graph.add_symbol(id);
            for (i, alt) in symbols.expansions(id).into_iter().enumerate() {
                if alt != id {
                    graph.add_edge(id, alt, ForestEdge::Alternative(i));
                }
                for (position, input) in symbols.get(alt).sign().inputs().iter().enumerate() {
                    graph.add_edge(alt, *input, ForestEdge::Input(position));
                    stack.push(*input);
                }
            }
        }
        Ok(graph)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForestEdge {
    /// Representative to one of its alternatives, by rank.
    Alternative(usize),
    /// Derived symbol to a rule input, by position.
    Input(usize),
}

/// One node per symbol; shared sub-analyses appear once.
pub struct DerivationGraph {
    graph: Graph<SymbolId, ForestEdge, Directed>,
    index_map: HashMap<SymbolId, NodeIndex>,
}

impl DerivationGraph {
    fn new() -> Self {
        Self { graph: Graph::new(), index_map: HashMap::new() }
    }

    fn add_symbol(&mut self, id: SymbolId) -> NodeIndex {
        *self.index_map.entry(id).or_insert_with(|| self.graph.add_node(id))
    }

    fn add_edge(&mut self, from: SymbolId, to: SymbolId, edge: ForestEdge) {
        let from_idx = self.add_symbol(from);
        let to_idx = self.add_symbol(to);
        self.graph.add_edge(from_idx, to_idx, edge);
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.index_map.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges of a symbol, in insertion order.
    pub fn edges_from(&self, id: SymbolId) -> Vec<(ForestEdge, SymbolId)> {
        let Some(&idx) = self.index_map.get(&id) else { return Vec::new() };
        let mut edges: Vec<(ForestEdge, SymbolId)> =
            self.graph.edges(idx).map(|e| (*e.weight(), self.graph[e.target()])).collect();
        // petgraph lists outgoing edges newest first
        edges.reverse();
        edges
    }

    pub fn graph(&self) -> &Graph<SymbolId, ForestEdge, Directed> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Chart, ChartBacking};
    use crate::completer::{ChartCompleter, CompleterConfig};
    use crate::scorer::LogLinearScorer;
    use ccg_grammar::{parse_category, CombinatoryRules, Semantics};

    fn forest() -> Forest {
        let rules = CombinatoryRules::new();
        let scorer = LogLinearScorer::new();
        let mut completer =
            ChartCompleter::new(&rules, &scorer, Chart::new(ChartBacking::Sparse, 3), CompleterConfig::default());
        for (i, (word, category)) in [("a", "NP/N"), ("big", "N/N"), ("apple", "N")].iter().enumerate() {
            let category = parse_category(category).unwrap();
            completer.add_lexical(i, word, &category, Semantics::pred(word), -1.0).unwrap();
        }
        completer.complete(false).unwrap();
        completer.into_forest()
    }

    #[test]
    fn test_dump_lists_cells_and_alternatives() {
        let dump = forest().to_string();
        assert!(dump.starts_with("(0, 0):\n"));
        assert!(dump.contains("(0, 2):\n"));
        assert!(dump.contains("a(big(apple))") || dump.contains(":- NP (>"));
        assert_eq!(dump.matches("    | ").count(), 1);
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = forest().snapshot();
        assert_eq!(snapshot.size, 3);
        assert_eq!(snapshot.cells.len(), 6);
        let top = snapshot.cells.iter().find(|c| c.segment == Segment::new(0, 2)).unwrap();
        assert_eq!(top.classes[0].signature, "NP");
        assert_eq!(top.classes[0].alternatives.len(), 2);

        let json = snapshot.to_json().unwrap();
        assert_eq!(ChartSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_graph_shares_sub_analyses() {
        let forest = forest();
        let graph = forest.derivation_graph(Segment::new(0, 2)).unwrap();
        // 3 words, 2 two-word constituents, 2 top analyses
        assert_eq!(graph.node_count(), 7);
        // one alternative edge plus two inputs for each of the four derived symbols
        assert_eq!(graph.edge_count(), 9);
        let top = forest.representatives(Segment::new(0, 2)).unwrap()[0];
        let edges = graph.edges_from(top);
        let kinds: Vec<ForestEdge> = edges.iter().map(|(edge, _)| *edge).collect();
        assert_eq!(kinds, vec![ForestEdge::Input(0), ForestEdge::Input(1), ForestEdge::Alternative(1)]);
    }

    #[test]
    fn test_small_scores_use_exponent() {
        assert_eq!(fmt_score(-1.25), "-1.250");
        assert_eq!(fmt_score(0.0), "0.000");
        assert_eq!(fmt_score(0.0001), "1.00e-4");
    }
}
