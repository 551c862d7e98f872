use std::collections::HashSet;

use ccg_protocol::SymbolId;

use crate::sign::Sign;

/// A sign, its score, and, for the representative of a packed class, the
/// ranked list of analyses it stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSymbol {
    sign: Sign,
    score: f64,
    alternatives: Option<Vec<SymbolId>>,
    saved: Option<Vec<SymbolId>>,
}

impl ScoredSymbol {
    pub fn sign(&self) -> &Sign {
        &self.sign
    }

    /// Score of this symbol's own derivation.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn is_representative(&self) -> bool {
        self.alternatives.is_some()
    }

    /// Ranked alternatives, best first; empty unless representative.
    pub fn alternatives(&self) -> &[SymbolId] {
        self.alternatives.as_deref().unwrap_or(&[])
    }

    /// More than one analysis behind this symbol.
    pub fn is_disjunctive(&self) -> bool {
        self.alternatives().len() > 1
    }
}

/// Owns every symbol created during one chart completion. Symbols refer
/// to each other by [`SymbolId`], which stays valid for the arena's life.
#[derive(Debug, Clone, Default)]
pub struct SymbolArena {
    symbols: Vec<ScoredSymbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn alloc(&mut self, sign: Sign, score: f64) -> SymbolId {
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(ScoredSymbol { sign, score, alternatives: None, saved: None });
        id
    }

    pub fn get(&self, id: SymbolId) -> &ScoredSymbol {
        &self.symbols[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &ScoredSymbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId::new(i as u32), s))
    }

    /// Ranking score of a class: its best alternative, or the symbol's own
    /// score when it represents nothing but itself.
    pub fn best_score(&self, id: SymbolId) -> f64 {
        let symbol = self.get(id);
        match &symbol.alternatives {
            None => symbol.score,
            Some(alts) => alts.iter().map(|a| self.get(*a).score).fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// What unpacking expands `id` into: its alternatives when it is a
    /// representative, otherwise the symbol alone.
    pub fn expansions(&self, id: SymbolId) -> Vec<SymbolId> {
        match &self.get(id).alternatives {
            Some(alts) => alts.clone(),
            None => vec![id],
        }
    }

    /// Whether `target` is among the symbols that any of `from` was built
    /// from, looking through alternatives. Only symbols over the target's
    /// segment are followed, since binary inputs cover shorter spans.
    pub fn reaches(&self, from: &[SymbolId], target: SymbolId) -> bool {
        let segment = self.get(target).sign.segment;
        let mut visited = HashSet::new();
        let mut stack = from.to_vec();
        while let Some(next) = stack.pop() {
            if next == target {
                return true;
            }
            if !visited.insert(next) || self.get(next).sign.segment != segment {
                continue;
            }
            for alt in self.expansions(next) {
                if alt == target {
                    return true;
                }
                stack.extend_from_slice(self.get(alt).sign.inputs());
            }
        }
        false
    }

    /// Makes `id` a representative of the single-member class `[id]`.
    /// Existing alternatives are left untouched.
    pub fn init_alternatives(&mut self, id: SymbolId) {
        let symbol = &mut self.symbols[id.index()];
        if symbol.alternatives.is_none() {
            symbol.alternatives = Some(vec![id]);
        }
    }

    pub(crate) fn set_alternatives(&mut self, id: SymbolId, alternatives: Vec<SymbolId>) {
        self.symbols[id.index()].alternatives = Some(alternatives);
    }

    /// Installs a temporary alternatives list, saving the current one.
    pub fn replace_alternatives(&mut self, id: SymbolId, alternatives: Vec<SymbolId>) {
        let symbol = &mut self.symbols[id.index()];
        symbol.saved = symbol.alternatives.take();
        symbol.alternatives = Some(alternatives);
    }

    /// Puts back every saved list reachable from `id`.
    pub fn restore_alternatives(&mut self, id: SymbolId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let symbol = &mut self.symbols[next.index()];
            let Some(saved) = symbol.saved.take() else { continue };
            symbol.alternatives = Some(saved);
            for alt in self.expansions(next) {
                stack.extend_from_slice(self.get(alt).sign.inputs());
            }
        }
    }
}
