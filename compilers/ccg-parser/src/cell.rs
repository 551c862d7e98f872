use std::collections::HashMap;

use ccg_protocol::SymbolId;
use tracing::trace;

use crate::scored::SymbolArena;

/// Bounds applied whenever a cell is packed. Zero disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneLimits {
    pub per_class: usize,
    pub per_cell: usize,
}

/// All analyses of one category signature within a cell, behind one
/// representative symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedClass {
    signature: String,
    representative: SymbolId,
}

impl PackedClass {
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn representative(&self) -> SymbolId {
        self.representative
    }
}

/// The analyses of one segment: newly derived symbols wait in `pending`
/// until [`Cell::pack`] sorts them into classes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    classes: Vec<PackedClass>,
    index: HashMap<String, usize>,
    pending: Vec<SymbolId>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: SymbolId) {
        self.pending.push(id);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[PackedClass] {
        &self.classes
    }

    /// Representatives in class creation order.
    pub fn representatives(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.classes.iter().map(|c| c.representative)
    }

    pub fn class_of(&self, signature: &str) -> Option<&PackedClass> {
        self.index.get(signature).map(|&i| &self.classes[i])
    }

    /// Analyses retained over all classes.
    pub fn analyses(&self, symbols: &SymbolArena) -> usize {
        self.classes.iter().map(|c| symbols.get(c.representative).alternatives().len()).sum()
    }

    /// Sorts pending symbols into classes and applies the prune limits.
    ///
    /// A symbol whose signature already has a class joins it; the class
    /// keeps its representative. Returns the number of symbols discarded.
    pub fn pack(&mut self, symbols: &mut SymbolArena, limits: PruneLimits) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending);

        let mut groups: Vec<(String, Vec<SymbolId>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();
        for id in pending {
            let signature = symbols.get(id).sign().category.signature();
            match group_index.get(&signature) {
                Some(&g) => groups[g].1.push(id),
                None => {
                    group_index.insert(signature.clone(), groups.len());
                    groups.push((signature, vec![id]));
                }
            }
        }

        let mut discarded = 0;
        for (signature, members) in groups {
            match self.index.get(&signature) {
                Some(&c) => {
                    let representative = self.classes[c].representative;
                    let mut alternatives = symbols.get(representative).alternatives().to_vec();
                    alternatives.extend(members);
                    discarded += rank_and_truncate(symbols, &mut alternatives, limits.per_class);
                    symbols.set_alternatives(representative, alternatives);
                }
                None => {
                    let mut alternatives = members;
                    rank(symbols, &mut alternatives);
                    let representative = alternatives[0];
                    discarded += truncate(&mut alternatives, limits.per_class);
                    symbols.set_alternatives(representative, alternatives);
                    self.index.insert(signature.clone(), self.classes.len());
                    self.classes.push(PackedClass { signature, representative });
                }
            }
        }

        discarded += self.prune_cell(symbols, limits.per_cell);
        trace!(classes = self.classes.len(), discarded, "packed cell");
        discarded
    }

    fn prune_cell(&mut self, symbols: &mut SymbolArena, limit: usize) -> usize {
        let total = self.analyses(symbols);
        if limit == 0 || total <= limit {
            return 0;
        }
        let mut all: Vec<SymbolId> = self
            .classes
            .iter()
            .flat_map(|c| symbols.get(c.representative).alternatives().to_vec())
            .collect();
        rank(symbols, &mut all);
        all.truncate(limit);

        for class in &self.classes {
            let kept: Vec<SymbolId> = symbols
                .get(class.representative)
                .alternatives()
                .iter()
                .copied()
                .filter(|a| all.contains(a))
                .collect();
            symbols.set_alternatives(class.representative, kept);
        }
        self.classes.retain(|c| !symbols.get(c.representative).alternatives().is_empty());
        self.index = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.signature.clone(), i))
            .collect();
        total - limit
    }
}

// Best first; the sort is stable so ties keep insertion order.
fn rank(symbols: &SymbolArena, ids: &mut [SymbolId]) {
    ids.sort_by(|a, b| symbols.get(*b).score().total_cmp(&symbols.get(*a).score()));
}

fn truncate(ids: &mut Vec<SymbolId>, limit: usize) -> usize {
    if limit == 0 || ids.len() <= limit {
        return 0;
    }
    let dropped = ids.len() - limit;
    ids.truncate(limit);
    dropped
}

fn rank_and_truncate(symbols: &SymbolArena, ids: &mut Vec<SymbolId>, limit: usize) -> usize {
    rank(symbols, ids);
    truncate(ids, limit)
}
