use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::Cell;
use crate::sign::Segment;

/// Storage layout of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartBacking {
    /// A full `size * size` table.
    Dense,
    /// Only populated segments are stored.
    #[default]
    Sparse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("segment ({first}, {last}) is out of bounds for a chart of size {size}")]
    OutOfBounds { first: usize, last: usize, size: usize },
}

fn check(first: usize, last: usize, size: usize) -> Result<(), ChartError> {
    if first > last || last >= size {
        return Err(ChartError::OutOfBounds { first, last, size });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct DenseChart {
    size: usize,
    cells: Vec<Option<Cell>>,
}

impl DenseChart {
    pub fn new(size: usize) -> Self {
        Self { size, cells: vec![None; size * size] }
    }

    fn slot(&self, first: usize, last: usize) -> usize {
        first * self.size + last
    }

    fn resize(&mut self, size: usize) {
        let mut cells = vec![None; size * size];
        for first in 0..self.size.min(size) {
            for last in first..self.size.min(size) {
                let slot = self.slot(first, last);
                cells[first * size + last] = self.cells[slot].take();
            }
        }
        self.size = size;
        self.cells = cells;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SparseChart {
    size: usize,
    cells: BTreeMap<usize, BTreeMap<usize, Cell>>,
}

impl SparseChart {
    pub fn new(size: usize) -> Self {
        Self { size, cells: BTreeMap::new() }
    }
}

/// Cells indexed by inclusive segment `(first, last)`.
#[derive(Debug, Clone)]
pub enum Chart {
    Dense(DenseChart),
    Sparse(SparseChart),
}

impl Chart {
    pub fn new(backing: ChartBacking, size: usize) -> Self {
        match backing {
            ChartBacking::Dense => Chart::Dense(DenseChart::new(size)),
            ChartBacking::Sparse => Chart::Sparse(SparseChart::new(size)),
        }
    }

    pub fn backing(&self) -> ChartBacking {
        match self {
            Chart::Dense(_) => ChartBacking::Dense,
            Chart::Sparse(_) => ChartBacking::Sparse,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Chart::Dense(c) => c.size,
            Chart::Sparse(c) => c.size,
        }
    }

    pub fn get(&self, first: usize, last: usize) -> Result<Option<&Cell>, ChartError> {
        check(first, last, self.size())?;
        Ok(match self {
            Chart::Dense(c) => c.cells[c.slot(first, last)].as_ref(),
            Chart::Sparse(c) => c.cells.get(&first).and_then(|row| row.get(&last)),
        })
    }

    pub fn get_mut(&mut self, first: usize, last: usize) -> Result<Option<&mut Cell>, ChartError> {
        check(first, last, self.size())?;
        Ok(match self {
            Chart::Dense(c) => {
                let slot = c.slot(first, last);
                c.cells[slot].as_mut()
            }
            Chart::Sparse(c) => c.cells.get_mut(&first).and_then(|row| row.get_mut(&last)),
        })
    }

    /// The cell at the segment, created empty if absent.
    pub fn get_or_insert(&mut self, first: usize, last: usize) -> Result<&mut Cell, ChartError> {
        check(first, last, self.size())?;
        Ok(match self {
            Chart::Dense(c) => {
                let slot = c.slot(first, last);
                c.cells[slot].get_or_insert_with(Cell::new)
            }
            Chart::Sparse(c) => c.cells.entry(first).or_default().entry(last).or_default(),
        })
    }

    pub fn set(&mut self, first: usize, last: usize, cell: Cell) -> Result<(), ChartError> {
        *self.get_or_insert(first, last)? = cell;
        Ok(())
    }

    /// Adds `n` token positions at the end.
    pub fn grow_by(&mut self, n: usize) {
        match self {
            Chart::Dense(c) => {
                let size = c.size + n;
                c.resize(size);
            }
            Chart::Sparse(c) => c.size += n,
        }
    }

    /// Drops every cell starting at or after `offset`. The size is kept so
    /// the dropped segments can be recomputed.
    pub fn truncate_from(&mut self, offset: usize) {
        match self {
            Chart::Dense(c) => {
                for first in offset..c.size {
                    for last in first..c.size {
                        let slot = c.slot(first, last);
                        c.cells[slot] = None;
                    }
                }
            }
            Chart::Sparse(c) => {
                c.cells.retain(|first, _| *first < offset);
            }
        }
    }

    /// Populated segments, ordered by first then last position.
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Chart::Dense(c) => (0..c.size)
                .flat_map(|first| (first..c.size).map(move |last| Segment::new(first, last)))
                .filter(|s| c.cells[c.slot(s.first, s.last)].is_some())
                .collect(),
            Chart::Sparse(c) => c
                .cells
                .iter()
                .flat_map(|(first, row)| row.keys().map(move |last| Segment::new(*first, *last)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scored::SymbolArena;
    use crate::sign::Sign;
    use ccg_grammar::{Category, Semantics};
    use proptest::prelude::*;

    fn cell_with_word(word: &str) -> Cell {
        let mut arena = SymbolArena::new();
        let mut cell = Cell::new();
        cell.push(arena.alloc(Sign::lexical(word, Category::atom("N"), Semantics::pred(word), 0), 0.0));
        cell
    }

    fn both(size: usize) -> [Chart; 2] {
        [Chart::new(ChartBacking::Dense, size), Chart::new(ChartBacking::Sparse, size)]
    }

    #[test]
    fn test_set_then_get() {
        for mut chart in both(3) {
            assert_eq!(chart.get(0, 2).unwrap(), None);
            chart.set(0, 2, cell_with_word("x")).unwrap();
            assert_eq!(chart.get(0, 2).unwrap(), Some(&cell_with_word("x")));
            assert_eq!(chart.segments(), vec![Segment::new(0, 2)]);
        }
    }

    #[test]
    fn test_out_of_bounds() {
        for mut chart in both(2) {
            assert_eq!(
                chart.get(0, 2).unwrap_err(),
                ChartError::OutOfBounds { first: 0, last: 2, size: 2 }
            );
            assert!(chart.get(1, 0).is_err());
            assert!(chart.set(2, 2, Cell::new()).is_err());
        }
    }

    #[test]
    fn test_grow_keeps_cells() {
        for mut chart in both(2) {
            chart.set(0, 1, cell_with_word("a")).unwrap();
            chart.grow_by(2);
            assert_eq!(chart.size(), 4);
            assert!(chart.get(0, 1).unwrap().is_some());
            assert!(chart.get(0, 3).unwrap().is_none());
        }
    }

    #[test]
    fn test_truncate_drops_later_starts() {
        for mut chart in both(4) {
            chart.set(0, 3, cell_with_word("a")).unwrap();
            chart.set(1, 2, cell_with_word("b")).unwrap();
            chart.set(2, 2, cell_with_word("c")).unwrap();
            chart.set(3, 3, cell_with_word("d")).unwrap();
            chart.truncate_from(2);
            assert_eq!(chart.size(), 4);
            assert_eq!(chart.segments(), vec![Segment::new(0, 3), Segment::new(1, 2)]);
            assert!(chart.get(2, 2).unwrap().is_none());
        }
    }

    #[test]
    fn test_segments_are_ordered() {
        for mut chart in both(3) {
            chart.set(1, 2, Cell::new()).unwrap();
            chart.set(0, 0, Cell::new()).unwrap();
            chart.set(0, 2, Cell::new()).unwrap();
            assert_eq!(
                chart.segments(),
                vec![Segment::new(0, 0), Segment::new(0, 2), Segment::new(1, 2)]
            );
        }
    }

    proptest! {
        #[test]
        fn prop_backings_agree(
            size in 1usize..6,
            writes in prop::collection::vec((0usize..6, 0usize..6), 0..12),
            offset in 0usize..6,
        ) {
            let [mut dense, mut sparse] = both(size);
            for (i, (a, b)) in writes.iter().enumerate() {
                let (first, last) = ((*a).min(*b), (*a).max(*b));
                let word = format!("w{i}");
                prop_assert_eq!(
                    dense.set(first, last, cell_with_word(&word)).is_ok(),
                    sparse.set(first, last, cell_with_word(&word)).is_ok()
                );
            }
            prop_assert_eq!(dense.segments(), sparse.segments());
            for segment in dense.segments() {
                prop_assert_eq!(
                    dense.get(segment.first, segment.last).unwrap(),
                    sparse.get(segment.first, segment.last).unwrap()
                );
            }
            dense.truncate_from(offset);
            sparse.truncate_from(offset);
            prop_assert_eq!(dense.segments(), sparse.segments());
        }
    }
}
