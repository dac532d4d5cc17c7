use crate::block::Block;
use crate::constraint::Constraint;
use crate::variable::Variable;
use std::ops::{Index, IndexMut};

/// The live partition of variables into blocks.
///
/// Blocks live in a slot arena so a variable's `block` handle stays valid while other blocks
/// come and go; `live` lists the occupied slots and supports swap-with-last removal.
#[derive(Debug, Clone, Default)]
pub(crate) struct Blocks {
    slots: Vec<Option<Block>>,
    free: Vec<usize>,
    live: Vec<usize>,
}

impl Index<usize> for Blocks {
    type Output = Block;

    fn index(&self, id: usize) -> &Block {
        self.slots[id].as_ref().expect("block handle is live")
    }
}

impl IndexMut<usize> for Blocks {
    fn index_mut(&mut self, id: usize) -> &mut Block {
        self.slots[id].as_mut().expect("block handle is live")
    }
}

impl Blocks {
    /// One singleton block per variable; variable `i` lands in live position `i`.
    pub(crate) fn new(vars: &mut [Variable]) -> Self {
        let mut blocks = Self::default();
        for v in 0..vars.len() {
            let b = Block::new(v, vars);
            blocks.insert(b, vars);
        }
        blocks
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> &[usize] {
        &self.live
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        self.live.iter().map(move |&id| &self[id])
    }

    pub(crate) fn insert(&mut self, mut b: Block, vars: &mut [Variable]) -> usize {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        for &v in &b.vars {
            vars[v].block = id;
        }
        b.live_index = self.live.len();
        self.live.push(id);
        self.slots[id] = Some(b);
        id
    }

    pub(crate) fn remove(&mut self, id: usize) -> Block {
        let b = self.slots[id].take().expect("removing a live block");
        let idx = b.live_index;
        self.live.swap_remove(idx);
        if let Some(&moved) = self.live.get(idx) {
            self[moved].live_index = idx;
        }
        self.free.push(id);
        b
    }

    pub(crate) fn cost(&self, vars: &[Variable]) -> f64 {
        self.iter().map(|b| b.cost(vars)).sum()
    }

    pub(crate) fn position(&self, v: &Variable) -> f64 {
        self[v.block].position_of(v)
    }

    /// Joins the blocks on either side of the violated constraint `ci`, moving the smaller into
    /// the larger so that `ci` becomes tight, and activates it.
    pub(crate) fn merge(&mut self, ci: usize, vars: &mut [Variable], cons: &mut [Constraint]) {
        let c = &cons[ci];
        let l = vars[c.left].block;
        let r = vars[c.right].block;
        let dist = vars[c.right].offset - vars[c.left].offset - c.gap;
        let (target, absorbed, distance) = if self[l].vars.len() < self[r].vars.len() {
            (r, l, dist)
        } else {
            (l, r, -dist)
        };
        let other = self.remove(absorbed);
        for &v in &other.vars {
            vars[v].block = target;
        }
        self[target].merge_across(other, ci, distance, vars, cons);
    }

    pub(crate) fn update_block_positions(&mut self, vars: &[Variable]) {
        for i in 0..self.live.len() {
            let id = self.live[i];
            self[id].update_weighted_position(vars);
        }
    }

    /// Splits every block whose most negative Lagrangian multiplier is below `tolerance`; the
    /// released constraints are appended to `inactive`. Returns how many blocks were split.
    pub(crate) fn split(
        &mut self,
        inactive: &mut Vec<usize>,
        tolerance: f64,
        vars: &mut [Variable],
        cons: &mut [Constraint],
    ) -> usize {
        self.update_block_positions(vars);
        let mut splits = 0;
        for id in self.live.clone() {
            let Some(ci) = self[id].find_min_lm(vars, cons) else {
                continue;
            };
            if cons[ci].lm >= tolerance {
                continue;
            }
            let (lb, rb) = Block::split(ci, vars, cons);
            self.insert(lb, vars);
            self.insert(rb, vars);
            self.remove(id);
            inactive.push(ci);
            splits += 1;
        }
        splits
    }
}
