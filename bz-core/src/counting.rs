//! Minimal reference adapter used by tests and benches: a take-away counting
//! game. A pile of tokens, each move removes 1..=3, taking the last token
//! wins. Distinct move orders reach identical piles, so the game transposes
//! naturally, and the pile size mod 4 is a perfect oracle, which stands in
//! for a tablebase.

use crate::adapter::{GameAdapter, Outcome};

pub const MAX_TOTAL: u8 = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingGame {
    total: u8,
    to_move: u8,
    tablebase: bool,
}

impl CountingGame {
    pub fn new(total: u8) -> Self {
        Self {
            total: total.min(MAX_TOTAL),
            to_move: 0,
            tablebase: false,
        }
    }

    /// Same game with the mod-4 oracle enabled as a tablebase.
    pub fn with_tablebase(total: u8) -> Self {
        Self {
            tablebase: true,
            ..Self::new(total)
        }
    }

    pub fn total(&self) -> u8 {
        self.total
    }
}

impl GameAdapter for CountingGame {
    type Move = u8;

    const ACTION_SPACE: usize = 3;
    const PLANE_LEN: usize = 4;

    fn legal_moves(&self) -> Vec<u8> {
        (1..=self.total.min(3)).collect()
    }

    fn apply(&mut self, mv: u8) {
        debug_assert!(mv >= 1 && mv <= self.total.min(3));
        self.total -= mv;
        self.to_move ^= 1;
    }

    fn hash_key(&self) -> u64 {
        ((self.total as u64) << 1) | self.to_move as u64
    }

    fn terminal(&self) -> Option<Outcome> {
        // The previous player took the last token and won.
        if self.total == 0 {
            Some(Outcome::Loss)
        } else {
            None
        }
    }

    fn probe_tablebase(&self) -> Option<Outcome> {
        if !self.tablebase {
            return None;
        }
        if self.total % 4 == 0 {
            Some(Outcome::Loss)
        } else {
            Some(Outcome::Win)
        }
    }

    fn encode(&self, planes: &mut [f32]) -> bool {
        planes[0] = self.total as f32 / MAX_TOTAL as f32;
        for take in 1..=3u8 {
            planes[take as usize] = if take <= self.total { 1.0 } else { 0.0 };
        }
        false
    }

    fn policy_index(&self, mv: u8) -> usize {
        mv as usize - 1
    }

    fn is_enhanced(&self, mv: u8) -> bool {
        // The immediately winning take is the forcing move of this game.
        mv == self.total
    }
}
