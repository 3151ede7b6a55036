// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP to level curve and level milestones.

use crate::models::achievement::{names, xp};

/// XP needed to leave level 1.
pub const BASE_XP: u64 = 100;

/// Growth factor of each level's XP span.
const LEVEL_GROWTH: f64 = 1.5;

/// Level for a total XP amount.
///
/// Starts at level 1 with a threshold of [`BASE_XP`]. Each time `xp` reaches
/// the threshold the level goes up and the threshold grows by
/// `floor(BASE_XP * 1.5^(level - 1))` for the new level.
pub fn calculate_level(xp: u64) -> u32 {
    let mut level: u32 = 1;
    let mut xp_limit = BASE_XP;

    while xp >= xp_limit {
        level += 1;
        let span = (BASE_XP as f64 * LEVEL_GROWTH.powi(level as i32 - 1)).floor() as u64;
        match xp_limit.checked_add(span) {
            Some(next) => xp_limit = next,
            None => break,
        }
    }

    level
}

/// Total XP at which `level` is reached; saturates at `u64::MAX`.
pub fn xp_to_reach(level: u32) -> u64 {
    let mut threshold: u64 = 0;
    for current in 1..level {
        let span = if current == 1 {
            BASE_XP
        } else {
            (BASE_XP as f64 * LEVEL_GROWTH.powi(current as i32 - 1)).floor() as u64
        };
        threshold = threshold.saturating_add(span);
    }
    threshold
}

/// Levels that grant an achievement when reached: (level, name, xp).
pub const LEVEL_MILESTONES: &[(u32, &str, u64)] = &[
    (5, names::LEVEL_5, xp::LEVEL_5),
    (10, names::LEVEL_10, xp::LEVEL_10),
];

/// Milestones passed when moving from `old_level` to `new_level`.
///
/// Every milestone in `(old_level, new_level]` counts, so a jump over a
/// milestone level still grants it.
pub fn milestones_reached(old_level: u32, new_level: u32) -> Vec<(&'static str, u64)> {
    LEVEL_MILESTONES
        .iter()
        .filter(|(level, _, _)| old_level < *level && *level <= new_level)
        .map(|(_, name, xp)| (*name, *xp))
        .collect()
}
