//! Per-course experience requirement table and level lookup.

use crate::models::ExperienceConfig;

/// Requirement of a level that has no content yet. The topmost level of a
/// course keeps this sentinel until a quiz or flashcard set is added to it.
pub const NO_CEILING: u64 = u64::MAX;

pub fn new_table() -> Vec<u64> {
    vec![NO_CEILING]
}

/// A new chapter appends a new highest level with no ceiling.
pub fn add_level(table: &mut Vec<u64>) -> usize {
    table.push(NO_CEILING);
    table.len() - 1
}

/// A content item added to a level raises that level's requirement. The
/// first item replaces the sentinel with the base requirement.
pub fn add_content(table: &mut [u64], level: usize, experience: &ExperienceConfig) {
    if let Some(required) = table.get_mut(level) {
        if *required == NO_CEILING {
            *required = experience.base_required + experience.per_content;
        } else {
            *required += experience.per_content;
        }
    }
}

/// The highest level whose cumulative requirement fits into `total_exp`;
/// walks the table in level order, subtracting each requirement.
pub fn level_for_exp(table: &[u64], total_exp: u64) -> usize {
    let mut remaining = total_exp;
    let mut level = 0;

    for &required in table {
        if remaining < required {
            break;
        }
        remaining -= required;
        level += 1;
    }

    level
}

/// Experience already credited toward the user's current level.
pub fn remaining_exp_in_level(table: &[u64], total_exp: u64) -> u64 {
    let mut remaining = total_exp;

    for &required in table {
        if remaining < required {
            break;
        }
        remaining -= required;
    }

    remaining
}

/// Experience reward for finishing a content item of a given chapter level
/// with a given score percentage.
pub fn reward_for_finished_content(
    experience: &ExperienceConfig,
    level: usize,
    percentage: u32,
) -> u64 {
    experience.reward_base * (level as u64 + 1) * percentage as u64 / 100
}
