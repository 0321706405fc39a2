//! Bartle-style player-type questionnaire: scoring, percentage
//! normalization and the dominant-archetype decision.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::models::{PlayerType, PlayerTypeResult};

pub const QUESTION_COUNT: usize = 10;

pub const QUESTIONS: [&str; QUESTION_COUNT] = [
    "Do you enjoy working through a course completely on your own?",
    "Is taking part in a course more important to you than finishing it with a high score?",
    "Do you like trying out content that is not required to pass?",
    "Is passing a course enough for you, regardless of your final score?",
    "Do you prefer studying alone over studying in a group?",
    "Do you lose interest in a course quickly?",
    "Do you usually skip optional chapters?",
    "Do you mute course chats and forums while studying?",
    "Do you stick strictly to the suggested learning path?",
    "Do you compare your scores with other students in order to beat them?",
];

/// Live questionnaire scratchpad. It only exists for the duration of a test
/// session and is carried between requests inside a signed token, never in
/// a store.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TestSession {
    pub user_id: String,
    pub answers: [Option<bool>; QUESTION_COUNT],
}

impl TestSession {
    pub fn new(user_id: &str) -> TestSession {
        TestSession {
            user_id: user_id.into(),
            answers: Default::default(),
        }
    }

    pub fn submit_answer(&mut self, question_id: usize, answer: bool) -> Result<()> {
        if question_id >= QUESTION_COUNT {
            return Err(anyhow!(
                "question id {} is out of bounds, the test has {} questions",
                question_id,
                QUESTION_COUNT,
            ));
        }

        self.answers[question_id] = Some(answer);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.answers.iter().all(|answer| answer.is_some())
    }

    /// Classifies the session into a `PlayerTypeResult`. An incomplete
    /// session yields the not-taken result.
    pub fn evaluate(&self) -> PlayerTypeResult {
        if !self.is_complete() {
            return PlayerTypeResult::not_taken(&self.user_id);
        }

        let mut q = [false; QUESTION_COUNT];
        for (slot, answer) in q.iter_mut().zip(self.answers.iter()) {
            *slot = answer.unwrap_or(false);
        }

        let raw = raw_scores(&q);

        match normalize(raw) {
            None => PlayerTypeResult::not_taken(&self.user_id),
            Some([achiever, explorer, socializer, killer]) => PlayerTypeResult {
                user_id: self.user_id.clone(),
                achiever_pct: achiever,
                explorer_pct: explorer,
                socializer_pct: socializer,
                killer_pct: killer,
                dominant_type: Some(dominant_type(achiever, explorer, socializer, killer)),
                has_taken_test: true,
            },
        }
    }
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Raw archetype scores in achiever, explorer, socializer, killer order.
///
/// The socializer formula scales only its first term by 100; the asymmetry
/// is kept on purpose.
fn raw_scores(q: &[bool; QUESTION_COUNT]) -> [f64; 4] {
    let achiever = 100.0
        * (indicator(q[0])
            + indicator(!q[1])
            + indicator(!q[2])
            + indicator(!q[3])
            + indicator(!q[5])
            + indicator(!q[6]))
        / 6.0;

    let explorer = 100.0
        * (indicator(q[0])
            + indicator(q[2])
            + indicator(!q[5])
            + indicator(!q[6])
            + indicator(!q[8]))
        / 5.0;

    let socializer = (100.0 * indicator(!q[0])
        + indicator(!q[4])
        + indicator(!q[5])
        + indicator(!q[7])
        + indicator(!q[8])
        + indicator(!q[9]))
        / 6.0;

    let killer = 100.0
        * (indicator(!q[0])
            + indicator(!q[1])
            + indicator(!q[2])
            + indicator(!q[3])
            + indicator(!q[6])
            + indicator(q[9]))
        / 6.0;

    [achiever, explorer, socializer, killer]
}

/// Normalizes four non-negative raw scores into integer percentages that are
/// each in `[0, 100]` and sum to exactly 200. Returns `None` when all four
/// raw scores are zero.
fn normalize(raw: [f64; 4]) -> Option<[u32; 4]> {
    let sum: f64 = raw.iter().sum();
    if sum == 0.0 {
        return None;
    }

    let coefficient = 200.0 / sum;
    let mut values = raw;
    for value in values.iter_mut() {
        *value *= coefficient;
    }

    // Cap each value at 100, redistributing the excess onto the other
    // three. The passes run in fixed order and each pass sees the results
    // of the previous ones, so the sum stays at 200 throughout.
    for i in 0..values.len() {
        if values[i] > 100.0 {
            let excess = values[i] - 100.0;
            let distribution = 1.0 + excess / (200.0 - values[i]);
            for j in 0..values.len() {
                if j != i {
                    values[j] *= distribution;
                }
            }
            values[i] = 100.0;
        }
    }

    let mut rounded = [0i64; 4];
    for (slot, value) in rounded.iter_mut().zip(values.iter()) {
        *slot = value.round() as i64;
    }

    // Rounding can leave the sum one or two off 200. Push the difference
    // onto the smallest value when positive, the largest when negative;
    // ties go to the earliest slot.
    let difference = 200 - rounded.iter().sum::<i64>();
    if difference != 0 {
        let mut pick = 0;
        for i in 1..rounded.len() {
            if difference > 0 {
                if rounded[i] < rounded[pick] {
                    pick = i;
                }
            } else if rounded[i] > rounded[pick] {
                pick = i;
            }
        }
        rounded[pick] += difference;
    }

    Some([
        rounded[0] as u32,
        rounded[1] as u32,
        rounded[2] as u32,
        rounded[3] as u32,
    ])
}

/// Archetype decision cascade. Killer wins any tie it is part of; among the
/// rest, achiever beats explorer and socializer ties, and explorer beats
/// socializer ties.
fn dominant_type(achiever: u32, explorer: u32, socializer: u32, killer: u32) -> PlayerType {
    if killer >= achiever && killer >= explorer && killer >= socializer {
        PlayerType::Killer
    } else if achiever >= explorer && achiever >= socializer {
        PlayerType::Achiever
    } else if explorer >= socializer {
        PlayerType::Explorer
    } else {
        PlayerType::Socializer
    }
}
