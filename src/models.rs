use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{
    de::{self, Deserializer},
    Deserialize, Serialize, Serializer,
};
use std::{collections::BTreeMap, fmt};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub experience: ExperienceConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_badge_tiers")]
    pub badge_tiers: [u32; 3],

    #[serde(default = "default_quest_passing")]
    pub quest_passing_percentage: u32,
}

impl Default for Thresholds {
    fn default() -> Thresholds {
        Thresholds {
            badge_tiers: default_badge_tiers(),
            quest_passing_percentage: default_quest_passing(),
        }
    }
}

fn default_badge_tiers() -> [u32; 3] {
    [50, 70, 90]
}

fn default_quest_passing() -> u32 {
    80
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExperienceConfig {
    #[serde(default = "default_base_required")]
    pub base_required: u64,

    #[serde(default = "default_per_content")]
    pub per_content: u64,

    #[serde(default = "default_reward_base")]
    pub reward_base: u64,
}

impl Default for ExperienceConfig {
    fn default() -> ExperienceConfig {
        ExperienceConfig {
            base_required: default_base_required(),
            per_content: default_per_content(),
            reward_base: default_reward_base(),
        }
    }
}

fn default_base_required() -> u64 {
    500
}

fn default_per_content() -> u64 {
    50
}

fn default_reward_base() -> u64 {
    50
}

/// Server-generated identifier, rendered as hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct RecordId(pub [u8; 16]);

impl RecordId {
    pub fn random() -> RecordId {
        let mut id = [0u8; 16];
        rand::rngs::OsRng.fill(&mut id);
        RecordId(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<RecordId, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let mut id = [0u8; 16];
        hex::decode_to_slice(&encoded, &mut id).map_err(de::Error::custom)?;
        Ok(RecordId(id))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Quiz,
    FlashcardSet,
}

impl ContentKind {
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Quiz => "quiz",
            ContentKind::FlashcardSet => "flashcardSet",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum PlayerType {
    Achiever,
    Explorer,
    Socializer,
    Killer,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerTypeResult {
    pub user_id: String,
    pub achiever_pct: u32,
    pub explorer_pct: u32,
    pub socializer_pct: u32,
    pub killer_pct: u32,
    pub dominant_type: Option<PlayerType>,
    pub has_taken_test: bool,
}

impl PlayerTypeResult {
    /// The answer to "this user has not completed the test".
    pub fn not_taken(user_id: &str) -> PlayerTypeResult {
        PlayerTypeResult {
            user_id: user_id.into(),
            achiever_pct: 0,
            explorer_pct: 0,
            socializer_pct: 0,
            killer_pct: 0,
            dominant_type: None,
            has_taken_test: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Badge {
    pub badge_id: RecordId,
    pub content_id: String,
    pub kind: ContentKind,
    pub course_id: String,
    pub passing_percentage: u32,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserBadge {
    pub user_badge_id: RecordId,
    pub user_id: String,
    pub badge_id: RecordId,
    pub achieved: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quest {
    pub quest_id: RecordId,
    pub content_id: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestChain {
    pub quest_chain_id: RecordId,
    pub course_id: String,
    pub quests: Vec<Quest>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserQuestChain {
    pub id: RecordId,
    pub quest_chain_id: RecordId,
    pub user_id: String,
    pub user_level: usize,
}

#[derive(Clone, Debug)]
pub struct Course {
    pub course_id: String,
    pub required_exp_per_level: Vec<u64>,
    pub contents: BTreeMap<String, ContentInfo>,
}

#[derive(Clone, Debug)]
pub struct ContentInfo {
    pub kind: ContentKind,
    pub name: String,
    pub level: usize,
}

#[derive(Clone, Debug)]
pub struct Membership {
    pub course_id: String,
    pub user_id: String,
    pub experience: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultRecord {
    pub user_id: String,
    pub achiever_pct: u32,
    pub explorer_pct: u32,
    pub socializer_pct: u32,
    pub killer_pct: u32,
    pub dominant_type: String,
    pub time: DateTime<Utc>,
}

/// Integer score percentage, or `None` when the score is not acceptable.
///
/// Negative counts, counts above the total and a zero total are all rejected
/// here, so every score-carrying call shares one validation path.
pub fn score_percentage(correct_answers: i64, total_answers: i64) -> Option<u32> {
    if total_answers <= 0 || correct_answers < 0 || correct_answers > total_answers {
        None
    } else {
        Some((correct_answers as u64 * 100 / total_answers as u64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_percentage_floors() {
        assert_eq!(score_percentage(8, 10), Some(80));
        assert_eq!(score_percentage(2, 3), Some(66));
        assert_eq!(score_percentage(0, 10), Some(0));
        assert_eq!(score_percentage(10, 10), Some(100));
    }

    #[test]
    fn score_percentage_rejects_invalid() {
        assert_eq!(score_percentage(-1, 10), None);
        assert_eq!(score_percentage(11, 10), None);
        assert_eq!(score_percentage(5, 0), None);
        assert_eq!(score_percentage(5, -2), None);
    }

    #[test]
    fn record_id_round_trips_through_hex() {
        let id = RecordId::random();
        let json = serde_json::to_string(&id).unwrap();
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
