//! Per-course quest chain and the per-user progress pointer.

use serde::Serialize;

use crate::models::{Quest, QuestChain, RecordId, UserQuestChain};

impl QuestChain {
    pub fn new(course_id: &str) -> QuestChain {
        QuestChain {
            quest_chain_id: RecordId::random(),
            course_id: course_id.into(),
            quests: Vec::new(),
        }
    }

    /// Appends a quest; existing user pointers are unaffected by appends.
    pub fn add_quest(&mut self, content_id: &str, description: &str) -> &Quest {
        self.quests.push(Quest {
            quest_id: RecordId::random(),
            content_id: content_id.into(),
            description: description.into(),
        });

        self.quests.last().unwrap()
    }

    /// Removes the quest for a content item, compacting the sequence, and
    /// returns the removed index so pointer adjustment can follow.
    pub fn remove_quest(&mut self, content_id: &str) -> Option<usize> {
        let index = self
            .quests
            .iter()
            .position(|quest| quest.content_id == content_id)?;
        self.quests.remove(index);
        Some(index)
    }

    pub fn rename_quest(&mut self, content_id: &str, description: &str) -> bool {
        match self
            .quests
            .iter_mut()
            .find(|quest| quest.content_id == content_id)
        {
            None => false,
            Some(quest) => {
                quest.description = description.into();
                true
            }
        }
    }

    pub fn quest_at(&self, user_level: usize) -> Option<&Quest> {
        self.quests.get(user_level)
    }
}

impl UserQuestChain {
    pub fn new(quest_chain_id: RecordId, user_id: &str) -> UserQuestChain {
        UserQuestChain {
            id: RecordId::random(),
            quest_chain_id,
            user_id: user_id.into(),
            user_level: 0,
        }
    }
}

/// Advances the user's pointer when the finished content is the quest at
/// the pointer and the score meets the passing percentage. Finishing any
/// other quest, even one further along the chain, changes nothing.
///
/// Returns the new pointer, or `None` when the call leaves it in place.
pub fn advance(
    chain: &QuestChain,
    user_chain: &UserQuestChain,
    content_id: &str,
    percentage: u32,
    passing_percentage: u32,
) -> Option<usize> {
    let current = chain.quest_at(user_chain.user_level)?;

    if current.content_id == content_id && percentage >= passing_percentage {
        Some(user_chain.user_level + 1)
    } else {
        None
    }
}

/// Pointer adjustment after a removal: pointers strictly above the removed
/// index move down one, pointers at or below it keep what the user has
/// already completed.
pub fn shifted_level(user_level: usize, removed_index: usize) -> usize {
    if user_level > removed_index {
        user_level - 1
    } else {
        user_level
    }
}

/// The quest at the user's pointer, or the finished sentinel once the
/// pointer has passed the last quest.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CurrentQuest {
    Open { user_level: usize, quest: Quest },
    Finished { user_level: usize },
}

pub fn current_quest(chain: &QuestChain, user_chain: &UserQuestChain) -> CurrentQuest {
    match chain.quest_at(user_chain.user_level) {
        Some(quest) => CurrentQuest::Open {
            user_level: user_chain.user_level,
            quest: quest.clone(),
        },
        None => CurrentQuest::Finished {
            user_level: user_chain.user_level,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_with(contents: &[&str]) -> QuestChain {
        let mut chain = QuestChain::new("course-1");
        for content_id in contents {
            chain.add_quest(content_id, "Finish it");
        }
        chain
    }

    #[test]
    fn advance_requires_the_current_quest() {
        let chain = chain_with(&["quiz-1", "quiz-2"]);
        let user = UserQuestChain::new(chain.quest_chain_id, "user-1");

        // Finishing a future quest out of order does not skip ahead.
        assert_eq!(advance(&chain, &user, "quiz-2", 100, 80), None);
        assert_eq!(advance(&chain, &user, "quiz-1", 100, 80), Some(1));
    }

    #[test]
    fn advance_requires_the_passing_percentage() {
        let chain = chain_with(&["quiz-1"]);
        let user = UserQuestChain::new(chain.quest_chain_id, "user-1");

        assert_eq!(advance(&chain, &user, "quiz-1", 79, 80), None);
        assert_eq!(advance(&chain, &user, "quiz-1", 80, 80), Some(1));
    }

    #[test]
    fn advance_is_a_no_op_past_the_last_quest() {
        let chain = chain_with(&["quiz-1"]);
        let mut user = UserQuestChain::new(chain.quest_chain_id, "user-1");
        user.user_level = 1;

        assert_eq!(advance(&chain, &user, "quiz-1", 100, 80), None);
    }

    #[test]
    fn remove_quest_compacts_and_reports_the_index() {
        let mut chain = chain_with(&["quiz-1", "quiz-2", "quiz-3"]);

        assert_eq!(chain.remove_quest("quiz-2"), Some(1));
        assert_eq!(chain.quests.len(), 2);
        assert_eq!(chain.quests[1].content_id, "quiz-3");
        assert_eq!(chain.remove_quest("quiz-2"), None);
    }

    #[test]
    fn shifted_level_only_moves_pointers_above_the_removed_index() {
        // A user who completed quest 0 of a two-quest chain drops back to 0
        // when quest 0 is removed.
        assert_eq!(shifted_level(1, 0), 0);
        assert_eq!(shifted_level(0, 0), 0);
        assert_eq!(shifted_level(2, 2), 2);
        assert_eq!(shifted_level(3, 1), 2);
    }

    #[test]
    fn rename_quest_touches_only_the_description() {
        let mut chain = chain_with(&["quiz-1"]);
        let quest_id = chain.quests[0].quest_id;

        assert!(chain.rename_quest("quiz-1", "New name"));
        assert_eq!(chain.quests[0].description, "New name");
        assert_eq!(chain.quests[0].quest_id, quest_id);
        assert!(!chain.rename_quest("quiz-9", "Nope"));
    }

    #[test]
    fn current_quest_yields_the_finished_sentinel_at_chain_length() {
        let chain = chain_with(&["quiz-1"]);
        let mut user = UserQuestChain::new(chain.quest_chain_id, "user-1");

        match current_quest(&chain, &user) {
            CurrentQuest::Open { user_level, quest } => {
                assert_eq!(user_level, 0);
                assert_eq!(quest.content_id, "quiz-1");
            }
            CurrentQuest::Finished { .. } => panic!("expected an open quest"),
        }

        user.user_level = 1;
        assert_eq!(
            current_quest(&chain, &user),
            CurrentQuest::Finished { user_level: 1 }
        );
    }
}
