//! Abstract store contracts consumed by the controller, and the in-memory
//! implementation backing the binary and the tests. Records are loaded by
//! value, transformed by the engines and saved back; nothing outside the
//! controller mutates them in place.

use std::collections::BTreeMap;

use crate::models::{
    Badge, Course, Membership, PlayerTypeResult, QuestChain, RecordId, UserBadge, UserQuestChain,
};

pub trait CourseStore {
    fn load_course(&self, course_id: &str) -> Option<Course>;
    fn save_course(&mut self, course: Course);
    fn delete_course(&mut self, course_id: &str);
}

pub trait QuestChainStore {
    fn load_chain_by_course(&self, course_id: &str) -> Option<QuestChain>;
    fn save_chain(&mut self, chain: QuestChain);
    fn delete_chain(&mut self, course_id: &str);
}

pub trait UserQuestChainStore {
    fn load_user_chain(&self, chain_id: RecordId, user_id: &str) -> Option<UserQuestChain>;
    fn list_user_chains(&self, chain_id: RecordId) -> Vec<UserQuestChain>;
    fn save_user_chain(&mut self, user_chain: UserQuestChain);
    fn delete_user_chain(&mut self, chain_id: RecordId, user_id: &str);
}

pub trait BadgeStore {
    fn badges_by_content(&self, content_id: &str) -> Vec<Badge>;
    fn badges_by_course(&self, course_id: &str) -> Vec<Badge>;
    fn save_badge(&mut self, badge: Badge);
    fn delete_badge(&mut self, badge_id: RecordId);
}

pub trait UserBadgeStore {
    fn user_badge(&self, user_id: &str, badge_id: RecordId) -> Option<UserBadge>;
    fn user_badges_for_badge(&self, badge_id: RecordId) -> Vec<UserBadge>;
    fn save_user_badge(&mut self, user_badge: UserBadge);
    fn delete_user_badges_for_badge(&mut self, badge_id: RecordId);
}

/// Read-only view of course membership, used for award fan-out.
pub trait CourseMembershipProvider {
    fn members_of(&self, course_id: &str) -> Vec<String>;
}

pub trait MembershipStore: CourseMembershipProvider {
    fn membership(&self, course_id: &str, user_id: &str) -> Option<Membership>;
    fn save_membership(&mut self, membership: Membership);
    fn delete_membership(&mut self, course_id: &str, user_id: &str);
}

pub trait PlayerTypeStore {
    fn player_type_of(&self, user_id: &str) -> Option<PlayerTypeResult>;
    fn save_player_type(&mut self, result: PlayerTypeResult);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: BTreeMap<String, Course>,
    quest_chains: BTreeMap<String, QuestChain>,
    user_quest_chains: BTreeMap<(RecordId, String), UserQuestChain>,
    badges: BTreeMap<RecordId, Badge>,
    user_badges: BTreeMap<RecordId, UserBadge>,
    memberships: BTreeMap<(String, String), Membership>,
    player_types: BTreeMap<String, PlayerTypeResult>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        Default::default()
    }
}

impl CourseStore for MemoryStore {
    fn load_course(&self, course_id: &str) -> Option<Course> {
        self.courses.get(course_id).cloned()
    }

    fn save_course(&mut self, course: Course) {
        self.courses.insert(course.course_id.clone(), course);
    }

    fn delete_course(&mut self, course_id: &str) {
        self.courses.remove(course_id);
    }
}

impl QuestChainStore for MemoryStore {
    fn load_chain_by_course(&self, course_id: &str) -> Option<QuestChain> {
        self.quest_chains.get(course_id).cloned()
    }

    fn save_chain(&mut self, chain: QuestChain) {
        self.quest_chains.insert(chain.course_id.clone(), chain);
    }

    fn delete_chain(&mut self, course_id: &str) {
        self.quest_chains.remove(course_id);
    }
}

impl UserQuestChainStore for MemoryStore {
    fn load_user_chain(&self, chain_id: RecordId, user_id: &str) -> Option<UserQuestChain> {
        self.user_quest_chains
            .get(&(chain_id, user_id.into()))
            .cloned()
    }

    fn list_user_chains(&self, chain_id: RecordId) -> Vec<UserQuestChain> {
        self.user_quest_chains
            .values()
            .filter(|user_chain| user_chain.quest_chain_id == chain_id)
            .cloned()
            .collect()
    }

    fn save_user_chain(&mut self, user_chain: UserQuestChain) {
        self.user_quest_chains.insert(
            (user_chain.quest_chain_id, user_chain.user_id.clone()),
            user_chain,
        );
    }

    fn delete_user_chain(&mut self, chain_id: RecordId, user_id: &str) {
        self.user_quest_chains.remove(&(chain_id, user_id.into()));
    }
}

impl BadgeStore for MemoryStore {
    fn badges_by_content(&self, content_id: &str) -> Vec<Badge> {
        self.badges
            .values()
            .filter(|badge| badge.content_id == content_id)
            .cloned()
            .collect()
    }

    fn badges_by_course(&self, course_id: &str) -> Vec<Badge> {
        self.badges
            .values()
            .filter(|badge| badge.course_id == course_id)
            .cloned()
            .collect()
    }

    fn save_badge(&mut self, badge: Badge) {
        self.badges.insert(badge.badge_id, badge);
    }

    fn delete_badge(&mut self, badge_id: RecordId) {
        self.badges.remove(&badge_id);
    }
}

impl UserBadgeStore for MemoryStore {
    fn user_badge(&self, user_id: &str, badge_id: RecordId) -> Option<UserBadge> {
        self.user_badges
            .values()
            .find(|award| award.user_id == user_id && award.badge_id == badge_id)
            .cloned()
    }

    fn user_badges_for_badge(&self, badge_id: RecordId) -> Vec<UserBadge> {
        self.user_badges
            .values()
            .filter(|award| award.badge_id == badge_id)
            .cloned()
            .collect()
    }

    fn save_user_badge(&mut self, user_badge: UserBadge) {
        self.user_badges
            .insert(user_badge.user_badge_id, user_badge);
    }

    fn delete_user_badges_for_badge(&mut self, badge_id: RecordId) {
        self.user_badges
            .retain(|_id, award| award.badge_id != badge_id);
    }
}

impl CourseMembershipProvider for MemoryStore {
    fn members_of(&self, course_id: &str) -> Vec<String> {
        self.memberships
            .values()
            .filter(|membership| membership.course_id == course_id)
            .map(|membership| membership.user_id.clone())
            .collect()
    }
}

impl MembershipStore for MemoryStore {
    fn membership(&self, course_id: &str, user_id: &str) -> Option<Membership> {
        self.memberships
            .get(&(course_id.into(), user_id.into()))
            .cloned()
    }

    fn save_membership(&mut self, membership: Membership) {
        self.memberships.insert(
            (membership.course_id.clone(), membership.user_id.clone()),
            membership,
        );
    }

    fn delete_membership(&mut self, course_id: &str, user_id: &str) {
        self.memberships.remove(&(course_id.into(), user_id.into()));
    }
}

impl PlayerTypeStore for MemoryStore {
    fn player_type_of(&self, user_id: &str) -> Option<PlayerTypeResult> {
        self.player_types.get(user_id).cloned()
    }

    fn save_player_type(&mut self, result: PlayerTypeResult) {
        self.player_types.insert(result.user_id.clone(), result);
    }
}
