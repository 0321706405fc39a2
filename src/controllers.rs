use anyhow::{anyhow, Result};
use chrono::Utc;
use csv;
use ring::hmac;
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::badges;
use crate::levels;
use crate::models::{
    Badge, Config, ContentInfo, ContentKind, Course, Membership, PlayerTypeResult, QuestChain,
    RecordId, ResultRecord, UserQuestChain,
};
use crate::player_type::TestSession;
use crate::quests::{self, CurrentQuest};
use crate::stores::{
    BadgeStore, CourseMembershipProvider, CourseStore, MembershipStore, MemoryStore,
    PlayerTypeStore, QuestChainStore, UserBadgeStore, UserQuestChainStore,
};

/// Everything the controller needs from a backing store.
pub trait GamificationStore:
    CourseStore
    + QuestChainStore
    + UserQuestChainStore
    + BadgeStore
    + UserBadgeStore
    + MembershipStore
    + PlayerTypeStore
{
}

impl<S> GamificationStore for S where
    S: CourseStore
        + QuestChainStore
        + UserQuestChainStore
        + BadgeStore
        + UserBadgeStore
        + MembershipStore
        + PlayerTypeStore
{
}

/// Outcome of one finish call. A rejected call (invalid score, unknown
/// course or content) leaves every store record untouched and reports
/// `accepted: false`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FinishOutcome {
    pub accepted: bool,
    pub percentage: u32,
    pub achieved_badges: Vec<RecordId>,
    pub quest_advanced: bool,
    pub user_level: usize,
    pub experience: u64,
    pub level: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExperienceSummary {
    pub experience: u64,
    pub level: usize,
    pub remaining_exp_in_level: u64,
}

#[derive(Debug)]
pub struct GamificationController<S = MemoryStore> {
    secret_key: Arc<hmac::Key>,
    config: Arc<Config>,
    store: Arc<Mutex<S>>,
    result_writer: Option<ResultWriter>,
}

impl<S> Clone for GamificationController<S> {
    fn clone(&self) -> GamificationController<S> {
        GamificationController {
            secret_key: self.secret_key.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            result_writer: self.result_writer.clone(),
        }
    }
}

impl<S> GamificationController<S> {
    pub fn new(
        secret_key: hmac::Key,
        config: Config,
        store: S,
        result_writer: Option<ResultWriter>,
    ) -> GamificationController<S> {
        GamificationController {
            secret_key: Arc::new(secret_key),
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            result_writer,
        }
    }

    // One lock acquisition per operation: each call's fan-out is visible
    // all-or-nothing, nothing beyond that is serialized.
    fn store(&self) -> MutexGuard<S> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn decode_session(&self, token: &str) -> Result<TestSession> {
        let mut parts = token.splitn(2, ':');
        let session = parts.next().ok_or_else(|| anyhow!("bad session token"))?;
        let session = base64::decode_config(session, base64::URL_SAFE_NO_PAD)?;

        let signature = parts.next().ok_or_else(|| anyhow!("bad session token"))?;
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)?;

        hmac::verify(&self.secret_key, &session, &signature)
            .map_err(|_err| anyhow!("invalid signature"))?;

        let session = bincode::deserialize(&session)?;
        Ok(session)
    }

    pub fn encode_session(&self, session: &TestSession) -> Result<String> {
        let session = bincode::serialize(&session)?;

        let signature = hmac::sign(&self.secret_key, &session);

        let token = format!(
            "{}:{}",
            base64::encode_config(session, base64::URL_SAFE_NO_PAD),
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD),
        );

        Ok(token)
    }
}

impl<S: GamificationStore> GamificationController<S> {
    pub fn take_test(&self, user_id: &str) -> TestSession {
        TestSession::new(user_id)
    }

    /// Evaluates a finished session, stores the classification and exports
    /// it when a writer is configured. An incomplete session classifies as
    /// not taken and is not stored.
    pub async fn evaluate_test(&self, session: &TestSession) -> PlayerTypeResult {
        let result = session.evaluate();

        if result.has_taken_test {
            self.store().save_player_type(result.clone());

            if let Some(result_writer) = &self.result_writer {
                let record = ResultRecord {
                    user_id: result.user_id.clone(),
                    achiever_pct: result.achiever_pct,
                    explorer_pct: result.explorer_pct,
                    socializer_pct: result.socializer_pct,
                    killer_pct: result.killer_pct,
                    dominant_type: result
                        .dominant_type
                        .map(|dominant| format!("{:?}", dominant))
                        .unwrap_or_default(),
                    time: Utc::now(),
                };

                let result_writer = result_writer.clone();
                let blocking_task = tokio::task::spawn_blocking(move || {
                    result_writer.write(record).unwrap();
                });
                blocking_task.await.unwrap();
            }
        }

        result
    }

    pub fn classifier_result_for(&self, user_id: &str) -> PlayerTypeResult {
        self.store()
            .player_type_of(user_id)
            .unwrap_or_else(|| PlayerTypeResult::not_taken(user_id))
    }

    /// Registers a course with an empty quest chain and a fresh level
    /// curve. Returns false when the course already exists.
    pub fn add_course(&self, course_id: &str) -> bool {
        let mut store = self.store();

        if store.load_course(course_id).is_some() {
            return false;
        }

        store.save_course(Course {
            course_id: course_id.into(),
            required_exp_per_level: levels::new_table(),
            contents: Default::default(),
        });
        store.save_chain(QuestChain::new(course_id));

        true
    }

    /// Adds a member: membership record, quest pointer at zero and one
    /// unachieved award per badge the course already has.
    pub fn add_member(&self, course_id: &str, user_id: &str) -> Option<UserQuestChain> {
        let mut store = self.store();
        let chain = store.load_chain_by_course(course_id)?;

        if store.membership(course_id, user_id).is_none() {
            store.save_membership(Membership {
                course_id: course_id.into(),
                user_id: user_id.into(),
                experience: 0,
            });
        }

        for badge in store.badges_by_course(course_id) {
            if store.user_badge(user_id, badge.badge_id).is_none() {
                let awards = badges::placeholder_awards(
                    std::slice::from_ref(&badge),
                    Some(user_id).into_iter(),
                );
                for award in awards {
                    store.save_user_badge(award);
                }
            }
        }

        let user_chain = match store.load_user_chain(chain.quest_chain_id, user_id) {
            Some(user_chain) => user_chain,
            None => {
                let user_chain = UserQuestChain::new(chain.quest_chain_id, user_id);
                store.save_user_chain(user_chain.clone());
                user_chain
            }
        };

        Some(user_chain)
    }

    /// Deletes a course and everything hanging off it: quest chain and
    /// pointers, badges and awards, memberships.
    pub fn remove_course(&self, course_id: &str) -> bool {
        let mut store = self.store();
        if store.load_course(course_id).is_none() {
            return false;
        }

        for badge in store.badges_by_course(course_id) {
            store.delete_user_badges_for_badge(badge.badge_id);
            store.delete_badge(badge.badge_id);
        }

        if let Some(chain) = store.load_chain_by_course(course_id) {
            for user_chain in store.list_user_chains(chain.quest_chain_id) {
                store.delete_user_chain(chain.quest_chain_id, &user_chain.user_id);
            }
            store.delete_chain(course_id);
        }

        for member in store.members_of(course_id) {
            store.delete_membership(course_id, &member);
        }
        store.delete_course(course_id);

        true
    }

    pub fn remove_member(&self, course_id: &str, user_id: &str) {
        let mut store = self.store();

        store.delete_membership(course_id, user_id);
        if let Some(chain) = store.load_chain_by_course(course_id) {
            store.delete_user_chain(chain.quest_chain_id, user_id);
        }
    }

    /// Appends a new highest level to the course's curve and returns its
    /// index.
    pub fn add_chapter(&self, course_id: &str) -> Option<usize> {
        let mut store = self.store();
        let mut course = store.load_course(course_id)?;

        let level = levels::add_level(&mut course.required_exp_per_level);
        store.save_course(course);

        Some(level)
    }

    pub fn create_quiz_rewards(
        &self,
        course_id: &str,
        content_id: &str,
        name: &str,
        level: usize,
    ) -> Option<Vec<Badge>> {
        self.create_rewards(course_id, ContentKind::Quiz, content_id, name, level)
    }

    pub fn create_flashcard_set_rewards(
        &self,
        course_id: &str,
        content_id: &str,
        name: &str,
        level: usize,
    ) -> Option<Vec<Badge>> {
        self.create_rewards(course_id, ContentKind::FlashcardSet, content_id, name, level)
    }

    /// One authoring call: registers the content item, raises its level's
    /// experience requirement, appends a quest and creates the three tiered
    /// badges with placeholder awards for every current member.
    fn create_rewards(
        &self,
        course_id: &str,
        kind: ContentKind,
        content_id: &str,
        name: &str,
        level: usize,
    ) -> Option<Vec<Badge>> {
        let mut store = self.store();
        let mut course = store.load_course(course_id)?;
        let mut chain = store.load_chain_by_course(course_id)?;

        course.contents.insert(
            content_id.into(),
            ContentInfo {
                kind,
                name: name.into(),
                level,
            },
        );
        levels::add_content(
            &mut course.required_exp_per_level,
            level,
            &self.config.experience,
        );

        chain.add_quest(content_id, &quest_description(kind, name, &self.config));

        let created = badges::tiered_badges(
            content_id,
            kind,
            name,
            course_id,
            &self.config.thresholds.badge_tiers,
        );
        let members = store.members_of(course_id);
        let awards =
            badges::placeholder_awards(&created, members.iter().map(|member| member.as_str()));

        for badge in created.iter().cloned() {
            store.save_badge(badge);
        }
        for award in awards {
            store.save_user_badge(award);
        }
        store.save_chain(chain);
        store.save_course(course);

        Some(created)
    }

    pub fn finish_quiz(
        &self,
        user_id: &str,
        course_id: &str,
        content_id: &str,
        correct_answers: i64,
        total_answers: i64,
    ) -> FinishOutcome {
        self.finish_content(
            user_id,
            course_id,
            ContentKind::Quiz,
            content_id,
            correct_answers,
            total_answers,
        )
    }

    pub fn finish_flashcard_set(
        &self,
        user_id: &str,
        course_id: &str,
        content_id: &str,
        correct_answers: i64,
        total_answers: i64,
    ) -> FinishOutcome {
        self.finish_content(
            user_id,
            course_id,
            ContentKind::FlashcardSet,
            content_id,
            correct_answers,
            total_answers,
        )
    }

    /// One submission: flips the badges the score strictly exceeds,
    /// advances the quest pointer when the score meets the passing
    /// percentage on the current quest, and credits experience.
    fn finish_content(
        &self,
        user_id: &str,
        course_id: &str,
        kind: ContentKind,
        content_id: &str,
        correct_answers: i64,
        total_answers: i64,
    ) -> FinishOutcome {
        let percentage = match crate::models::score_percentage(correct_answers, total_answers) {
            None => return FinishOutcome::default(),
            Some(percentage) => percentage,
        };

        let mut store = self.store();
        let course = match store.load_course(course_id) {
            None => return FinishOutcome::default(),
            Some(course) => course,
        };
        let content = match course.contents.get(content_id) {
            Some(content) if content.kind == kind => content,
            _ => return FinishOutcome::default(),
        };

        let content_badges = store.badges_by_content(content_id);
        let mut achieved_badges = Vec::new();
        for badge in badges::passed_badges(&content_badges, percentage) {
            if let Some(mut award) = store.user_badge(user_id, badge.badge_id) {
                achieved_badges.push(badge.badge_id);
                if !award.achieved {
                    award.achieved = true;
                    store.save_user_badge(award);
                }
            }
        }

        let mut quest_advanced = false;
        let mut user_level = 0;
        if let Some(chain) = store.load_chain_by_course(course_id) {
            if let Some(mut user_chain) = store.load_user_chain(chain.quest_chain_id, user_id) {
                if let Some(new_level) = quests::advance(
                    &chain,
                    &user_chain,
                    content_id,
                    percentage,
                    self.config.thresholds.quest_passing_percentage,
                ) {
                    user_chain.user_level = new_level;
                    quest_advanced = true;
                }
                user_level = user_chain.user_level;
                store.save_user_chain(user_chain);
            }
        }

        let mut experience = 0;
        if let Some(mut membership) = store.membership(course_id, user_id) {
            membership.experience += levels::reward_for_finished_content(
                &self.config.experience,
                content.level,
                percentage,
            );
            experience = membership.experience;
            store.save_membership(membership);
        }

        FinishOutcome {
            accepted: true,
            percentage,
            achieved_badges,
            quest_advanced,
            user_level,
            experience,
            level: levels::level_for_exp(&course.required_exp_per_level, experience),
        }
    }

    pub fn current_quest(&self, user_id: &str, course_id: &str) -> Option<CurrentQuest> {
        let store = self.store();
        let chain = store.load_chain_by_course(course_id)?;
        let user_chain = store.load_user_chain(chain.quest_chain_id, user_id)?;

        Some(quests::current_quest(&chain, &user_chain))
    }

    pub fn user_quest_chain(&self, user_id: &str, course_id: &str) -> Option<UserQuestChain> {
        let store = self.store();
        let chain = store.load_chain_by_course(course_id)?;
        store.load_user_chain(chain.quest_chain_id, user_id)
    }

    pub fn user_experience(&self, user_id: &str, course_id: &str) -> Option<ExperienceSummary> {
        let store = self.store();
        let course = store.load_course(course_id)?;
        let membership = store.membership(course_id, user_id)?;

        Some(ExperienceSummary {
            experience: membership.experience,
            level: levels::level_for_exp(&course.required_exp_per_level, membership.experience),
            remaining_exp_in_level: levels::remaining_exp_in_level(
                &course.required_exp_per_level,
                membership.experience,
            ),
        })
    }

    /// Renames a content item: registry entry, quest description and badge
    /// descriptions. Thresholds and pointers stay put.
    pub fn rename_content(&self, course_id: &str, content_id: &str, name: &str) -> bool {
        let mut store = self.store();
        let mut course = match store.load_course(course_id) {
            None => return false,
            Some(course) => course,
        };
        let kind = match course.contents.get_mut(content_id) {
            None => return false,
            Some(content) => {
                content.name = name.into();
                content.kind
            }
        };

        if let Some(mut chain) = store.load_chain_by_course(course_id) {
            chain.rename_quest(content_id, &quest_description(kind, name, &self.config));
            store.save_chain(chain);
        }

        for mut badge in store.badges_by_content(content_id) {
            badges::rename_badge(&mut badge, name);
            store.save_badge(badge);
        }

        store.save_course(course);
        true
    }

    /// Removes a content item: its badges and all their awards go away,
    /// its quest is compacted out of the chain and every pointer strictly
    /// above the removed index moves down one.
    pub fn remove_content(&self, course_id: &str, content_id: &str) -> bool {
        let mut store = self.store();
        let mut course = match store.load_course(course_id) {
            None => return false,
            Some(course) => course,
        };
        if course.contents.remove(content_id).is_none() {
            return false;
        }

        for badge in store.badges_by_content(content_id) {
            store.delete_user_badges_for_badge(badge.badge_id);
            store.delete_badge(badge.badge_id);
        }

        if let Some(mut chain) = store.load_chain_by_course(course_id) {
            if let Some(removed_index) = chain.remove_quest(content_id) {
                for mut user_chain in store.list_user_chains(chain.quest_chain_id) {
                    let shifted = quests::shifted_level(user_chain.user_level, removed_index);
                    if shifted != user_chain.user_level {
                        user_chain.user_level = shifted;
                        store.save_user_chain(user_chain);
                    }
                }
            }
            store.save_chain(chain);
        }

        store.save_course(course);
        true
    }
}

fn quest_description(kind: ContentKind, name: &str, config: &Config) -> String {
    format!(
        "Finish the {} {} with at least {}% of your answers correct.",
        kind.label(),
        name,
        config.thresholds.quest_passing_percentage,
    )
}

#[derive(Clone, Debug)]
pub struct ResultWriter {
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl ResultWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<ResultWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let writer = Arc::new(Mutex::new(writer));

        Ok(ResultWriter { writer })
    }

    pub fn write(&self, record: ResultRecord) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_err| anyhow!("couldn't lock writer"))?;
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Thresholds;
    use crate::stores::MemoryStore;

    fn controller() -> GamificationController<MemoryStore> {
        let secret_key = hmac::Key::new(hmac::HMAC_SHA256, &[0u8; 32]);
        GamificationController::new(secret_key, Config::default(), MemoryStore::new(), None)
    }

    fn course_with_members(
        controller: &GamificationController<MemoryStore>,
        course_id: &str,
        members: &[&str],
    ) {
        assert!(controller.add_course(course_id));
        for member in members {
            assert!(controller.add_member(course_id, member).is_some());
        }
    }

    #[test]
    fn eight_of_ten_awards_two_tiers_and_advances_the_quest() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1", "user-2", "user-3"]);
        let created = controller
            .create_quiz_rewards("course-1", "quiz-1", "Rust Basics", 0)
            .unwrap();

        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-1", 8, 10);

        assert!(outcome.accepted);
        assert_eq!(outcome.percentage, 80);
        assert_eq!(outcome.achieved_badges.len(), 2);
        assert!(outcome.quest_advanced);
        assert_eq!(outcome.user_level, 1);

        // Tier 90 stays unachieved at exactly 80%, and other members are
        // untouched.
        let store = controller.store();
        for badge in &created {
            let award = store.user_badge("user-1", badge.badge_id).unwrap();
            assert_eq!(award.achieved, badge.passing_percentage < 80);
            let other = store.user_badge("user-2", badge.badge_id).unwrap();
            assert!(!other.achieved);
        }
    }

    #[test]
    fn join_after_authoring_backfills_awards_and_pointer() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "Rust Basics", 0);
        controller.create_flashcard_set_rewards("course-1", "set-1", "Vocabulary", 0);

        let user_chain = controller.add_member("course-1", "late-user").unwrap();
        assert_eq!(user_chain.user_level, 0);

        let store = controller.store();
        let course_badges = store.badges_by_course("course-1");
        assert_eq!(course_badges.len(), 6);
        for badge in course_badges {
            let award = store.user_badge("late-user", badge.badge_id).unwrap();
            assert!(!award.achieved);
        }
    }

    #[test]
    fn quests_gate_sequentially() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "First", 0);
        controller.create_quiz_rewards("course-1", "quiz-2", "Second", 0);

        // Finishing the second quiz first does not skip ahead.
        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-2", 10, 10);
        assert!(outcome.accepted);
        assert!(!outcome.quest_advanced);
        assert_eq!(outcome.user_level, 0);

        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-1", 8, 10);
        assert!(outcome.quest_advanced);
        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-2", 8, 10);
        assert!(outcome.quest_advanced);
        assert_eq!(outcome.user_level, 2);

        match controller.current_quest("user-1", "course-1").unwrap() {
            CurrentQuest::Finished { user_level } => assert_eq!(user_level, 2),
            CurrentQuest::Open { .. } => panic!("expected the finished sentinel"),
        }
    }

    #[test]
    fn removing_a_completed_quest_shifts_the_pointer_down() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1", "user-2"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "First", 0);
        controller.create_quiz_rewards("course-1", "quiz-2", "Second", 0);

        controller.finish_quiz("user-1", "course-1", "quiz-1", 9, 10);
        assert_eq!(
            controller
                .user_quest_chain("user-1", "course-1")
                .unwrap()
                .user_level,
            1
        );

        assert!(controller.remove_content("course-1", "quiz-1"));

        // user-1 was strictly above the removed index and moves down;
        // user-2 was at it and stays.
        assert_eq!(
            controller
                .user_quest_chain("user-1", "course-1")
                .unwrap()
                .user_level,
            0
        );
        assert_eq!(
            controller
                .user_quest_chain("user-2", "course-1")
                .unwrap()
                .user_level,
            0
        );

        let store = controller.store();
        assert!(store.badges_by_content("quiz-1").is_empty());
        assert_eq!(store.badges_by_course("course-1").len(), 3);
    }

    #[test]
    fn invalid_scores_are_silently_rejected() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "First", 0);

        for &(correct, total) in &[(11, 10), (-1, 10), (5, 0)] {
            let outcome = controller.finish_quiz("user-1", "course-1", "quiz-1", correct, total);
            assert!(!outcome.accepted);
        }

        assert_eq!(
            controller
                .user_quest_chain("user-1", "course-1")
                .unwrap()
                .user_level,
            0
        );
        assert_eq!(
            controller
                .user_experience("user-1", "course-1")
                .unwrap()
                .experience,
            0
        );
    }

    #[test]
    fn badge_achievement_is_monotone() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        let created = controller
            .create_quiz_rewards("course-1", "quiz-1", "First", 0)
            .unwrap();

        controller.finish_quiz("user-1", "course-1", "quiz-1", 6, 10);
        controller.finish_quiz("user-1", "course-1", "quiz-1", 1, 10);

        let store = controller.store();
        let tier_50 = created
            .iter()
            .find(|badge| badge.passing_percentage == 50)
            .unwrap();
        assert!(
            store
                .user_badge("user-1", tier_50.badge_id)
                .unwrap()
                .achieved
        );
    }

    #[test]
    fn finishing_content_credits_experience() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "First", 0);

        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-1", 10, 10);
        // reward_base 50, level 0, 100% => 50 experience.
        assert_eq!(outcome.experience, 50);
        assert_eq!(outcome.level, 0);

        let summary = controller.user_experience("user-1", "course-1").unwrap();
        assert_eq!(summary.experience, 50);
        assert_eq!(summary.remaining_exp_in_level, 50);
    }

    #[test]
    fn rename_content_retemplates_descriptions_only() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        let created = controller
            .create_quiz_rewards("course-1", "quiz-1", "Old", 0)
            .unwrap();

        assert!(controller.rename_content("course-1", "quiz-1", "New"));
        assert!(!controller.rename_content("course-1", "quiz-9", "New"));

        let store = controller.store();
        for badge in store.badges_by_content("quiz-1") {
            assert!(badge.description.contains("New"));
            assert!(created
                .iter()
                .any(|original| original.badge_id == badge.badge_id));
        }
        drop(store);

        match controller.current_quest("user-1", "course-1").unwrap() {
            CurrentQuest::Open { quest, .. } => assert!(quest.description.contains("New")),
            CurrentQuest::Finished { .. } => panic!("expected an open quest"),
        }
    }

    #[test]
    fn leaving_a_course_drops_the_pointer_but_not_the_awards() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        let created = controller
            .create_quiz_rewards("course-1", "quiz-1", "First", 0)
            .unwrap();

        controller.remove_member("course-1", "user-1");

        assert!(controller.user_quest_chain("user-1", "course-1").is_none());
        assert!(controller.user_experience("user-1", "course-1").is_none());
        let store = controller.store();
        assert!(store.user_badge("user-1", created[0].badge_id).is_some());
    }

    #[test]
    fn operations_on_unknown_courses_are_no_ops() {
        let controller = controller();

        assert!(controller.add_member("missing", "user-1").is_none());
        assert!(controller.add_chapter("missing").is_none());
        assert!(controller
            .create_quiz_rewards("missing", "quiz-1", "First", 0)
            .is_none());
        assert!(
            !controller
                .finish_quiz("user-1", "missing", "quiz-1", 8, 10)
                .accepted
        );
        assert!(controller.current_quest("user-1", "missing").is_none());
        assert!(!controller.remove_content("missing", "quiz-1"));
    }

    #[test]
    fn removing_a_course_cascades() {
        let controller = controller();
        course_with_members(&controller, "course-1", &["user-1"]);
        let created = controller
            .create_quiz_rewards("course-1", "quiz-1", "First", 0)
            .unwrap();

        assert!(controller.remove_course("course-1"));
        assert!(!controller.remove_course("course-1"));

        assert!(controller.user_quest_chain("user-1", "course-1").is_none());
        assert!(controller.user_experience("user-1", "course-1").is_none());
        let store = controller.store();
        assert!(store.badges_by_course("course-1").is_empty());
        assert!(store.user_badge("user-1", created[0].badge_id).is_none());
        assert!(store.members_of("course-1").is_empty());
    }

    #[test]
    fn session_tokens_round_trip_and_reject_tampering() {
        let controller = controller();
        let mut session = controller.take_test("user-1");
        session.submit_answer(0, true).unwrap();

        let token = controller.encode_session(&session).unwrap();
        let decoded = controller.decode_session(&token).unwrap();
        assert_eq!(decoded.user_id, "user-1");
        assert_eq!(decoded.answers[0], Some(true));

        let mut tampered = token.clone();
        tampered.replace_range(0..2, "zz");
        assert!(controller.decode_session(&tampered).is_err());
        assert!(controller.decode_session("not-a-token").is_err());
    }

    #[tokio::test]
    async fn evaluate_test_stores_the_classification() {
        let controller = controller();
        let mut session = controller.take_test("user-1");
        for question_id in 0..10 {
            session.submit_answer(question_id, false).unwrap();
        }

        let result = controller.evaluate_test(&session).await;
        assert!(result.has_taken_test);

        let stored = controller.classifier_result_for("user-1");
        assert!(stored.has_taken_test);
        assert_eq!(stored.dominant_type, result.dominant_type);
        assert_eq!(
            stored.achiever_pct + stored.explorer_pct + stored.socializer_pct + stored.killer_pct,
            200
        );

        let unknown = controller.classifier_result_for("user-2");
        assert!(!unknown.has_taken_test);
        assert_eq!(unknown.dominant_type, None);
    }

    #[tokio::test]
    async fn incomplete_sessions_are_not_stored() {
        let controller = controller();
        let mut session = controller.take_test("user-1");
        session.submit_answer(0, true).unwrap();

        let result = controller.evaluate_test(&session).await;
        assert!(!result.has_taken_test);
        assert!(!controller.classifier_result_for("user-1").has_taken_test);
    }

    #[test]
    fn custom_thresholds_flow_through_the_config() {
        let secret_key = hmac::Key::new(hmac::HMAC_SHA256, &[0u8; 32]);
        let config = Config {
            thresholds: Thresholds {
                badge_tiers: [30, 60, 95],
                quest_passing_percentage: 50,
            },
            ..Default::default()
        };
        let controller = GamificationController::new(secret_key, config, MemoryStore::new(), None);
        course_with_members(&controller, "course-1", &["user-1"]);
        controller.create_quiz_rewards("course-1", "quiz-1", "First", 0);

        let outcome = controller.finish_quiz("user-1", "course-1", "quiz-1", 5, 10);
        assert!(outcome.quest_advanced);
        assert_eq!(outcome.achieved_badges.len(), 1);
    }
}
