//! Tiered badges and their per-member awards.

use crate::models::{Badge, ContentKind, RecordId, UserBadge};

fn badge_description(passing_percentage: u32, kind: ContentKind, name: &str) -> String {
    format!(
        "At least {}% of your answers for the {} {} are correct.",
        passing_percentage,
        kind.label(),
        name,
    )
}

/// Creates the three badges of a content item, one per configured tier.
pub fn tiered_badges(
    content_id: &str,
    kind: ContentKind,
    name: &str,
    course_id: &str,
    tiers: &[u32; 3],
) -> Vec<Badge> {
    tiers
        .iter()
        .map(|&passing_percentage| Badge {
            badge_id: RecordId::random(),
            content_id: content_id.into(),
            kind,
            course_id: course_id.into(),
            passing_percentage,
            description: badge_description(passing_percentage, kind, name),
        })
        .collect()
}

/// Placeholder awards for a set of badges and a set of members, none of
/// them achieved yet. Used both for the fan-out at badge creation and for
/// the backfill when a member joins later.
pub fn placeholder_awards<'a>(
    badges: &[Badge],
    members: impl Iterator<Item = &'a str> + Clone,
) -> Vec<UserBadge> {
    badges
        .iter()
        .flat_map(|badge| {
            members.clone().map(move |user_id| UserBadge {
                user_badge_id: RecordId::random(),
                user_id: user_id.into(),
                badge_id: badge.badge_id,
                achieved: false,
            })
        })
        .collect()
}

/// The badges of one content item whose threshold the score strictly
/// exceeds. The comparison is deliberately `<`, not `<=`.
pub fn passed_badges<'a>(badges: &'a [Badge], percentage: u32) -> Vec<&'a Badge> {
    badges
        .iter()
        .filter(|badge| badge.passing_percentage < percentage)
        .collect()
}

/// Re-templates a badge description after its content item was renamed.
pub fn rename_badge(badge: &mut Badge, name: &str) {
    badge.description = badge_description(badge.passing_percentage, badge.kind, name);
}
