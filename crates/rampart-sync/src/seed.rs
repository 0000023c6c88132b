//! Bootstrap welcome content for empty leaf forums.
//!
//! The only guard against seeding twice is the store's conditional thread
//! insert, evaluated inside the reconciliation transaction. There is no
//! "already seeded" flag.

use rampart_store::{ContentId, NewContent, RowId, StoreError, StoreTx};
use thiserror::Error;

/// Seeding errors.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The forum gained a thread between the emptiness check and the insert.
    /// Not fatal: the forum keeps the content it already has.
    #[error("Forum '{slug}' already has content, skipping welcome thread")]
    Race { slug: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Title and body of the welcome thread for a forum.
pub fn welcome_copy(slug: &str, name: &str) -> (String, String) {
    let canned = match slug {
        "shill-zone" => Some((
            "Shill Zone Rules: Read Before You Shill",
            "Every thread needs a prefix. [SHILL] for projects, [AMA] for sessions. \
             Disclose your bags. Rugs get you banned, not tipped.",
        )),
        "beg-zone" => Some((
            "Welcome to the Beg Zone",
            "Ask for tips here and nowhere else. Be creative, be polite, and tip it \
             forward when your luck turns.",
        )),
        "memes" => Some((
            "Meme Thread Zero",
            "Post your finest. Reposts are judged harshly. No financial advice hidden \
             in JPEGs.",
        )),
        "dice-bots" => Some((
            "Dice Bots: Share Your Scripts",
            "Post strategies with their seeds and sample sizes. Untested scripts get \
             moved without notice.",
        )),
        "high-rollers" => Some((
            "High Rollers Lounge",
            "VIP only. Big bets, bigger stories. Keep screenshots honest.",
        )),
        "big-wins" => Some((
            "Post Your Big Wins",
            "Share the hit, the bet and the game. Tipping is on, so congratulate \
             properly.",
        )),
        "announcements" => Some((
            "Official Announcements",
            "Platform news lands here first. Posting is limited to staff.",
        )),
        "alpha-channel" => Some((
            "Alpha Channel Ground Rules",
            "Level 10 and up. Share sources, not screenshots of screenshots.",
        )),
        "bug-reports" => Some((
            "How to Report a Bug",
            "Prefix your thread with [BUG]. Include steps, what you expected and what \
             happened. Staff mark resolved threads [FIXED].",
        )),
        _ => None,
    };

    match canned {
        Some((title, body)) => (title.to_string(), body.to_string()),
        None => (
            format!("Welcome to {}", name),
            format!(
                "This is the first thread in {}. Introduce yourself, read the forum \
                 rules and keep discussion on topic.",
                name
            ),
        ),
    }
}

/// Create the sticky welcome thread and its root post for an empty forum.
///
/// Returns the welcome thread's id, or [`SeedError::Race`] when the forum
/// already had a thread at insert time.
pub fn seed_welcome_content(
    tx: &mut dyn StoreTx,
    forum_id: RowId,
    slug: &str,
    name: &str,
    author: &str,
) -> Result<ContentId, SeedError> {
    let (title, body) = welcome_copy(slug, name);

    let thread = NewContent::sticky_thread(forum_id, title, author.to_string());
    let Some(thread_id) = tx.insert_thread_if_empty(thread)? else {
        return Err(SeedError::Race {
            slug: slug.to_string(),
        });
    };

    tx.insert_content(NewContent::root_post(
        forum_id,
        thread_id,
        body,
        author.to_string(),
    ))?;

    tracing::debug!(forum = slug, thread = %thread_id, "Seeded welcome thread");
    Ok(thread_id)
}
