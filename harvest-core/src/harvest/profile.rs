use serde::Serialize;
use tracing::info;

use crate::browser::ProfileHeaderSnapshot;

use super::counts::{find_tagged_count, parse_count, CountTag};
use super::error::{HarvestError, HarvestResult};
use super::navigator::{FeedNavigator, PageState};
use super::session::RenderingSession;
use super::types::TargetHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub handle: TargetHandle,
    pub url: String,
    pub private: bool,
    pub avatar: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub verified: bool,
    pub posts_raw: Option<String>,
    pub followers_raw: Option<String>,
    pub following_raw: Option<String>,
    pub posts: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
}

impl ProfileSummary {
    pub fn from_header(
        handle: TargetHandle,
        url: String,
        private: bool,
        header: ProfileHeaderSnapshot,
    ) -> Self {
        let posts_raw = find_tagged_count(&header.text, CountTag::Posts);
        let followers_raw = find_tagged_count(&header.text, CountTag::Followers);
        let following_raw = find_tagged_count(&header.text, CountTag::Following);
        Self {
            username: header.username.or_else(|| Some(handle.to_string())),
            handle,
            url,
            private,
            avatar: header.avatar,
            display_name: header.display_name,
            bio: header.bio,
            verified: header.verified,
            posts: posts_raw.as_deref().and_then(parse_count),
            followers: followers_raw.as_deref().and_then(parse_count),
            following: following_raw.as_deref().and_then(parse_count),
            posts_raw,
            followers_raw,
            following_raw,
        }
    }
}

/// Reads the header of a target's profile. Private targets are summarized, not rejected.
pub struct ProfileInspector<'a> {
    navigator: &'a FeedNavigator,
}

impl<'a> ProfileInspector<'a> {
    pub fn new(navigator: &'a FeedNavigator) -> Self {
        Self { navigator }
    }

    pub async fn inspect(
        &self,
        session: &mut RenderingSession,
        target: &TargetHandle,
    ) -> HarvestResult<ProfileSummary> {
        let url = self.navigator.profile_url(target)?;
        let private = match self.navigator.load(session, &url).await? {
            PageState::NotFound => {
                return Err(HarvestError::ProfileNotFound {
                    handle: target.to_string(),
                })
            }
            PageState::Private => true,
            PageState::Available => false,
        };
        let header = session.surface().read_profile_header().await?;
        let summary = ProfileSummary::from_header(target.clone(), url, private, header);
        info!(
            handle = %target,
            private,
            followers = ?summary.followers,
            "profile inspected"
        );
        Ok(summary)
    }
}
