//! Page Enforcer
//!
//! Content-script policy, run inside every visited page. Two independent
//! tracks share the page:
//!
//! - the block track checks the page URL against the block list on load and
//!   on every URL change, and replaces the page with a notice on a match,
//! - the hide track hides elements for the enabled hide features on load, on
//!   every DOM mutation and on every URL change.
//!
//! Single-page apps change the URL without a navigation, so each track keeps
//! the last URL it saw and compares on every mutation.

use crate::features::{HiddenFeature, HiddenFeatureSet};
use crate::matcher::find_match;
use crate::store::{BlockStore, KeyValueStore, StoreError};
use crate::types::{BlockList, BlockPattern};

/// Markup placed in `<body>` when a page is blocked.
pub const BLOCK_NOTICE_HTML: &str = r#"
        <div style="display: flex; justify-content: center; align-items: center; height: 100vh; background-color: #f0f0f0; flex-direction: column; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif;">
            <h1 style="color: #333; font-size: 24px; margin-bottom: 16px;">Page Blocked</h1>
            <p style="color: #666;">This page has been blocked by Blockex.</p>
        </div>
    "#;

// =============================================================================
// Page Abstraction
// =============================================================================

/// Error type for DOM operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("DOM operation failed: {0}")]
    Dom(String),
}

/// An element returned by a selector query.
pub trait PageElement: Sized {
    fn tag_name(&self) -> String;
    fn has_attribute(&self, name: &str) -> bool;
    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Option<Self>;
    fn is_hidden(&self) -> bool;
    /// Set `display: none`.
    fn hide(&self);

    /// Anchors and anything carrying an `href`.
    fn is_link(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case("a") || self.has_attribute("href")
    }
}

/// A `<video>` or `<audio>` element.
pub trait MediaElement {
    fn pause(&self) -> Result<(), PageError>;
    fn mute(&self) -> Result<(), PageError>;
    fn clear_source(&self) -> Result<(), PageError>;
    fn detach(&self) -> Result<(), PageError>;
}

/// The document the content script runs in.
pub trait Page {
    type Element: PageElement;
    type Media: MediaElement;

    fn current_url(&self) -> String;
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;
    fn media_elements(&self) -> Vec<Self::Media>;
    /// Abort any in-flight page load.
    fn stop_loading(&self) -> Result<(), PageError>;
    fn replace_body(&self, html: &str) -> Result<(), PageError>;
}

// =============================================================================
// Block Track
// =============================================================================

/// Block track state for the current navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockState {
    Checking,
    Blocked(BlockPattern),
    Unblocked,
}

/// Stop loading, silence media, then swap the body for the notice.
///
/// Failures while stopping the load or touching media are logged and skipped;
/// only the body replacement is reported.
pub fn block_page<P: Page>(page: &P) -> Result<(), PageError> {
    if let Err(e) = page.stop_loading() {
        log::warn!("Could not stop page load: {}", e);
    }

    for media in page.media_elements() {
        let steps = [media.pause(), media.mute(), media.clear_source(), media.detach()];
        for result in steps {
            if let Err(e) = result {
                log::warn!("Media cleanup step failed: {}", e);
            }
        }
    }

    page.replace_body(BLOCK_NOTICE_HTML)
}

/// Block track controller. One per injected content script.
#[derive(Debug)]
pub struct BlockTrack {
    last_url: String,
    state: BlockState,
}

impl BlockTrack {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            last_url: initial_url.into(),
            state: BlockState::Checking,
        }
    }

    pub fn state(&self) -> &BlockState {
        &self.state
    }

    /// Record `url`; true when it differs from the last one seen.
    pub fn observe_url(&mut self, url: &str) -> bool {
        if url == self.last_url {
            return false;
        }
        self.last_url = url.to_string();
        true
    }

    /// Evaluate the page's current URL against `list`, blocking on a match.
    pub fn evaluate<P: Page>(&mut self, page: &P, list: &BlockList) -> &BlockState {
        self.state = BlockState::Checking;
        let url = page.current_url();

        self.state = match find_match(&url, list) {
            Some(pattern) => {
                log::info!("Blocking {} (pattern {})", url, pattern);
                if let Err(e) = block_page(page) {
                    log::warn!("Could not replace blocked page: {}", e);
                }
                BlockState::Blocked(pattern.clone())
            }
            None => BlockState::Unblocked,
        };
        &self.state
    }

    /// Load the block list and evaluate.
    pub async fn check<P: Page, S: KeyValueStore>(
        &mut self,
        page: &P,
        store: &BlockStore<S>,
    ) -> Result<&BlockState, StoreError> {
        self.state = BlockState::Checking;
        let list = store.load_block_list().await?;
        Ok(self.evaluate(page, &list))
    }
}

// =============================================================================
// Hide Track
// =============================================================================

/// Apply one feature's hide rule. Returns the number of newly hidden elements.
pub fn hide_feature<P: Page>(page: &P, feature: HiddenFeature) -> usize {
    let rule = feature.hide_rule();
    let url = page.current_url();
    if !rule.applies_to(&url) {
        return 0;
    }

    let mut hidden = 0;
    for selector in rule.selectors {
        for element in page.query_all(selector) {
            let target = if element.is_link() {
                rule.container_selectors
                    .iter()
                    .find_map(|container| element.closest(container))
                    .unwrap_or(element)
            } else {
                element
            };

            if !target.is_hidden() {
                target.hide();
                hidden += 1;
            }
        }
    }
    hidden
}

/// Hide track controller. One per injected content script.
#[derive(Debug)]
pub struct HideTrack {
    last_url: String,
}

impl HideTrack {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            last_url: initial_url.into(),
        }
    }

    /// Record `url`; true when it differs from the last one seen.
    pub fn observe_url(&mut self, url: &str) -> bool {
        if url == self.last_url {
            return false;
        }
        self.last_url = url.to_string();
        true
    }

    /// Apply every enabled feature. Safe to call repeatedly.
    pub fn apply<P: Page>(&self, page: &P, features: HiddenFeatureSet) -> usize {
        let hidden: usize = features.features().map(|f| hide_feature(page, f)).sum();
        if hidden > 0 {
            log::debug!("Hid {} elements", hidden);
        }
        hidden
    }

    /// Load the enabled features and apply them.
    pub async fn refresh<P: Page, S: KeyValueStore>(
        &self,
        page: &P,
        store: &BlockStore<S>,
    ) -> Result<usize, StoreError> {
        let features = store.load_hidden_features().await?;
        Ok(self.apply(page, features))
    }
}

// =============================================================================
// Enforcer
// =============================================================================

/// Both tracks bound to one page and one store.
pub struct PageEnforcer<P, S> {
    page: P,
    store: BlockStore<S>,
    block: BlockTrack,
    hide: HideTrack,
}

impl<P: Page, S: KeyValueStore> PageEnforcer<P, S> {
    pub fn new(page: P, store: S) -> Self {
        let url = page.current_url();
        Self {
            block: BlockTrack::new(url.clone()),
            hide: HideTrack::new(url),
            page,
            store: BlockStore::new(store),
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn block_state(&self) -> &BlockState {
        self.block.state()
    }

    pub fn store(&self) -> &BlockStore<S> {
        &self.store
    }

    /// Script injection.
    ///
    /// Both tracks always run; the first failure is reported afterwards.
    pub async fn on_load(&mut self) -> Result<(), StoreError> {
        let blocked = self.block.check(&self.page, &self.store).await.map(|_| ());
        let hidden = self.hide.refresh(&self.page, &self.store).await.map(|_| ());
        blocked.and(hidden)
    }

    /// Any DOM mutation. Re-checks blocking only if the URL moved.
    pub async fn on_mutation(&mut self) -> Result<(), StoreError> {
        let url = self.page.current_url();
        let blocked = if self.block.observe_url(&url) {
            log::debug!("URL changed to {}", url);
            self.block.check(&self.page, &self.store).await.map(|_| ())
        } else {
            Ok(())
        };
        self.hide.observe_url(&url);
        let hidden = self.hide.refresh(&self.page, &self.store).await.map(|_| ());
        blocked.and(hidden)
    }

    /// Back/forward navigation.
    pub async fn on_popstate(&mut self) -> Result<(), StoreError> {
        self.block.check(&self.page, &self.store).await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakePage;
    use super::*;
    use crate::store::{MemoryStore, BLOCKED_SITES_KEY};

    const SHORTS_SHELF: &str = "ytd-reel-shelf-renderer";
    const SHORTS_LINK: &str = "[href*=\"/shorts/\"]";

    fn list(patterns: &[&str]) -> BlockList {
        BlockList::from_stored(patterns.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_block_track_blocks_match() {
        let page = FakePage::new("https://a.com/foo");
        let media = page.add_media();
        let mut track = BlockTrack::new(page.current_url());

        let state = track.evaluate(&page, &list(&["a.com"]));
        assert_eq!(state, &BlockState::Blocked(BlockPattern::from_stored("a.com")));
        assert!(page.body().contains("Page Blocked"));
        assert!(page.stopped());
        assert_eq!(page.media_state(media), (true, true, true, true));
    }

    #[test]
    fn test_block_track_unblocked() {
        let page = FakePage::new("https://b.com/");
        let mut track = BlockTrack::new(page.current_url());
        assert_eq!(track.evaluate(&page, &list(&["a.com"])), &BlockState::Unblocked);
        assert_eq!(page.body(), "<main>article</main>");
        assert!(!page.stopped());
    }

    #[test]
    fn test_block_survives_stop_failure() {
        let page = FakePage::new("https://a.com/");
        page.fail_stop();
        let mut track = BlockTrack::new(page.current_url());
        track.evaluate(&page, &list(&["a.com"]));
        assert!(page.body().contains("This page has been blocked by Blockex."));
    }

    #[test]
    fn test_block_survives_media_step_failures() {
        let page = FakePage::new("https://a.com/watch");
        let stubborn = page.add_media();
        let plain = page.add_media();
        page.fail_media(stubborn);
        let mut track = BlockTrack::new(page.current_url());

        let state = track.evaluate(&page, &list(&["a.com"]));
        assert!(matches!(state, BlockState::Blocked(_)));
        // failed steps are skipped, the rest still run
        assert_eq!(page.media_state(stubborn), (false, true, false, true));
        assert_eq!(page.media_state(plain), (true, true, true, true));
        assert!(page.body().contains("Page Blocked"));
    }

    #[test]
    fn test_observe_url() {
        let mut track = BlockTrack::new("https://a.com/");
        assert!(!track.observe_url("https://a.com/"));
        assert!(track.observe_url("https://a.com/next"));
        assert!(!track.observe_url("https://a.com/next"));
    }

    #[test]
    fn test_hide_shorts_shelf_and_link_container() {
        let page = FakePage::new("https://www.youtube.com/");
        let shelf = page.add("ytd-reel-shelf-renderer", &[], &[SHORTS_SHELF], None);
        let card = page.add("ytd-video-renderer", &[], &["ytd-video-renderer"], None);
        let link = page.add("a", &["href"], &[SHORTS_LINK], Some(card));
        let other = page.add("div", &[], &["ytd-video-renderer"], None);

        let hidden = hide_feature(&page, HiddenFeature::YoutubeShorts);
        assert_eq!(hidden, 2);
        assert!(page.is_hidden(shelf));
        assert!(page.is_hidden(card));
        assert!(!page.is_hidden(link));
        assert!(!page.is_hidden(other));
    }

    #[test]
    fn test_hide_container_preference_order() {
        let page = FakePage::new("https://www.youtube.com/");
        let outer = page.add("ytd-rich-item-renderer", &[], &["ytd-rich-item-renderer"], None);
        let inner = page.add("ytd-video-renderer", &[], &["ytd-video-renderer"], Some(outer));
        page.add("a", &["href"], &[SHORTS_LINK], Some(inner));

        hide_feature(&page, HiddenFeature::YoutubeShorts);
        assert!(page.is_hidden(outer));
        assert!(!page.is_hidden(inner));
    }

    #[test]
    fn test_hide_link_without_container_hides_itself() {
        let page = FakePage::new("https://www.youtube.com/feed");
        let link = page.add("a", &["href"], &[SHORTS_LINK], None);
        hide_feature(&page, HiddenFeature::YoutubeShorts);
        assert!(page.is_hidden(link));
    }

    #[test]
    fn test_hide_is_idempotent() {
        let page = FakePage::new("https://www.youtube.com/");
        page.add("ytd-shorts", &[], &["ytd-shorts"], None);
        let track = HideTrack::new(page.current_url());
        let features = HiddenFeatureSet::from(HiddenFeature::YoutubeShorts);
        assert_eq!(track.apply(&page, features), 1);
        assert_eq!(track.apply(&page, features), 0);
    }

    #[test]
    fn test_hide_skips_search_results() {
        let page = FakePage::new("https://www.youtube.com/results?search_query=cats");
        let shelf = page.add("ytd-reel-shelf-renderer", &[], &[SHORTS_SHELF], None);
        let track = HideTrack::new(page.current_url());
        assert_eq!(track.apply(&page, HiddenFeature::YoutubeShorts.into()), 0);
        assert!(!page.is_hidden(shelf));
    }

    #[test]
    fn test_hide_skips_other_sites_and_disabled() {
        let page = FakePage::new("https://example.com/");
        let shelf = page.add("ytd-reel-shelf-renderer", &[], &[SHORTS_SHELF], None);
        let track = HideTrack::new(page.current_url());
        assert_eq!(track.apply(&page, HiddenFeature::YoutubeShorts.into()), 0);

        page.navigate("https://www.youtube.com/");
        assert_eq!(track.apply(&page, HiddenFeatureSet::empty()), 0);
        assert!(!page.is_hidden(shelf));
    }

    #[tokio::test]
    async fn test_enforcer_blocks_on_load() {
        let page = FakePage::new("https://a.com/foo");
        let store = MemoryStore::with_values(vec!["a.com".into()], vec![]);
        let mut enforcer = PageEnforcer::new(page.clone(), &store);

        enforcer.on_load().await.unwrap();
        assert_eq!(enforcer.block_state(), &BlockState::Blocked(BlockPattern::from_stored("a.com")));
        assert!(page.body().contains("Page Blocked"));
    }

    #[tokio::test]
    async fn test_enforcer_spa_navigation() {
        let page = FakePage::new("https://example.com/home");
        let store = MemoryStore::with_values(vec!["example.com/private".into()], vec![]);
        let mut enforcer = PageEnforcer::new(page.clone(), &store);

        enforcer.on_load().await.unwrap();
        assert_eq!(enforcer.block_state(), &BlockState::Unblocked);

        // mutation without URL change leaves the block track alone
        enforcer.on_mutation().await.unwrap();
        assert_eq!(enforcer.block_state(), &BlockState::Unblocked);

        page.navigate("https://example.com/private/inbox");
        enforcer.on_mutation().await.unwrap();
        assert_eq!(
            enforcer.block_state(),
            &BlockState::Blocked(BlockPattern::from_stored("example.com/private"))
        );
    }

    #[tokio::test]
    async fn test_enforcer_popstate_rechecks() {
        let page = FakePage::new("https://example.com/");
        let store = MemoryStore::with_values(vec![], vec![]);
        let mut enforcer = PageEnforcer::new(page.clone(), &store);
        enforcer.on_load().await.unwrap();

        store.replace(BLOCKED_SITES_KEY, vec!["example.com".into()]).unwrap();
        enforcer.on_popstate().await.unwrap();
        assert!(matches!(enforcer.block_state(), BlockState::Blocked(_)));
    }

    #[tokio::test]
    async fn test_enforcer_hides_new_elements_on_mutation() {
        let page = FakePage::new("https://www.youtube.com/");
        let store = MemoryStore::with_values(vec![], vec!["youtube-shorts".into()]);
        let mut enforcer = PageEnforcer::new(page.clone(), &store);
        enforcer.on_load().await.unwrap();

        let late = page.add("ytd-shorts", &[], &["ytd-shorts"], None);
        assert!(!page.is_hidden(late));
        enforcer.on_mutation().await.unwrap();
        assert!(page.is_hidden(late));
    }

    /// Fails reads of the block list; everything else is served from memory.
    struct BlockListUnreadable(MemoryStore);

    impl KeyValueStore for BlockListUnreadable {
        async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
            if key == BLOCKED_SITES_KEY {
                return Err(StoreError::Backend("blockedSites read failed".to_string()));
            }
            self.0.get_list(key).await
        }

        async fn set_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
            self.0.set_list(key, values).await
        }
    }

    #[tokio::test]
    async fn test_hide_track_runs_when_block_list_unreadable() {
        let page = FakePage::new("https://www.youtube.com/");
        let shelf = page.add("ytd-shorts", &[], &["ytd-shorts"], None);
        let store = BlockListUnreadable(MemoryStore::with_values(vec![], vec!["youtube-shorts".into()]));
        let mut enforcer = PageEnforcer::new(page.clone(), store);

        let err = enforcer.on_load().await.unwrap_err();
        assert_eq!(err, StoreError::Backend("blockedSites read failed".to_string()));
        assert!(page.is_hidden(shelf));
        assert_eq!(enforcer.block_state(), &BlockState::Checking);

        page.navigate("https://www.youtube.com/feed/subscriptions");
        let late = page.add("ytd-shorts", &[], &["ytd-shorts"], None);
        assert!(enforcer.on_mutation().await.is_err());
        assert!(page.is_hidden(late));
    }
}
