//! Hide-feature catalog
//!
//! Each feature is a named DOM-suppression behavior scoped to one site. The
//! catalog is fixed at compile time; storage only holds the enabled ids.

// =============================================================================
// Catalog
// =============================================================================

/// A toggleable hide feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HiddenFeature {
    /// Shorts shelves, tabs and links on YouTube.
    YoutubeShorts,
}

impl HiddenFeature {
    /// Every feature, in popup display order.
    pub const ALL: [HiddenFeature; 1] = [HiddenFeature::YoutubeShorts];

    /// Id persisted under `hiddenFeatures`.
    pub fn id(self) -> &'static str {
        match self {
            Self::YoutubeShorts => "youtube-shorts",
        }
    }

    /// Label shown next to the toggle.
    pub fn label(self) -> &'static str {
        match self {
            Self::YoutubeShorts => "Hide YouTube Shorts",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }

    fn flag(self) -> HiddenFeatureSet {
        match self {
            Self::YoutubeShorts => HiddenFeatureSet::YOUTUBE_SHORTS,
        }
    }

    /// Element-hiding rules for this feature.
    pub fn hide_rule(self) -> &'static HideRule {
        match self {
            Self::YoutubeShorts => &YOUTUBE_SHORTS_RULE,
        }
    }
}

// =============================================================================
// Enabled Set
// =============================================================================

bitflags::bitflags! {
    /// Set of enabled hide features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HiddenFeatureSet: u32 {
        const YOUTUBE_SHORTS = 1 << 0;
    }
}

impl HiddenFeatureSet {
    /// Build from stored ids. Ids not in the catalog are skipped.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for id in ids {
            match HiddenFeature::from_id(id.as_ref()) {
                Some(feature) => set |= feature.flag(),
                None => log::debug!("Ignoring unknown hide feature '{}'", id.as_ref()),
            }
        }
        set
    }

    /// Ids in catalog order, for storage.
    pub fn to_ids(self) -> Vec<String> {
        self.features().map(|f| f.id().to_string()).collect()
    }

    pub fn is_enabled(self, feature: HiddenFeature) -> bool {
        self.contains(feature.flag())
    }

    pub fn set_enabled(&mut self, feature: HiddenFeature, enabled: bool) {
        self.set(feature.flag(), enabled);
    }

    /// Enabled features in catalog order.
    pub fn features(self) -> impl Iterator<Item = HiddenFeature> {
        HiddenFeature::ALL.into_iter().filter(move |f| self.is_enabled(*f))
    }
}

impl From<HiddenFeature> for HiddenFeatureSet {
    fn from(feature: HiddenFeature) -> Self {
        feature.flag()
    }
}

// =============================================================================
// Hide Rules
// =============================================================================

/// How a feature finds the elements to hide.
#[derive(Debug)]
pub struct HideRule {
    /// The rule only runs when the page URL contains this.
    pub site_marker: &'static str,
    /// The rule never runs when the page URL contains any of these.
    pub exempt_url_parts: &'static [&'static str],
    /// Elements to hide.
    pub selectors: &'static [&'static str],
    /// For link-like matches, the nearest of these ancestors is hidden instead,
    /// tried in order.
    pub container_selectors: &'static [&'static str],
}

impl HideRule {
    pub fn applies_to(&self, url: &str) -> bool {
        url.contains(self.site_marker) && !self.exempt_url_parts.iter().any(|part| url.contains(part))
    }
}

static YOUTUBE_SHORTS_RULE: HideRule = HideRule {
    site_marker: "youtube.com",
    // search results stay untouched
    exempt_url_parts: &["/results"],
    selectors: &[
        // homepage shelf
        "ytd-rich-section-renderer[is-shorts]",
        // shelves on home and watch pages
        "ytd-reel-shelf-renderer",
        "[href*=\"/shorts/\"]",
        // channel tab
        "yt-tab-shape[tab-title=\"Shorts\"]",
        // mini player
        "ytd-shorts",
    ],
    container_selectors: &[
        "ytd-rich-item-renderer",
        "ytd-video-renderer",
        "ytd-grid-video-renderer",
        "ytd-compact-video-renderer",
    ],
};
