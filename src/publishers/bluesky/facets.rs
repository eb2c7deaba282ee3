//! Rich-text facet parsing
//!
//! Scans post text for URLs, @mentions and #hashtags and emits the
//! byte-range annotations the Bluesky post schema requires. Offsets are
//! UTF-8 **byte** offsets, not scalar counts — a multi-byte character before
//! a match shifts the range, and Bluesky renders garbage if the offsets are
//! counted in characters.
//!
//! The three categories are scanned independently and emitted grouped
//! (all links, then all mentions, then all tags), not in left-to-right text
//! order. Overlaps between categories are not reconciled.

use std::sync::OnceLock;

use regex::Regex;

/// UTF-8 byte range of a facet within the post text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetFeature {
    Link { uri: String },
    /// The raw handle; resolution to a DID happens at publish time.
    Mention { handle: String },
    /// Tag text without the leading `#`.
    Tag { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub index: ByteRange,
    pub feature: FacetFeature,
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("valid url regex"))
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\W)(@([A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}))")
            .expect("valid mention regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\W)(#([A-Za-z0-9_]+))").expect("valid tag regex"))
}

/// Parse the facets of a post text. Pure function, no I/O.
pub fn parse_facets(text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();

    for found in url_regex().find_iter(text) {
        // Sentence punctuation directly after a URL is not part of it.
        let uri = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if uri.ends_with("://") {
            continue;
        }
        facets.push(Facet {
            index: ByteRange {
                byte_start: found.start(),
                byte_end: found.start() + uri.len(),
            },
            feature: FacetFeature::Link {
                uri: uri.to_string(),
            },
        });
    }

    for caps in mention_regex().captures_iter(text) {
        let (Some(whole), Some(handle)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        facets.push(Facet {
            index: ByteRange {
                byte_start: whole.start(),
                byte_end: whole.end(),
            },
            feature: FacetFeature::Mention {
                handle: handle.as_str().to_string(),
            },
        });
    }

    for caps in tag_regex().captures_iter(text) {
        let (Some(whole), Some(tag)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        // Bare numbers ("#1") are not tags.
        if tag.as_str().chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        facets.push(Facet {
            index: ByteRange {
                byte_start: whole.start(),
                byte_end: whole.end(),
            },
            feature: FacetFeature::Tag {
                tag: tag.as_str().to_string(),
            },
        });
    }

    facets
}
