//! Per-word emphasis split.
//!
//! A word is split into an emphasized head and a plain tail at a grapheme
//! boundary. Lengths are counted in grapheme clusters, so an accented letter
//! or a flag sequence counts as one unit.

use core_types::EmphasisStyle;
use unicode_segmentation::UnicodeSegmentation;

const START_RATIO: f32 = 0.3;
const START_MIN: usize = 1;
const START_MAX: usize = 7;

/// Split of a word into emphasized head and remaining tail. An empty head
/// means the word is left unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rendered<'a> {
    pub head: &'a str,
    pub tail: &'a str,
}

impl<'a> Rendered<'a> {
    fn unchanged(word: &'a str) -> Self {
        Self {
            head: "",
            tail: word,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.head.is_empty()
    }
}

/// Applies the style's head length to one word. Words under two clusters are
/// never split, and both halves of a split are always non-empty.
pub fn render(word: &str, style: EmphasisStyle) -> Rendered<'_> {
    let clusters: Vec<(usize, &str)> = word.grapheme_indices(true).collect();
    let n = clusters.len();
    if n < 2 {
        return Rendered::unchanged(word);
    }
    let take = match style {
        EmphasisStyle::Half => n.div_ceil(2),
        EmphasisStyle::Start => {
            ((n as f32 * START_RATIO).round() as usize).clamp(START_MIN, START_MAX)
        }
    };
    if take == 0 || take >= n {
        return Rendered::unchanged(word);
    }
    let split = clusters[take].0;
    Rendered {
        head: &word[..split],
        tail: &word[split..],
    }
}
