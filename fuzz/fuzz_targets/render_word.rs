#![no_main]

use core_types::EmphasisStyle;
use libfuzzer_sys::fuzz_target;
use reader::render;
use unicode_segmentation::UnicodeSegmentation;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(word) = std::str::from_utf8(rest) else {
        return;
    };
    if word.len() > 1024 {
        return;
    }

    let style = if selector & 1 == 0 {
        EmphasisStyle::Half
    } else {
        EmphasisStyle::Start
    };

    let split = render(word, style);

    // Head and tail always reassemble to the original word.
    let mut rebuilt = String::with_capacity(word.len());
    rebuilt.push_str(split.head);
    rebuilt.push_str(split.tail);
    assert_eq!(rebuilt, word, "head + tail must equal the word");

    let clusters = word.graphemes(true).count();
    if clusters < 2 {
        assert!(split.is_unchanged(), "short words must not split");
        return;
    }

    if !split.is_unchanged() {
        // A real split leaves both halves non-empty and cuts on a grapheme
        // boundary, so the head holds fewer clusters than the word.
        assert!(!split.head.is_empty());
        assert!(!split.tail.is_empty());
        let head_clusters = split.head.graphemes(true).count();
        let tail_clusters = split.tail.graphemes(true).count();
        assert_eq!(head_clusters + tail_clusters, clusters);
        match style {
            EmphasisStyle::Half => assert_eq!(head_clusters, clusters.div_ceil(2)),
            EmphasisStyle::Start => {
                assert!(head_clusters >= 1 && head_clusters <= 7);
            }
        }
    }
});
