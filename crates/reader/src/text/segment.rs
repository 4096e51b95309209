//! Text-run segmentation.
//!
//! Splits a text node's content into contiguous byte runs of words,
//! whitespace, and symbol/pictograph clusters. Grapheme clusters are the
//! atomic unit: a multi-scalar emoji sequence never splits across runs.
//! Concatenating the runs in order always reproduces the input bytes.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunKind {
    Word,
    Whitespace,
    /// Symbols, emoji, and pictographs. Kept verbatim by the transformer.
    Pictographic,
}

/// A half-open byte range over the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub start: usize,
    pub end: usize,
    pub kind: RunKind,
}

impl TextRun {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Whether a code point reads as a symbol or pictograph rather than part of
/// a word. Covers the ASCII/Latin-1 symbol set plus the arrow, currency,
/// combining-mark, emoji, and variation-selector blocks. Letterlike symbols
/// (U+2100..U+214F) stay word material.
fn is_symbol_or_pictograph(cp: u32) -> bool {
    match cp {
        0x24 | 0x2B | 0x3C..=0x3E | 0x5E | 0x60 | 0x7C | 0x7E => true,
        0xA2..=0xA6 | 0xA8 | 0xA9 | 0xAC | 0xAE | 0xAF | 0xB0 | 0xB1 | 0xB4 | 0xB8 | 0xD7
        | 0xF7 => true,
        // Zero-width joiner only occurs here inside emoji sequences.
        0x200D => true,
        // Currency symbols.
        0x20A0..=0x20CF => true,
        // Combining marks for symbols.
        0x20D0..=0x20FF => true,
        // Arrows through miscellaneous symbols and dingbats.
        0x2190..=0x2BFF => true,
        // Variation selectors.
        0xFE00..=0xFE0F => true,
        // Emoji and extended pictographs.
        0x1F000..=0x1FBFF => true,
        _ => false,
    }
}

fn classify_cluster(cluster: &str) -> RunKind {
    if cluster.chars().any(|c| is_symbol_or_pictograph(c as u32)) {
        return RunKind::Pictographic;
    }
    if cluster.chars().all(char::is_whitespace) {
        return RunKind::Whitespace;
    }
    RunKind::Word
}

/// Segments text into maximal same-kind runs.
pub fn segment_runs(text: &str) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut offset = 0;
    for cluster in text.graphemes(true) {
        let kind = classify_cluster(cluster);
        let end = offset + cluster.len();
        match runs.last_mut() {
            Some(run) if run.kind == kind => run.end = end,
            _ => runs.push(TextRun {
                start: offset,
                end,
                kind,
            }),
        }
        offset = end;
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(RunKind, String)> {
        segment_runs(text)
            .iter()
            .map(|run| (run.kind, run.text(text).to_owned()))
            .collect()
    }

    #[test]
    fn splits_words_and_whitespace() {
        assert_eq!(
            kinds("two words"),
            vec![
                (RunKind::Word, "two".to_owned()),
                (RunKind::Whitespace, " ".to_owned()),
                (RunKind::Word, "words".to_owned()),
            ]
        );
    }

    #[test]
    fn punctuation_stays_inside_word_runs() {
        let runs = kinds("don't stop.");
        assert_eq!(runs[0], (RunKind::Word, "don't".to_owned()));
        assert_eq!(runs[2], (RunKind::Word, "stop.".to_owned()));
    }

    #[test]
    fn emoji_forms_a_pictographic_run() {
        assert_eq!(
            kinds("go 🚀 now"),
            vec![
                (RunKind::Word, "go".to_owned()),
                (RunKind::Whitespace, " ".to_owned()),
                (RunKind::Pictographic, "🚀".to_owned()),
                (RunKind::Whitespace, " ".to_owned()),
                (RunKind::Word, "now".to_owned()),
            ]
        );
    }

    #[test]
    fn zwj_sequence_is_one_pictographic_run() {
        let family = "👩\u{200D}👩\u{200D}👧";
        let runs = segment_runs(family);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].kind, RunKind::Pictographic);
        assert_eq!(runs[0].text(family), family);
    }

    #[test]
    fn arrows_and_currency_are_pictographic() {
        let runs = kinds("a → b costs €5");
        assert!(runs.contains(&(RunKind::Pictographic, "→".to_owned())));
        assert!(runs.contains(&(RunKind::Pictographic, "€".to_owned())));
    }

    #[test]
    fn runs_reassemble_to_the_input() {
        let samples = [
            "",
            "plain",
            "  leading and trailing  ",
            "mixed → text 🎉 with\nnewlines\tand tabs",
            "combining e\u{301} accents",
        ];
        for sample in samples {
            let rebuilt: String = segment_runs(sample)
                .iter()
                .map(|run| run.text(sample))
                .collect();
            assert_eq!(rebuilt, sample);
        }
    }

    #[test]
    fn empty_input_yields_no_runs() {
        assert!(segment_runs("").is_empty());
    }

    #[test]
    fn letterlike_symbols_stay_word_material() {
        let runs = kinds("2℃ outside");
        assert_eq!(runs[0], (RunKind::Word, "2℃".to_owned()));
    }
}
