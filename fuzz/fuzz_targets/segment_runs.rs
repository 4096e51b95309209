#![no_main]

use libfuzzer_sys::fuzz_target;
use reader::segment_runs;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 4096 {
        return;
    }

    let runs = segment_runs(text);

    if text.is_empty() {
        assert!(runs.is_empty());
        return;
    }

    // Runs tile the input: contiguous, non-empty, covering every byte.
    let mut offset = 0;
    for run in &runs {
        assert_eq!(run.start, offset, "runs must be contiguous");
        assert!(!run.is_empty(), "runs must be non-empty");
        offset = run.end;
    }
    assert_eq!(offset, text.len(), "runs must cover the whole input");
    let total: usize = runs.iter().map(|run| run.len()).sum();
    assert_eq!(total, text.len(), "run lengths must sum to the input length");

    // Runs are maximal: no two neighbours share a kind.
    for pair in runs.windows(2) {
        assert_ne!(pair[0].kind, pair[1].kind, "adjacent runs must differ");
    }

    // Concatenating the runs reproduces the input byte for byte.
    let rebuilt: String = runs.iter().map(|run| run.text(text)).collect();
    assert_eq!(rebuilt, text, "runs must reassemble to the input");
});
