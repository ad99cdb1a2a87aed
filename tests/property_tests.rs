//! Property-based tests for fileswap
//!
//! This module uses proptest to verify core invariants of the streaming
//! replacer. Property-based testing generates hundreds of random inputs to
//! verify that certain properties always hold true.

use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

use fileswap::ReplaceJob;

// Import proptest macro
use proptest::prelude::*;

fn replace_with_chunk(text: &str, pattern: &str, replacement: &str, chunk_size: usize) -> (String, usize) {
    let job = ReplaceJob::new(pattern, replacement).unwrap().chunk_size(chunk_size);
    let mut out = Vec::new();
    let count = job.replace_stream(Cursor::new(text.as_bytes()), &mut out).unwrap();
    (String::from_utf8(out).unwrap(), count)
}

// ============================================================================
// Property 1: Streaming matches whole-buffer replacement
// ============================================================================
// Chunk boundaries never change the result

proptest! {
    /// Output equals a non-overlapping leftmost-first replacement of the whole input,
    /// whatever the chunk size
    #[test]
    fn prop_chunk_size_does_not_change_output(
        text in "[ab]{0,200}",
        pattern in "[ab]{1,4}",
        replacement in "[a-c]{0,5}",
        chunk_size in 1usize..32
    ) {
        let (out, count) = replace_with_chunk(&text, &pattern, &replacement, chunk_size);

        prop_assert_eq!(out, text.replace(&pattern, &replacement));
        prop_assert_eq!(count, text.matches(pattern.as_str()).count());
    }

    /// Output length grows or shrinks by exactly the replacement delta per match
    #[test]
    fn prop_output_length_law(
        text in "[abc]{0,300}",
        pattern in "[abc]{1,6}",
        replacement in "[a-z]{0,8}",
        chunk_size in 1usize..64
    ) {
        let (out, count) = replace_with_chunk(&text, &pattern, &replacement, chunk_size);

        let expected = text.len() as isize
            + count as isize * (replacement.len() as isize - pattern.len() as isize);
        prop_assert_eq!(out.len() as isize, expected);
    }
}

// ============================================================================
// Property 2: Untouched and idempotent files
// ============================================================================

proptest! {
    /// A file without the pattern keeps its exact content and is not rewritten
    #[test]
    fn prop_no_match_leaves_file_untouched(
        text in "[a-m]{0,100}",
        pattern in "[x-z]{1,5}"
    ) {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, &text).unwrap();

        let job = ReplaceJob::new(pattern.as_str(), "REPLACED").unwrap().chunk_size(7);
        let result = job.replace_file(&file_path).unwrap();

        prop_assert_eq!(result.match_count, 0);
        prop_assert!(!result.mutated);
        prop_assert_eq!(fs::read_to_string(&file_path).unwrap(), text);
        prop_assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    /// A second run over an already replaced file finds nothing
    #[test]
    fn prop_second_run_is_noop(
        text in "[ab]{0,120}",
        pattern in "[ab]{1,3}",
        replacement in "[xyz]{1,3}"
    ) {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, &text).unwrap();

        let job = ReplaceJob::new(pattern.as_str(), replacement.as_str()).unwrap().chunk_size(5);
        let first = job.replace_file(&file_path).unwrap();
        let after_first = fs::read_to_string(&file_path).unwrap();

        let second = job.replace_file(&file_path).unwrap();

        prop_assert_eq!(first.mutated, first.match_count > 0);
        prop_assert_eq!(second.match_count, 0);
        prop_assert!(!second.mutated);
        prop_assert_eq!(fs::read_to_string(&file_path).unwrap(), after_first);
    }
}
