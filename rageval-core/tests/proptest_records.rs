//! Property-based tests for the record filters and the context literal parser.

use proptest::prelude::*;
use std::collections::HashSet;

use rageval_core::literal::{encode_string_list, parse_string_list};
use rageval_core::records::{
    Document, QueryRecord, clean_text, get_short_docs, remove_duplicated_queries,
    remove_elements, remove_recs_without_query,
};

fn queries() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-c?]{0,4}", 0..30)
}

fn short_texts() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("( ?[a-z]{1,3}){0,6}", 0..20)
}

fn pdf_text() -> impl Strategy<Value = String> {
    "[a-z\n\u{ad}\u{a0} ]{0,40}"
}

fn raw_cell() -> impl Strategy<Value = String> {
    ".{0,64}"
}

fn records(qs: &[String]) -> Vec<QueryRecord> {
    qs.iter().map(|q| QueryRecord::new(q.as_str())).collect()
}

fn is_subsequence(small: &[String], big: &[String]) -> bool {
    let mut it = big.iter();
    small.iter().all(|s| it.any(|b| b == s))
}

// --- Question filter ---

proptest! {
    #[test]
    fn question_filter_keeps_exactly_questions_in_order(qs in queries()) {
        let kept: Vec<String> = remove_recs_without_query(records(&qs))
            .into_iter()
            .map(|r| r.query)
            .collect();
        let expected: Vec<String> = qs.iter().filter(|q| q.contains('?')).cloned().collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn question_filter_is_idempotent(qs in queries()) {
        let once = remove_recs_without_query(records(&qs));
        let twice = remove_recs_without_query(once.clone());
        prop_assert_eq!(once, twice);
    }
}

// --- Duplicate filter ---

proptest! {
    #[test]
    fn dedup_keeps_first_occurrences(qs in queries()) {
        let kept: Vec<String> = remove_duplicated_queries(records(&qs))
            .into_iter()
            .map(|r| r.query)
            .collect();

        let unique: HashSet<&String> = kept.iter().collect();
        prop_assert_eq!(unique.len(), kept.len());
        prop_assert!(is_subsequence(&kept, &qs));

        let mut seen = HashSet::new();
        let first_seen: Vec<String> = qs.iter().filter(|q| seen.insert(*q)).cloned().collect();
        prop_assert_eq!(kept, first_seen);
    }

    #[test]
    fn dedup_is_idempotent(qs in queries()) {
        let once = remove_duplicated_queries(records(&qs));
        let twice = remove_duplicated_queries(once.clone());
        prop_assert_eq!(once, twice);
    }
}

// --- Index removal ---

proptest! {
    #[test]
    fn remove_elements_drops_distinct_in_range_indices(
        len in 0usize..40,
        indices in prop::collection::vec(0usize..60, 0..20),
    ) {
        let elements: Vec<usize> = (0..len).collect();
        let distinct_in_range: HashSet<usize> =
            indices.iter().copied().filter(|i| *i < len).collect();
        let kept = remove_elements(elements, &indices);
        prop_assert_eq!(kept.len(), len - distinct_in_range.len());
        prop_assert!(kept.iter().all(|e| !distinct_in_range.contains(e)));
        prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn short_docs_removal_leaves_only_long_docs(
        texts in short_texts(),
        min_length in 0usize..5,
    ) {
        let docs: Vec<Document> = texts.iter().map(|t| Document::new(t.as_str())).collect();
        let short = get_short_docs(&docs, min_length);
        let kept = remove_elements(docs, &short);
        prop_assert!(kept.iter().all(|d| d.text.split_whitespace().count() >= min_length));
    }

    #[test]
    fn clean_text_removes_line_breaks(text in pdf_text()) {
        let cleaned = clean_text(&text);
        prop_assert!(!cleaned.contains('\n'));
        let nbsp = '\u{a0}';
        prop_assert!(!cleaned.contains(nbsp));
    }
}

// --- Context literals ---

proptest! {
    #[test]
    fn encoded_lists_parse_back(items in prop::collection::vec(any::<String>(), 0..8)) {
        let encoded = encode_string_list(&items);
        prop_assert_eq!(parse_string_list(&encoded).unwrap(), items);
    }

    #[test]
    fn parser_never_panics(input in raw_cell()) {
        let _ = parse_string_list(&input);
    }
}
