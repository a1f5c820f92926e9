use hearth_lib::{frequent_items, latest_week_items, HistoryEntry};
use proptest::prelude::*;

fn entry(text: &str, quantity: Option<&str>, week_start: &str) -> HistoryEntry {
    HistoryEntry {
        id: String::new(),
        household_id: "h1".into(),
        list_id: "l1".into(),
        text: text.into(),
        quantity: quantity.map(str::to_string),
        week_start: week_start.into(),
        completed_at: 0,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn latest_week_takes_only_the_newest_week() {
    let history = vec![
        entry("Milk", None, "2024-01-07"),
        entry("milk", None, "2024-01-07"),
        entry("Eggs", None, "2023-12-31"),
    ];
    let items = latest_week_items(&history);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "Milk");
    assert_eq!(items[0].quantity, None);
}

#[test]
fn frequent_ranks_descending_with_stable_ties() {
    let history = vec![
        entry("Bread", None, "2023-12-24"),
        entry("milk", None, "2023-12-24"),
        entry("Bread", None, "2023-12-31"),
        entry("Milk", None, "2023-12-31"),
        entry("Eggs", None, "2023-12-31"),
        entry("Bread", None, "2024-01-07"),
    ];
    assert_eq!(
        frequent_items(&history, 2, 8),
        vec!["Bread".to_string(), "milk".to_string()]
    );
}

#[test]
fn frequent_boundaries() {
    assert!(frequent_items(&[], 2, 8).is_empty());

    let all_singles = vec![
        entry("Milk", None, "2024-01-07"),
        entry("Eggs", None, "2024-01-07"),
        entry("Bread", None, "2024-01-07"),
    ];
    assert!(frequent_items(&all_singles, 2, 8).is_empty());
}

proptest! {
    // Pure functions: same input, same output, no hidden state.
    #[test]
    fn latest_week_is_idempotent(
        texts in proptest::collection::vec("[A-Za-z ]{1,12}", 0..24),
        weeks in proptest::collection::vec(0usize..3, 0..24),
    ) {
        let week_starts = ["2023-12-31", "2024-01-07", "2024-01-14"];
        let history: Vec<HistoryEntry> = texts
            .iter()
            .zip(weeks.iter().cycle())
            .map(|(text, week)| entry(text, None, week_starts[*week]))
            .collect();

        let first = latest_week_items(&history);
        let second = latest_week_items(&history);
        prop_assert_eq!(&first, &second);

        let ranked_a = frequent_items(&history, 2, 8);
        let ranked_b = frequent_items(&history, 2, 8);
        prop_assert_eq!(ranked_a, ranked_b);
    }

    #[test]
    fn frequent_never_exceeds_limit_or_undershoots_min_count(
        texts in proptest::collection::vec("[a-d]{1,2}", 0..40),
        min_count in 1usize..4,
        limit in 0usize..6,
    ) {
        let history: Vec<HistoryEntry> = texts
            .iter()
            .map(|text| entry(text, None, "2024-01-07"))
            .collect();

        let ranked = frequent_items(&history, min_count, limit);
        prop_assert!(ranked.len() <= limit);
        for display in &ranked {
            let count = history
                .iter()
                .filter(|e| e.text.trim().to_lowercase() == display.to_lowercase())
                .count();
            prop_assert!(count >= min_count);
        }
    }
}
