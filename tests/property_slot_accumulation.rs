use parley::domain::models::{ChatMessage, DialogueState, SlotValues};
use proptest::prelude::*;
use serde_json::Value;

const SLOTS: [&str; 4] = ["ticker", "quantity", "education", "address"];

fn slot_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z]{1,8}".prop_map(Value::String),
    ]
}

fn extraction() -> impl Strategy<Value = SlotValues> {
    prop::collection::btree_map(
        prop::sample::select(SLOTS.to_vec()).prop_map(String::from),
        slot_value(),
        0..4,
    )
}

fn required() -> Vec<String> {
    SLOTS[..3].iter().map(|s| (*s).to_string()).collect()
}

proptest! {
    /// Property: once a slot holds a value, later extractions may change it
    /// but never empty it.
    #[test]
    fn prop_filled_slots_stay_filled(extractions in prop::collection::vec(extraction(), 1..12)) {
        let mut state = DialogueState::new("c", "intent", required(), &SlotValues::new());
        let mut filled: Vec<String> = Vec::new();

        for values in &extractions {
            state.merge_slots(values);

            for name in &filled {
                prop_assert!(state.is_slot_filled(name), "slot {} was emptied", name);
            }
            for (name, value) in values {
                if !value.is_null() {
                    prop_assert_eq!(state.collected_slots.get(name), Some(value));
                    if !filled.contains(name) {
                        filled.push(name.clone());
                    }
                }
            }
            prop_assert!(state.collected_slots.values().all(|v| !v.is_null()));
        }
    }

    /// Property: the missing slots are exactly the unfilled required slots,
    /// in declaration order.
    #[test]
    fn prop_missing_slots_partition_required(values in extraction()) {
        let state = DialogueState::new("c", "intent", required(), &values);
        let missing = state.missing_slots();

        let expected: Vec<&str> = SLOTS[..3]
            .iter()
            .copied()
            .filter(|name| values.get(*name).is_none_or(Value::is_null))
            .collect();
        prop_assert_eq!(&missing, &expected);
        prop_assert_eq!(state.is_complete(), missing.is_empty());
        prop_assert_eq!(state.next_missing_slot(), expected.first().copied());
    }

    /// Property: confirmation is reachable only when every required slot is filled.
    #[test]
    fn prop_confirmation_requires_complete_slots(values in extraction()) {
        let mut state = DialogueState::new("c", "intent", required(), &values);
        let complete = state.is_complete();
        prop_assert_eq!(state.mark_confirmation_pending().is_ok(), complete);
    }

    /// Property: history never exceeds its bound and keeps the newest messages.
    #[test]
    fn prop_history_is_bounded(turns in 1usize..30, max in 1usize..10) {
        let mut state = DialogueState::new("c", "intent", required(), &SlotValues::new());
        for turn in 0..turns {
            state.append_history(
                [ChatMessage::user(format!("u{turn}")), ChatMessage::assistant(format!("a{turn}"))],
                max,
            );
            prop_assert!(state.history.len() <= max);
        }
        let last = state.history.last().map(|m| m.content.clone());
        prop_assert_eq!(last, Some(format!("a{}", turns - 1)));
    }
}
