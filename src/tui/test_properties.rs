//! Property-based tests for client state invariants.
//!
//! Arbitrary interleavings of key presses and data deliveries must keep
//! the model consistent: the cursor stays inside the visible rows, the
//! expansion set never refers to paths outside the forest, the forest
//! always matches a from-scratch rebuild of the unresolved sets, and
//! notifications stay bounded.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use proptest::prelude::*;

use super::model::{CheckOutcome, Model, Msg, Screen};
use super::update::update;
use crate::core::config::PollingConfig;
use crate::updates::tree::{PathEntry, UpdateForest, UpdateMeta};

// ──────────────────── strategies ────────────────────

fn arb_path() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("DAZHO-R"), Just("DAKrO-P"), Just("CDIAK-F")],
        1_u32..4,
        proptest::option::of(1_u32..3),
        proptest::option::of(1_u32..3),
    )
        .prop_map(|(root, fond, opus, case)| {
            let mut path = format!("{root}/{fond}");
            if let Some(opus) = opus {
                path.push_str(&format!("/{opus}"));
                if let Some(case) = case {
                    path.push_str(&format!("/{case}"));
                }
            }
            path
        })
}

fn arb_entries() -> impl Strategy<Value = Vec<PathEntry>> {
    proptest::collection::vec(arb_path(), 0..8).prop_map(|paths| {
        paths
            .into_iter()
            .map(|p| PathEntry::new(p, UpdateMeta::new("2024-06-01", None)))
            .collect()
    })
}

fn arb_key() -> impl Strategy<Value = Msg> {
    prop_oneof![
        Just(KeyCode::Char('j')),
        Just(KeyCode::Char('k')),
        Just(KeyCode::Char('1')),
        Just(KeyCode::Char('2')),
        Just(KeyCode::Char('3')),
        Just(KeyCode::Char('r')),
        Just(KeyCode::Char('v')),
        Just(KeyCode::Char('c')),
        Just(KeyCode::Char('C')),
        Just(KeyCode::Char('?')),
        Just(KeyCode::Char('n')),
        Just(KeyCode::Char('y')),
        Just(KeyCode::Enter),
        Just(KeyCode::Esc),
        Just(KeyCode::Up),
        Just(KeyCode::Down),
    ]
    .prop_map(|code| Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

fn arb_msg() -> impl Strategy<Value = Msg> {
    prop_oneof![
        4 => arb_key(),
        1 => arb_entries().prop_map(|entries| Msg::BranchUpdated {
            branch_key: "DAZHO-R".to_owned(),
            entries,
        }),
        1 => (arb_entries(), arb_entries()).prop_map(|(a, b)| {
            Msg::AllBranchesChecked(vec![
                CheckOutcome {
                    branch_key: "DAZHO-R".to_owned(),
                    result: Ok(a),
                },
                CheckOutcome {
                    branch_key: "DAKrO-P".to_owned(),
                    result: Ok(b),
                },
            ])
        }),
        1 => (0_u64..10).prop_map(Msg::NotificationExpired),
        1 => Just(Msg::Resize { cols: 80, rows: 24 }),
    ]
}

fn fresh_model() -> Model {
    let mut model = Model::new(PollingConfig::default(), (100, 40));
    model.screen = Screen::Updates;
    model
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn cursor_stays_within_visible_rows(msgs in proptest::collection::vec(arb_msg(), 0..40)) {
        let mut model = fresh_model();
        for msg in msgs {
            let _ = update(&mut model, msg);
            let visible = model.visible_rows().len();
            if visible == 0 {
                prop_assert_eq!(model.updates_selected, 0);
            } else {
                prop_assert!(model.updates_selected < visible);
            }
        }
    }

    #[test]
    fn expansion_never_references_unknown_paths_after_refresh(
        msgs in proptest::collection::vec(arb_msg(), 0..40)
    ) {
        let mut model = fresh_model();
        for msg in msgs {
            let refresh = matches!(msg, Msg::BranchUpdated { .. } | Msg::AllBranchesChecked(_));
            let _ = update(&mut model, msg);
            if refresh {
                for path in model.expansion.iter() {
                    prop_assert!(
                        model.forest.contains(path),
                        "expanded path {} missing from forest",
                        path
                    );
                }
            }
        }
    }

    #[test]
    fn forest_always_matches_rebuild_of_unresolved_sets(
        msgs in proptest::collection::vec(arb_msg(), 0..40)
    ) {
        let mut model = fresh_model();
        for msg in msgs {
            let _ = update(&mut model, msg);
            let entries: Vec<&PathEntry> = model.unresolved.values().flatten().collect();
            let rebuilt = UpdateForest::from_entries(entries.into_iter());
            prop_assert_eq!(&rebuilt, &model.forest);
        }
    }

    #[test]
    fn notifications_stay_bounded_with_unique_ids(
        msgs in proptest::collection::vec(arb_msg(), 0..60)
    ) {
        let mut model = fresh_model();
        for msg in msgs {
            let _ = update(&mut model, msg);
            prop_assert!(model.notifications.len() <= 3);
            let mut ids: Vec<u64> = model.notifications.iter().map(|n| n.id).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), model.notifications.len());
        }
    }

    #[test]
    fn watchlist_cursor_survives_any_watchlist(
        msgs in proptest::collection::vec(arb_msg(), 0..30),
        len in 0_usize..4,
    ) {
        let mut model = fresh_model();
        model.screen = Screen::Watchlist;
        model.watchlist = (0..len)
            .map(|i| crate::api::types::WatchlistEntry {
                archive: format!("A{i}"),
                subarchive: "S".to_owned(),
                last_checked_date: String::new(),
                cutoff_date: String::new(),
            })
            .collect();
        for msg in msgs {
            let _ = update(&mut model, msg);
            if !model.watchlist.is_empty() {
                prop_assert!(model.watchlist_selected < model.watchlist.len());
            }
        }
    }
}
