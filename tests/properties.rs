//! Property tests: random edit sequences on the flat model, applied to the tree
//! incrementally, must leave it equal to a fresh rebuild.

use proptest::prelude::*;
use serde_json::json;
use spansync_core::flat::FlatText;
use spansync_core::patch::Patch;
use spansync_core::span::{BlockMarker, MarkRange};
use spansync_core::{apply_patches, build, BoundaryAffinity, DocumentTree, EngineConfig, PositionMapper};

#[derive(Debug, Clone)]
enum Action {
    Type { at: usize, text: String },
    Delete { at: usize, len: usize },
    Split { at: usize, kind: u8 },
    Join { pick: usize },
    Retype { pick: usize, kind: u8 },
    Mark { at: usize, len: usize, name: u8, remove: bool },
}

fn marker(kind: u8) -> BlockMarker {
    match kind % 5 {
        0 => BlockMarker::new("paragraph"),
        1 => BlockMarker::new("heading").with_attr("level", json!(2)),
        2 => BlockMarker::new("list_item").with_parents(["bullet_list"]),
        3 => BlockMarker::new("list_item").with_parents(["bullet_list", "list_item", "bullet_list"]),
        _ => BlockMarker::new("paragraph").with_parents(["blockquote"]),
    }
}

fn action() -> impl Strategy<Value = Action> {
    let text = prop::sample::select(vec!["a", "bc", " ", "héllo", "e\u{301}", "xyz"]);
    prop_oneof![
        3 => (any::<usize>(), text).prop_map(|(at, text)| Action::Type { at, text: text.to_string() }),
        2 => (any::<usize>(), 1usize..5).prop_map(|(at, len)| Action::Delete { at, len }),
        2 => (any::<usize>(), any::<u8>()).prop_map(|(at, kind)| Action::Split { at, kind }),
        1 => any::<usize>().prop_map(|pick| Action::Join { pick }),
        1 => (any::<usize>(), any::<u8>()).prop_map(|(pick, kind)| Action::Retype { pick, kind }),
        2 => (any::<usize>(), 1usize..8, 0u8..3, any::<bool>())
            .prop_map(|(at, len, name, remove)| Action::Mark { at, len, name, remove }),
    ]
}

/// Run one action on the flat model; `None` when it does not apply
fn step(flat: &mut FlatText, action: &Action) -> Option<Vec<Patch>> {
    let len = flat.len();
    let markers: Vec<usize> = flat.blocks().map(|(offset, _)| offset).collect();
    let burst = match action {
        Action::Type { at, text } => flat.splice(at % (len + 1), 0, text),
        Action::Delete { at, len: count } => {
            if len == 0 {
                return None;
            }
            let at = at % len;
            flat.splice(at, (*count).min(len - at), "")
        }
        Action::Split { at, kind } => flat.split_block(at % (len + 1), marker(*kind)),
        Action::Join { pick } => {
            let offset = *markers.get(pick % markers.len().max(1))?;
            flat.join_block(offset)
        }
        Action::Retype { pick, kind } => {
            let offset = *markers.get(pick % markers.len().max(1))?;
            flat.update_block(offset, marker(*kind))
        }
        Action::Mark {
            at,
            len: span,
            name,
            remove,
        } => {
            if len == 0 {
                return None;
            }
            let start = at % len;
            let range = MarkRange::new(start, (start + span).min(len));
            match (*name, *remove) {
                (_, true) => flat.unmark(range, ["strong", "em", "link"][*name as usize]),
                (0, false) => flat.mark(range, "strong", json!(true)),
                (1, false) => flat.mark(range, "em", json!(true)),
                _ => flat.mark(
                    range,
                    "link",
                    json!(json!({"href": "https://example.com"}).to_string()),
                ),
            }
        }
    };
    Some(burst.expect("generated actions stay in range"))
}

fn check(flat: &FlatText, tree: &DocumentTree, config: &EngineConfig) -> Result<(), TestCaseError> {
    let violations = tree.invariant_violations();
    prop_assert!(violations.is_empty(), "invariants: {:?}", violations);
    prop_assert_eq!(tree.visible_text(), flat.visible_text());
    prop_assert_eq!(tree.flat_len(), flat.len());

    let rebuilt = build(&flat.spans(), &flat.marks(), config).expect("rebuild");
    prop_assert_eq!(tree.snapshot(), rebuilt.snapshot());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn incremental_tree_matches_rebuild(actions in prop::collection::vec(action(), 1..40)) {
        let config = EngineConfig::default();
        let mut flat = FlatText::new();
        let mut tree = build(&[], &[], &config).expect("empty document");

        for action in &actions {
            let Some(burst) = step(&mut flat, action) else { continue };
            apply_patches(&mut tree, &burst, &config).expect("burst applies");
            check(&flat, &tree, &config)?;
        }
    }

    #[test]
    fn positions_round_trip(actions in prop::collection::vec(action(), 1..25)) {
        let config = EngineConfig::default();
        let mut flat = FlatText::new();
        for action in &actions {
            step(&mut flat, action);
        }
        let tree = build(&flat.spans(), &flat.marks(), &config).expect("build");

        for affinity in [BoundaryAffinity::NextBlock, BoundaryAffinity::PreviousBlock] {
            let mapper = PositionMapper::new(&tree, affinity);
            for offset in 0..=mapper.len() {
                let position = mapper.to_tree_position(offset).expect("in range");
                prop_assert_eq!(mapper.to_flat_offset(&position).expect("addressable"), offset);
            }
            prop_assert!(mapper.to_tree_position(mapper.len() + 1).is_err());
        }
    }

    #[test]
    fn untouched_blocks_keep_identity(
        setup in prop::collection::vec(action(), 1..20),
        text in "[a-z]{1,4}",
    ) {
        let config = EngineConfig::default();
        let mut flat = FlatText::new();
        for action in &setup {
            step(&mut flat, action);
        }
        let mut tree = build(&flat.spans(), &flat.marks(), &config).expect("build");
        let before = tree.text_blocks().to_vec();

        // typing at the very end touches only the last text block
        let burst = flat.splice(flat.len(), 0, &text).expect("append");
        apply_patches(&mut tree, &burst, &config).expect("burst applies");

        prop_assert_eq!(tree.text_blocks(), before.as_slice());
        check(&flat, &tree, &config)?;
    }
}
