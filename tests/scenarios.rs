//! End-to-end editing scenarios: presentation intent -> flat model -> patch
//! burst -> incrementally patched tree, checked against a fresh rebuild.

use serde_json::json;
use spansync_core::flat::FlatText;
use spansync_core::span::{BlockMarker, Expand, Mark, MarkRange, Span};
use spansync_core::tree::{BlockOrigin, SnapshotNode};
use spansync_core::{build, EditIntent, EngineConfig, NodeId, SyncEngine, TreePosition};

struct Session {
    flat: FlatText,
    engine: SyncEngine,
}

impl Session {
    fn new(spans: &[Span], marks: &[Mark]) -> Self {
        let flat = FlatText::from_spans(spans, marks).unwrap();
        let engine = SyncEngine::mount(&flat.spans(), &flat.marks(), EngineConfig::default()).unwrap();
        Self { flat, engine }
    }

    fn run(&mut self, intent: EditIntent) {
        let ops = self.engine.translate(&intent).unwrap();
        for op in &ops {
            let burst = self.flat.apply_op(op).unwrap();
            self.engine.apply(&burst).unwrap();
        }
        self.assert_in_sync();
    }

    fn assert_in_sync(&self) {
        let tree = self.engine.tree();
        assert!(
            tree.invariant_violations().is_empty(),
            "{:?}",
            tree.invariant_violations()
        );
        assert_eq!(tree.visible_text(), self.flat.visible_text());
        let rebuilt = build(&self.flat.spans(), &self.flat.marks(), self.engine.config()).unwrap();
        assert_eq!(self.engine.snapshot(), rebuilt.snapshot());
    }

    fn block(&self, slot: usize) -> NodeId {
        self.engine.tree().text_blocks()[slot]
    }

    fn at(&self, slot: usize, offset: usize) -> TreePosition {
        TreePosition::new(self.block(slot), offset)
    }

    fn texts(&self) -> Vec<String> {
        let tree = self.engine.tree();
        tree.text_blocks()
            .iter()
            .map(|id| tree.block_text(*id).unwrap_or_default())
            .collect()
    }
}

#[test]
fn insert_at_end() {
    let mut session = Session::new(&[Span::text("Hello World")], &[]);
    session.run(EditIntent::InsertText {
        at: session.at(0, 11),
        text: "!".into(),
    });
    assert_eq!(session.texts(), vec!["Hello World!"]);
}

#[test]
fn remote_insertion_in_middle() {
    let mut session = Session::new(&[Span::text("Hello World")], &[]);
    let burst = session.flat.splice(5, 0, " Happy").unwrap();
    session.engine.apply(&burst).unwrap();
    session.assert_in_sync();
    assert_eq!(session.engine.tree().visible_text(), "Hello Happy World");
}

#[test]
fn split_block_moves_tail() {
    let mut session = Session::new(&[Span::text("Hello World")], &[]);
    let first = session.block(0);
    session.run(EditIntent::SplitBlock {
        at: session.at(0, 5),
        block: None,
    });
    assert_eq!(session.texts(), vec!["Hello", " World"]);
    assert_eq!(session.block(0), first);
    assert_eq!(session.flat.to_plain_string(), "Hello\n World");
}

#[test]
fn enter_then_backspace_at_end() {
    let mut session = Session::new(&[Span::text("Hello")], &[]);
    let first = session.block(0);

    session.run(EditIntent::SplitBlock {
        at: session.at(0, 5),
        block: None,
    });
    assert_eq!(session.texts(), vec!["Hello", ""]);

    session.run(EditIntent::DeleteBackward {
        at: session.at(1, 0),
    });
    assert_eq!(session.texts(), vec!["Hello"]);
    assert_eq!(session.block(0), first);
}

#[test]
fn double_enter() {
    let mut session = Session::new(&[Span::text("Hello")], &[]);
    session.run(EditIntent::SplitBlock {
        at: session.at(0, 5),
        block: None,
    });

    let cursor = session.engine.mapper().unwrap().to_tree_position(6).unwrap();
    assert_eq!(cursor, session.at(1, 0));
    session.run(EditIntent::SplitBlock {
        at: cursor,
        block: None,
    });

    assert_eq!(session.texts(), vec!["Hello", "", ""]);
    assert_eq!(session.flat.to_plain_string(), "Hello\n\n");
}

#[test]
fn bold_toggle() {
    let mut session = Session::new(&[Span::text("Hello World")], &[]);
    let toggle = |session: &Session| EditIntent::ToggleMark {
        from: session.at(0, 6),
        to: session.at(0, 11),
        name: "strong".into(),
        value: json!(true),
    };

    session.run(toggle(&session));
    assert_eq!(session.flat.marks(), vec![Mark::new("strong", json!(true), 6, 11)]);

    session.run(toggle(&session));
    assert!(session.flat.marks().is_empty());
    assert_eq!(session.engine.tree().block(session.block(0)).unwrap().inlines.len(), 1);
}

#[test]
fn mark_then_adjacent_insert_expand_before() {
    let mut session = Session::new(&[Span::text("Hello World")], &[]);
    let burst = session
        .flat
        .mark(
            MarkRange::new(6, 11).with_expand(Expand::Before),
            "strong",
            json!(true),
        )
        .unwrap();
    session.engine.apply(&burst).unwrap();

    session.run(EditIntent::InsertText {
        at: session.at(0, 6),
        text: "Strong".into(),
    });

    let snapshot = session.engine.snapshot();
    let paragraph = &snapshot.children()[0];
    let runs: Vec<(String, bool)> = paragraph
        .children()
        .iter()
        .map(|child| match child {
            SnapshotNode::Text { text, marks } => (text.clone(), marks.contains("strong")),
            other => panic!("unexpected child {:?}", other),
        })
        .collect();
    assert_eq!(
        runs,
        vec![("Hello ".to_string(), false), ("StrongWorld".to_string(), true)]
    );
}

#[test]
fn link_mark_round_trip() {
    let mut session = Session::new(&[Span::text("Link here")], &[]);
    let link = json!({"href": "https://example.com", "title": "Example"});
    session.run(EditIntent::SetMark {
        from: session.at(0, 0),
        to: session.at(0, 4),
        name: "link".into(),
        value: link.clone(),
    });

    // stored as a JSON string in the flat model
    assert_eq!(
        session.flat.marks(),
        vec![Mark::new("link", json!(link.to_string()), 0, 4)]
    );

    // decoded back to an object in the tree
    let tree = session.engine.tree();
    let first = tree.block(session.block(0)).unwrap().inlines[0];
    assert_eq!(tree.inline(first).unwrap().text, "Link");
    assert_eq!(tree.inline(first).unwrap().marks.get("link"), Some(&link));
}

#[test]
fn heading_retype_and_implicit_block() {
    let mut session = Session::new(&[Span::text("Title")], &[]);
    assert_eq!(
        session.engine.tree().block(session.block(0)).unwrap().origin,
        BlockOrigin::Implicit
    );

    session.run(EditIntent::ChangeBlock {
        block: session.block(0),
        block_type: "heading".into(),
        attrs: json!({"level": 1}).as_object().cloned().unwrap(),
        parents: None,
    });
    let heading = session.engine.tree().block(session.block(0)).unwrap();
    assert_eq!(heading.origin, BlockOrigin::Marker);
    assert_eq!(heading.block_type, "heading");
    assert_eq!(heading.attrs.get("level"), Some(&json!(1)));

    session.run(EditIntent::ChangeBlock {
        block: session.block(0),
        block_type: "heading".into(),
        attrs: json!({"level": 2}).as_object().cloned().unwrap(),
        parents: None,
    });
    let heading = session.engine.tree().block(session.block(0)).unwrap();
    assert_eq!(heading.attrs.get("level"), Some(&json!(2)));
}

#[test]
fn list_edits_keep_identity() {
    let item = BlockMarker::new("list_item").with_parents(["bullet_list"]);
    let mut session = Session::new(
        &[
            Span::block(BlockMarker::new("paragraph")),
            Span::text("One"),
            Span::block(item.clone()),
            Span::text("Two"),
            Span::block(item),
            Span::text("Three"),
        ],
        &[],
    );
    let tree = session.engine.tree();
    let root_children = tree.block(tree.root()).unwrap().children.clone();
    let list = root_children[1];
    let before: Vec<NodeId> = tree.text_blocks().to_vec();

    session.run(EditIntent::InsertText {
        at: session.at(2, 5),
        text: "!".into(),
    });
    assert_eq!(session.engine.tree().text_blocks(), before.as_slice());

    session.run(EditIntent::SplitBlock {
        at: session.at(1, 3),
        block: None,
    });
    let tree = session.engine.tree();
    assert_eq!(tree.text_blocks().len(), 4);
    assert_eq!(tree.block(tree.root()).unwrap().children, root_children);
    assert_eq!(tree.block(list).unwrap().children.len(), 3);
    assert_eq!(tree.text_blocks()[0], before[0]);
    assert_eq!(tree.text_blocks()[1], before[1]);
    assert_eq!(tree.text_blocks()[3], before[2]);
}

#[test]
fn deleting_across_blocks_merges_them() {
    let mut session = Session::new(
        &[
            Span::text("Hello"),
            Span::block(BlockMarker::new("heading")),
            Span::text("Big"),
            Span::block(BlockMarker::new("paragraph")),
            Span::text("World"),
        ],
        &[],
    );
    session.run(EditIntent::Delete {
        from: session.at(0, 3),
        to: session.at(2, 2),
    });
    assert_eq!(session.texts(), vec!["Helrld"]);
}
