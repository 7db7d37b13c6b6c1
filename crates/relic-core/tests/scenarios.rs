//! End-to-end extraction scenarios.
//!
//! Each test builds a small fixture tree on disk, runs the full two-pass
//! pipeline against an in-memory store, and asserts on the resulting
//! node/edge sets.

use std::fs;
use std::path::{Path, PathBuf};

use relic_core::adapter::{AdapterSet, SizeLimits};
use relic_core::builder::{BuilderConfig, GraphBuilder};
use relic_core::sync::{SyncController, SyncOptions, SyncOutcome};
use relic_core::vcs::{Vcs, VcsError};
use relic_store::{EdgeKind, GraphStore, MemoryStore, NodeKind};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn build(root: &Path, files: &[PathBuf]) -> MemoryStore {
    let store = MemoryStore::new();
    let mut builder = GraphBuilder::new(
        AdapterSet::new(SizeLimits::default()),
        &BuilderConfig::default(),
    )
    .unwrap();
    let report = builder.run(root, files, &store).unwrap();
    assert!(report.is_clean(), "failures: {:?}", report.failures);
    store
}

fn edge_exists(
    store: &MemoryStore,
    source: (&str, NodeKind),
    target: (&str, NodeKind),
    kind: EdgeKind,
) -> bool {
    let source_id = relic_core::node_id(source.1, source.0);
    let target_id = relic_core::node_id(target.1, target.0);
    store
        .edges_of_kind(kind)
        .iter()
        .any(|e| e.source == source_id && e.target == target_id)
}

struct FakeVcs {
    current: String,
    changed: Vec<PathBuf>,
}

impl Vcs for FakeVcs {
    fn current_revision(&self) -> Result<String, VcsError> {
        Ok(self.current.clone())
    }

    fn changed_files(&self, _from: &str, _to: &str) -> Result<Vec<PathBuf>, VcsError> {
        Ok(self.changed.clone())
    }
}

// ============================================================================
// Scenario A: stored procedure extraction
// ============================================================================

#[test]
fn stored_procedure_graph() {
    let dir = TempDir::new().unwrap();
    let sql = write(
        dir.path(),
        "inventory.sql",
        "\
CREATE PROCEDURE UpdateInventory\n\
AS\n\
BEGIN\n\
    UPDATE Inventory SET Quantity = 0\n\
    SELECT * FROM Products\n\
    EXEC dbo.NotifyManager\n\
END\n",
    );

    let store = build(dir.path(), &[sql]);

    let proc = store
        .find_node("UpdateInventory", NodeKind::Function)
        .expect("procedure becomes a Function node");
    assert_eq!(proc.file.as_deref(), Some("inventory.sql"));
    assert_eq!(proc.start_line, Some(1));

    assert!(edge_exists(
        &store,
        ("UpdateInventory", NodeKind::Function),
        ("Products", NodeKind::Global),
        EdgeKind::UsesGlobal,
    ));
    assert!(edge_exists(
        &store,
        ("UpdateInventory", NodeKind::Function),
        ("NotifyManager", NodeKind::Function),
        EdgeKind::Calls,
    ));
}

// ============================================================================
// Scenario B: class, call, and global usage across one managed file
// ============================================================================

#[test]
fn class_call_and_global_usage_graph() {
    let dir = TempDir::new().unwrap();
    let cs = write(
        dir.path(),
        "app.cs",
        "\
class MyClass : BaseClass {\n\
    void method() {\n\
        process();\n\
    }\n\
}\n\
\n\
class Helpers {\n\
    static int globalVar;\n\
\n\
    void process() {\n\
        globalVar = globalVar + 1;\n\
    }\n\
}\n",
    );

    let store = build(dir.path(), &[cs]);

    assert!(store.find_node("MyClass", NodeKind::Class).is_some());
    assert!(store.find_node("method", NodeKind::Function).is_some());
    assert!(store.find_node("process", NodeKind::Function).is_some());
    assert!(store.find_node("globalVar", NodeKind::Global).is_some());

    assert!(edge_exists(
        &store,
        ("MyClass", NodeKind::Class),
        ("BaseClass", NodeKind::Class),
        EdgeKind::InheritsFrom,
    ));
    assert!(edge_exists(
        &store,
        ("method", NodeKind::Function),
        ("process", NodeKind::Function),
        EdgeKind::Calls,
    ));
    assert!(edge_exists(
        &store,
        ("process", NodeKind::Function),
        ("globalVar", NodeKind::Global),
        EdgeKind::UsesGlobal,
    ));
}

// ============================================================================
// Scenario C: embedded page line fidelity
// ============================================================================

#[test]
fn embedded_page_definition_keeps_original_lines() {
    let dir = TempDir::new().unwrap();
    let page = write(
        dir.path(),
        "default.aspx",
        "\
<%@ Page Language=\"C#\" %>\n\
<html>\n\
<body>\n\
    <% ProcessMessage(); %>\n\
    <script runat=\"server\">\n\
        void ProcessMessage() {\n\
            Render();\n\
        }\n\
    </script>\n\
</body>\n\
</html>\n",
    );

    let store = build(dir.path(), &[page]);

    let def = store
        .find_node("ProcessMessage", NodeKind::Function)
        .expect("server-script function resolves");
    // Line number against the original file, not the masked text.
    assert_eq!(def.start_line, Some(6));
    assert_eq!(def.file.as_deref(), Some("default.aspx"));
}

// ============================================================================
// Scenario D: sync behavior
// ============================================================================

fn sync_controller<'a>(
    root: &Path,
    store: &'a MemoryStore,
    vcs: &'a FakeVcs,
) -> SyncController<'a, MemoryStore> {
    let builder = GraphBuilder::new(
        AdapterSet::new(SizeLimits::default()),
        &BuilderConfig::default(),
    )
    .unwrap();
    SyncController::new(root, store, vcs, builder, SyncOptions::default())
}

#[test]
fn sync_with_no_relevant_changes_only_moves_the_pointer() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.set_last_indexed_revision("r1").unwrap();
    let vcs = FakeVcs {
        current: "r2".to_string(),
        changed: vec![PathBuf::from("README.md"), PathBuf::from("image.png")],
    };

    let outcome = sync_controller(dir.path(), &store, &vcs).sync().unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::StateAdvanced {
            revision: "r2".to_string()
        }
    );
    assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r2"));
    // Zero store mutations beyond the revision pointer.
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
}

#[test]
fn sync_with_large_delta_refuses_without_override() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.set_last_indexed_revision("r1").unwrap();
    let vcs = FakeVcs {
        current: "r2".to_string(),
        changed: (0..6).map(|i| PathBuf::from(format!("src/f{i}.cpp"))).collect(),
    };

    let outcome = sync_controller(dir.path(), &store, &vcs).sync().unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::LargeDelta {
            changed: 6,
            limit: 5
        }
    );
    // The stored revision is untouched.
    assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r1"));
}

// ============================================================================
// Cross-language runs
// ============================================================================

#[test]
fn mixed_language_tree_builds_one_graph() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(
            dir.path(),
            "engine.cpp",
            "int g_mode;\nvoid tick() {\n    g_mode = 1;\n    render();\n}\n",
        ),
        write(
            dir.path(),
            "ui.ts",
            "function render(): void {\n    draw();\n}\n",
        ),
        write(
            dir.path(),
            "report.sql",
            "CREATE PROC DailyReport AS\nBEGIN\n    SELECT * FROM Orders\nEND\n",
        ),
    ];

    let store = build(dir.path(), &files);

    // The same-name collapse links the C++ call site to the TS definition.
    let render = store.find_node("render", NodeKind::Function).unwrap();
    assert_eq!(render.file.as_deref(), Some("ui.ts"));
    assert!(edge_exists(
        &store,
        ("tick", NodeKind::Function),
        ("render", NodeKind::Function),
        EdgeKind::Calls,
    ));
    assert!(store.find_node("DailyReport", NodeKind::Function).is_some());

    // Three File nodes, one per source.
    let file_nodes = store
        .nodes()
        .into_iter()
        .filter(|n| n.kind == NodeKind::File)
        .count();
    assert_eq!(file_nodes, 3);
}

#[test]
fn graph_survives_an_unparseable_file() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "garbage.cpp", "%%% not even close to C++ {{{"),
        write(dir.path(), "fine.cpp", "void survivor() {\n}\n"),
    ];

    let store = build(dir.path(), &files);
    assert!(store.find_node("survivor", NodeKind::Function).is_some());
}
