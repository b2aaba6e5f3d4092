use fsjson_core::{
    Category, Node, SYNTHETIC_ROOT_NAME, Snapshot, aggregate, assemble, canonical_order, flatten,
    human_size,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn dir(path: &str, parent: &str) -> Node {
    let name = path.rsplit('/').next().unwrap_or(path);
    Node::new_directory(name).with_path(path, parent)
}

fn file(path: &str, parent: &str, size: u64) -> Node {
    let name = path.rsplit('/').next().unwrap_or(path);
    Node::new_file(name, size).with_path(path, parent)
}

/// Flat records for `/r` with four subdirectories and the given files.
fn records(files: &[(usize, u64)]) -> Vec<Node> {
    let mut flat = vec![dir("/r", "/")];
    for d in 0..4 {
        flat.push(dir(&format!("/r/d{d}"), "/r"));
    }
    for (i, (d, size)) in files.iter().enumerate() {
        let parent = format!("/r/d{d}");
        flat.push(file(&format!("{parent}/f{i}.txt"), &parent, *size));
    }
    flat
}

fn check_aggregates(node: &Node) {
    if !node.is_dir {
        return;
    }
    assert_eq!(node.size_bytes, node.children_size(), "size of {}", node.full_path);
    assert_eq!(node.child_count, node.children.len());
    assert_eq!(node.size_human, human_size(node.size_bytes));
    for pair in node.children.windows(2) {
        assert_ne!(canonical_order(&pair[0], &pair[1]), std::cmp::Ordering::Greater);
    }
    node.children.iter().for_each(check_aggregates);
}

#[test]
fn test_assemble_spec_scenario() {
    let flat = vec![
        file("/c.txt", "", 1),
        file("/a/b.txt", "/a", 2),
        dir("/a", ""),
    ];
    let root = assemble(flat);
    assert_eq!(root.name, SYNTHETIC_ROOT_NAME);
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].name, "a");
    assert_eq!(root.children[0].children[0].name, "b.txt");
    assert_eq!(root.children[1].name, "c.txt");
}

#[test]
fn test_flat_snapshot_file_to_tree() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flat.json");
    Snapshot::Flat(records(&[(0, 10), (1, 20), (1, 5)]))
        .write(&path, false)
        .unwrap();

    let tree = Snapshot::read(&path).unwrap().into_tree();
    assert_eq!(tree.full_path, "/r");
    assert_eq!(tree.size_bytes, 35);
    assert_eq!(tree.count_files(), 3);
    assert_eq!(tree.count_dirs(), 5);
    assert_eq!(tree.children[1].size_bytes, 25);
    assert_eq!(tree.children[0].children[0].category, Category::Text);
    check_aggregates(&tree);
}

#[test]
fn test_tree_snapshot_pretty_output() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tree.json");
    let tree = assemble(records(&[(2, 1024)]));
    Snapshot::Tree(tree).write(&path, true).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"IsDir\": true"));
    assert!(text.contains("\"SizeHuman\": \"1.00 KB\""));
    assert!(text.contains("\"FileType\": \"text\""));
}

proptest! {
    #[test]
    fn prop_assembled_tree_satisfies_aggregates(
        files in prop::collection::vec((0usize..4, 0u64..1_000_000), 0..40),
        seed in any::<u64>(),
    ) {
        let mut flat = records(&files);
        // Deterministic reordering so assembly sees arbitrary input order.
        let len = flat.len();
        for i in 0..len {
            let j = (seed.wrapping_mul(i as u64 + 1).rotate_left(7) % len as u64) as usize;
            flat.swap(i, j);
        }

        let mut root = assemble(flat);
        aggregate(&mut root);

        let expected: u64 = files.iter().map(|(_, size)| size).sum();
        prop_assert_eq!(root.size_bytes, expected);
        prop_assert_eq!(root.count_files(), files.len());
        check_aggregates(&root);
    }

    #[test]
    fn prop_flatten_then_assemble_is_identity(
        files in prop::collection::vec((0usize..4, 0u64..10_000), 1..30),
    ) {
        let mut tree = assemble(records(&files));
        aggregate(&mut tree);

        let flat = flatten(&tree);
        prop_assert_eq!(flat.len(), files.len() + 5);

        let mut rebuilt = assemble(flat);
        aggregate(&mut rebuilt);
        prop_assert_eq!(rebuilt, tree);
    }
}
