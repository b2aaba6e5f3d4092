use fsjson_analyze::{
    DuplicateFinder, MergeError, MergeOptions, Merger, OutputShape, Page, SearchQuery,
    merge_directories, merge_roots, search,
};
use fsjson_core::{Category, Node, Snapshot, WarningKind};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn dir(name: &str, children: Vec<Node>) -> Node {
    Node::new_directory(name).with_children(children)
}

fn file(name: &str, size: u64) -> Node {
    Node::new_file(name, size)
}

fn find<'a>(node: &'a Node, name: &str) -> &'a Node {
    node.iter().find(|n| n.name == name).unwrap()
}

#[test]
fn test_two_roots_without_dedupe() {
    let merged = merge_roots(
        vec![
            dir("dirA", vec![file("file1.txt", 100)]),
            dir("dirB", vec![file("file2.txt", 200)]),
        ],
        false,
    );
    assert_eq!(merged.name, "dirA+dirB");
    assert_eq!(merged.child_count, 2);
    assert_eq!(merged.size_bytes, 300);
    assert_eq!(merged.category, Category::Merged);
}

#[test]
fn test_deep_shared_directory() {
    let side = |unique: &str| {
        dir(
            "root",
            vec![dir(
                "level1",
                vec![dir(
                    "shared_dir",
                    vec![file("same.txt", 100), file(unique, 50)],
                )],
            )],
        )
    };

    let plain = merge_roots(vec![side("one.txt"), side("two.txt")], false);
    let shared = find(&plain, "shared_dir");
    assert_eq!(shared.child_count, 4);
    assert_eq!(shared.size_bytes, 300);
    assert_eq!(find(&plain, "level1").size_bytes, 300);

    let deduped = merge_roots(vec![side("one.txt"), side("two.txt")], true);
    let shared = find(&deduped, "shared_dir");
    assert_eq!(shared.child_count, 3);
    assert_eq!(shared.size_bytes, 200);
    assert_eq!(deduped.size_bytes, 200);
}

fn write(temp: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = temp.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_merge_files_skips_bad_inputs() {
    let temp = TempDir::new().unwrap();
    let flat = write(
        &temp,
        "flat.json",
        r#"[{"IsDir":true,"FullName":"a","FullPath":"/a","FullPathOrig":"/a"},
            {"FullName":"x.txt","FullPath":"/a/x.txt","FullPathOrig":"/a/x.txt","ParentDir":"/a","SizeBytes":4,"Md5":"h1"}]"#,
    );
    let tree = write(
        &temp,
        "tree.json",
        r#"{"IsDir":true,"FullName":"b","FullPath":"/b","Children":[
            {"FullName":"y.txt","FullPath":"/b/y.txt","FullPathOrig":"/b/y.txt","SizeBytes":6,"Md5":"h1"}]}"#,
    );
    let broken = write(&temp, "broken.json", "{ not json");
    let missing = temp.path().join("missing.json");

    let outcome = Merger::default()
        .merge_files(&[&flat, &broken, &tree, &missing])
        .unwrap();
    assert_eq!(outcome.merged_inputs, 2);
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(outcome.warnings[0].kind, WarningKind::FormatError);
    assert_eq!(outcome.warnings[1].kind, WarningKind::ReadError);
    assert_eq!(outcome.tree.name, "a+b");
    assert_eq!(outcome.tree.size_bytes, 10);

    let report = DuplicateFinder::new().find_duplicates(&outcome.tree);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].paths, ["/a/x.txt", "/b/y.txt"]);
}

#[test]
fn test_merge_files_with_no_usable_input() {
    let temp = TempDir::new().unwrap();
    let empty = write(&temp, "empty.json", "[]");
    let err = Merger::default().merge_files(&[empty]).unwrap_err();
    assert!(matches!(err, MergeError::NoUsableInputs { attempted: 1 }));
}

#[test]
fn test_merge_to_file_shapes() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.json");
    let b = temp.path().join("b.json");
    Snapshot::Tree(dir("a", vec![file("f.txt", 1)])).write(&a, false).unwrap();
    Snapshot::Tree(dir("b", vec![file("f.txt", 2)])).write(&b, false).unwrap();

    let out = temp.path().join("merged.json");
    let options = MergeOptions::builder()
        .dedupe(true)
        .pretty(true)
        .build()
        .unwrap();
    Merger::new(options).merge_to_file(&[&a, &b], &out).unwrap();
    let merged = Snapshot::read(&out).unwrap().into_tree();
    assert_eq!(merged.name, "a+b");
    assert_eq!(merged.count_files(), 1);

    let flat_out = temp.path().join("merged-flat.json");
    let options = MergeOptions::builder()
        .shape(OutputShape::Flat)
        .build()
        .unwrap();
    Merger::new(options).merge_to_file(&[&a, &b], &flat_out).unwrap();
    match Snapshot::read(&flat_out).unwrap() {
        Snapshot::Flat(records) => assert_eq!(records.len(), 4),
        Snapshot::Tree(_) => panic!("expected flat output"),
    }
}

#[test]
fn test_search_over_merged_tree() {
    let mut a = dir("a", vec![file("x.png", 10), file("y.md", 20)]);
    a.full_path = "/a".into();
    for child in &mut a.children {
        child.full_path = format!("/a/{}", child.name);
        child.full_path_orig = child.full_path.clone();
    }
    let merged = merge_roots(vec![a, dir("b", vec![file("z.png", 30)])], false);

    let query = SearchQuery {
        page: Page::new(0, 1),
        ..SearchQuery::builder()
            .start_path("/a")
            .build()
            .unwrap()
    };
    let page = search(&merged, &query);
    assert_eq!(page.total, 2);
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].full_path_orig, "/a/x.png");
}

fn arb_tree(prefix: &'static str) -> impl Strategy<Value = Node> {
    prop::collection::vec((0usize..3, 0usize..6, 0u64..1000), 0..20).prop_map(move |files| {
        let mut subdirs: Vec<Node> = (0..3).map(|i| Node::new_directory(format!("d{i}"))).collect();
        for (i, (d, n, size)) in files.into_iter().enumerate() {
            let name = if i % 2 == 0 {
                format!("shared{n}.bin")
            } else {
                format!("{prefix}{i}.bin")
            };
            subdirs[d].children.push(Node::new_file(name, size));
        }
        let subdirs = subdirs.into_iter().map(|mut d| {
            let kids = std::mem::take(&mut d.children);
            d.with_children(kids)
        });
        Node::new_directory(prefix).with_children(subdirs.collect())
    })
}

proptest! {
    #[test]
    fn prop_merge_without_dedupe_keeps_every_file(a in arb_tree("left"), b in arb_tree("right")) {
        let expected = a.count_files() + b.count_files();
        let size = a.size_bytes + b.size_bytes;
        let merged = merge_directories(a, b, false);
        prop_assert_eq!(merged.count_files(), expected);
        prop_assert_eq!(merged.size_bytes, size);
    }

    #[test]
    fn prop_dedupe_never_grows(a in arb_tree("left"), b in arb_tree("right")) {
        let bound = a.count_files() + b.count_files();
        let merged = merge_directories(a, b, true);
        prop_assert!(merged.count_files() <= bound);
        for d in merged.iter().filter(|n| n.is_dir) {
            let mut names: Vec<_> = d.children.iter().filter(|c| c.is_file()).map(|c| &c.name).collect();
            let before = names.len();
            names.sort();
            names.dedup();
            prop_assert_eq!(names.len(), before);
        }
    }

    #[test]
    fn prop_root_merge_size_commutes(a in arb_tree("left"), b in arb_tree("right")) {
        let ab = merge_roots(vec![a.clone(), b.clone()], false);
        let ba = merge_roots(vec![b, a], false);
        prop_assert_eq!(ab.size_bytes, ba.size_bytes);
        prop_assert_eq!(ab.count_files(), ba.count_files());
    }

    #[test]
    fn prop_pages_partition_matches(offset in 0usize..40, limit in -3i64..10) {
        let root = dir("r", (0..25).map(|i| file(&format!("f{i}"), i)).collect());
        let page = search(&root, &SearchQuery { page: Page::new(offset, limit), ..SearchQuery::default() });
        prop_assert_eq!(page.total, 26);
        let remaining = 26usize.saturating_sub(offset);
        let expected = if limit > 0 { remaining.min(limit as usize) } else { remaining };
        prop_assert_eq!(page.results.len(), expected);
        prop_assert_eq!(page.stats.values().sum::<usize>(), expected);
    }
}
