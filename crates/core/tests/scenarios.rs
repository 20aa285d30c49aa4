use karyfs_core::*;
use pretty_assertions::assert_eq;
use rstest::*;

#[fixture]
fn small() -> FileSystemTree {
    FileSystemTree::new(Limits::new(5, 1000)).unwrap()
}

fn sum_of_files(tree: &FileSystemTree) -> u64 {
    let arena = tree.arena();
    arena
        .preorder(tree.root_id())
        .into_iter()
        .map(|id| arena[id].size())
        .sum()
}

#[rstest]
fn sixth_child_fails_and_listing_stays_at_five(mut small: FileSystemTree) {
    small.mkdir("box").unwrap();
    small.cd("box").unwrap();
    for i in 1..=5 {
        small.touch(&format!("f{i}"), 1, None).unwrap();
    }
    let err = small.touch("f6", 1, None).unwrap_err();
    assert!(matches!(err, FsError::CapacityExceeded { limit: 5, .. }));
    assert_eq!(small.ls(), vec!["f1", "f2", "f3", "f4", "f5"]);
}

#[rstest]
fn quota_scenario(mut small: FileSystemTree) {
    small.touch("a", 600, None).unwrap();
    assert_eq!(small.get_disk_usage(), 600);
    assert!(matches!(small.touch("b", 500, None), Err(FsError::QuotaExceeded { .. })));
    assert_eq!(small.get_disk_usage(), 600);
}

#[rstest]
fn file_cannot_shadow_directory(mut small: FileSystemTree) {
    small.mkdir("x").unwrap();
    assert!(matches!(small.touch("x", 10, None), Err(FsError::NameCollision { .. })));
}

#[rstest]
fn restore_after_name_reuse_gets_suffix(mut small: FileSystemTree) {
    small.touch("f", 50, None).unwrap();
    small.rm("f", true).unwrap();
    small.touch("f", 20, None).unwrap();
    let restored = small.restore("f", None).unwrap();

    assert_eq!(small.node(restored).unwrap().name, "f_1");
    assert_eq!(small.node(restored).unwrap().size(), 50);
    assert_eq!(small.ls(), vec![".trash", "f", "f_1"]);
    assert_eq!(small.get_disk_usage(), 70);
}

#[rstest]
fn trash_round_trip_restores_children(mut small: FileSystemTree) {
    small.mkdir("proj").unwrap();
    small.cd("proj").unwrap();
    small.mkdir("src").unwrap();
    small.cd("src").unwrap();
    small.touch("lib.rs", 30, None).unwrap();
    small.touch("main.rs", 12, None).unwrap();
    small.cd("..").unwrap();

    let before = small.stat("src").unwrap().children;
    small.rm("src", true).unwrap();
    assert!(small.ls().is_empty());
    let id = small.restore("src", None).unwrap();

    assert_eq!(small.path_of(id).unwrap(), "/proj/src");
    assert_eq!(small.stat("src").unwrap().children, before);
    assert_eq!(small.stat("src").unwrap().size, 42);
    small.check_consistency().unwrap();
}

#[rstest]
fn paths_follow_moves(mut small: FileSystemTree) {
    small.mkdir("a").unwrap();
    small.cd("a").unwrap();
    let f = small.touch("f", 1, None).unwrap();
    assert_eq!(small.path_of(f).unwrap(), "/a/f");
    small.rm("f", true).unwrap();
    assert_eq!(small.path_of(f).unwrap(), "/.trash/f");
    small.cd("..").unwrap();
    let dest = small.mkdir("b").unwrap();
    small.restore("f", Some(dest)).unwrap();
    assert_eq!(small.path_of(f).unwrap(), "/b/f");
}

#[rstest]
fn copy_is_isolated_from_source(mut small: FileSystemTree) {
    let dir = small.mkdir("d").unwrap();
    small.cd("d").unwrap();
    small.touch_with("note", "abc").unwrap();
    small.mkdir("sub").unwrap();
    small.cd("..").unwrap();

    let copy = small.copy_node(dir, None).unwrap();
    assert_eq!(small.node(copy).unwrap().name, "d - Copy");
    assert_eq!(small.get_disk_usage(), 6);

    small.cd("d - Copy").unwrap();
    small.edit("note", "abcdef").unwrap();
    small.rm("sub", false).unwrap();
    small.cd("..").unwrap();
    small.cd("d").unwrap();
    assert_eq!(small.cat("note").unwrap(), Some(&Content::from("abc")));
    assert_eq!(small.ls(), vec!["note", "sub"]);

    small.edit("note", "a").unwrap();
    small.cd("..").unwrap();
    small.cd("d - Copy").unwrap();
    assert_eq!(small.cat("note").unwrap(), Some(&Content::from("abcdef")));

    assert_eq!(small.get_disk_usage(), sum_of_files(&small));
    small.check_consistency().unwrap();
}

#[rstest]
fn copy_gets_fresh_timestamps(mut small: FileSystemTree) {
    let f = small.touch("f", 1, None).unwrap();
    let original = small.node(f).unwrap().created;
    let copy = small.copy_node(f, None).unwrap();
    assert!(small.node(copy).unwrap().created >= original);
    assert_ne!(copy, f);
}

#[rstest]
fn search_then_jump_to_folder(mut small: FileSystemTree) {
    small.mkdir("music").unwrap();
    small.cd("music").unwrap();
    small.touch("Song.mp3", 3, None).unwrap();
    small.cd("..").unwrap();

    let hits = small.search("song", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/music/Song.mp3");

    let folder = small.node(hits[0].id).unwrap().parent.unwrap();
    small.cd_to(folder).unwrap();
    assert_eq!(small.cwd_path(), "/music");
}
