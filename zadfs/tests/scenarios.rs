use zadfs::{DATA_SIZE, Error, ZadFs};

fn names(fs: &ZadFs, path: &str) -> Vec<String> {
    fs.list(Some(path), fs.root())
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

#[test]
fn docs_walkthrough() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    let docs = fs.make_directory("/docs", root).unwrap();
    fs.create_file("/docs/a.txt", b"hello", root).unwrap();
    assert_eq!(fs.resolve("/docs", root), Ok(docs));
    assert_eq!(names(&fs, "/docs"), ["a.txt"]);
    assert_eq!(fs.read_file("/docs/a.txt", root).unwrap(), b"hello");

    fs.remove("/docs/a.txt", root).unwrap();
    fs.remove_dir("/docs", root).unwrap();
    assert!(names(&fs, "/").is_empty());
    assert_eq!(fs.resolve("/docs", root), Err(Error::NotFound));
}

#[test]
fn duplicate_touch_keeps_original() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    fs.create_file("/x.txt", b"one", root).unwrap();
    let before = fs.usage();
    assert_eq!(
        fs.create_file("/x.txt", b"two", root),
        Err(Error::AlreadyExists)
    );
    assert_eq!(fs.read_file("/x.txt", root).unwrap(), b"one");
    assert_eq!(fs.usage(), before);

    // 复制到已存在的名字与新建一样失败
    fs.create_file("/y.txt", b"three", root).unwrap();
    assert_eq!(fs.copy("/y.txt", "/x.txt", root), Err(Error::AlreadyExists));
    assert_eq!(fs.read_file("/x.txt", root).unwrap(), b"one");
}

#[test]
fn arena_exhaustion_leaves_nothing_behind() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    let chunk = vec![b'z'; 1000];
    for i in 0..4 {
        fs.create_file(&format!("/f{i}"), &chunk, root).unwrap();
    }
    let before = fs.usage();
    assert_eq!(before.data_used, 4000);

    assert_eq!(
        fs.create_file("/big", &chunk, root),
        Err(Error::OutOfSpace)
    );
    assert_eq!(fs.usage(), before);
    assert_eq!(fs.resolve("/big", root), Err(Error::NotFound));

    // 刚好填满仍然可以
    let rest = vec![b'r'; DATA_SIZE - 4000];
    fs.create_file("/rest", &rest, root).unwrap();
    assert_eq!(fs.read_file("/rest", root).unwrap(), rest);
    fs.create_file("/empty", b"", root).unwrap();
    assert_eq!(fs.create_file("/one", b"1", root), Err(Error::OutOfSpace));
}

#[test]
fn removed_slot_is_reused_but_arena_is_not() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    let a = fs.create_file("/a", b"abcdef", root).unwrap();
    fs.create_file("/b", b"gh", root).unwrap();
    fs.remove("/a", root).unwrap();
    assert_eq!(fs.resolve("/a", root), Err(Error::NotFound));
    assert_eq!(fs.usage().entries, 2);
    assert_eq!(fs.usage().data_used, 8);

    let c = fs.make_directory("/c", root).unwrap();
    assert_eq!(c, a);
    assert_eq!(fs.usage().data_used, 8);
    assert_eq!(fs.read_file("/b", root).unwrap(), b"gh");
}

#[test]
fn non_empty_directory_stays() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    let d = fs.make_directory("/d", root).unwrap();
    let e = fs.make_directory("/d/e", root).unwrap();
    let f = fs.create_file("/d/e/f", b"deep", root).unwrap();

    assert_eq!(fs.remove("/d", root), Err(Error::DirectoryNotEmpty));
    assert_eq!(fs.remove_dir("/d/e", root), Err(Error::DirectoryNotEmpty));
    assert_eq!(fs.resolve("/d", root), Ok(d));
    assert_eq!(fs.resolve("/d/e", root), Ok(e));
    assert_eq!(fs.resolve("/d/e/f", root), Ok(f));
    assert_eq!(fs.entry(d).unwrap().size(), 1);
}

#[test]
fn listing_is_most_recent_first() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    for name in ["first", "second", "third"] {
        fs.make_directory(name, root).unwrap();
    }
    assert_eq!(names(&fs, "/"), ["third", "second", "first"]);
}

#[test]
fn handles_are_stable() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    let a = fs.make_directory("/a", root).unwrap();
    let b = fs.make_directory("/a/b", root).unwrap();
    fs.create_file("/a/b/x", b"1", root).unwrap();
    fs.make_directory("/z", root).unwrap();
    fs.remove("/z", root).unwrap();

    assert_eq!(fs.resolve("/a", root), Ok(a));
    assert_eq!(fs.resolve("/a/b", root), Ok(b));
    assert_eq!(fs.resolve("/a/b/", root), Ok(b));
    assert_eq!(fs.resolve("b", a), Ok(b));
}

#[test]
fn copy_duplicates_bytes() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();

    fs.make_directory("/bak", root).unwrap();
    fs.create_file("/src", b"payload", root).unwrap();
    fs.copy("/src", "/bak/src", root).unwrap();

    assert_eq!(fs.read_file("/bak/src", root).unwrap(), b"payload");
    assert_eq!(fs.usage().data_used, 14);
    assert_eq!(fs.copy("/nope", "/x", root), Err(Error::NotFound));
}
