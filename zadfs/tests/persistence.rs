use std::sync::Arc;

use block_dev::{BlockError, RamDisk};
use zadfs::{BlockDevice, Error, IMAGE_SECTORS, LoadOutcome, ZadFs};

fn disk() -> Arc<RamDisk> {
    Arc::new(RamDisk::new(IMAGE_SECTORS))
}

/// 以路径与内容描述整棵树，顺序与 `list` 一致
fn snapshot(fs: &ZadFs) -> Vec<(String, Option<Vec<u8>>)> {
    let root = fs.root();
    let mut out = Vec::new();
    let mut stack = vec![String::from("/")];
    while let Some(dir) = stack.pop() {
        for entry in fs.list(Some(&dir), root).unwrap() {
            let path = if dir == "/" {
                format!("/{}", entry.name)
            } else {
                format!("{dir}/{}", entry.name)
            };
            if entry.is_dir() {
                stack.push(path.clone());
                out.push((path, None));
            } else {
                let content = fs.read_file(&path, root).unwrap().to_vec();
                out.push((path, Some(content)));
            }
        }
    }
    out
}

#[test]
fn mutations_are_saved_immediately() {
    let disk = disk();
    let mut fs = ZadFs::format(Some(disk.clone())).unwrap();
    let root = fs.root();
    assert!(fs.is_disk_backed());

    fs.make_directory("/docs", root).unwrap();
    fs.create_file("/docs/a.txt", b"hello", root).unwrap();
    fs.create_file("/top", b"level", root).unwrap();
    fs.remove("/top", root).unwrap();

    // 未显式保存，直接从同一块盘挂载
    let mounted = ZadFs::mount(disk).unwrap();
    assert_eq!(snapshot(&mounted), snapshot(&fs));
    assert_eq!(mounted.usage(), fs.usage());
    assert_eq!(mounted.table(), fs.table());
}

#[test]
fn save_then_load_into_fresh_image() {
    let disk = disk();
    let mut fs = ZadFs::format(Some(disk.clone())).unwrap();
    let root = fs.root();
    fs.make_directory("/a", root).unwrap();
    fs.make_directory("/a/b", root).unwrap();
    fs.create_file("/a/b/c", b"nested", root).unwrap();
    fs.create_file("/a/d", &[0, 1, 2, 255], root).unwrap();
    fs.remove("/a/d", root).unwrap();
    fs.create_file("/a/d", b"again", root).unwrap();
    fs.save().unwrap();

    let other = self::disk();
    let mut fresh = ZadFs::format(Some(other.clone())).unwrap();
    let mut sector = [0u8; zadfs::BLOCK_SIZE];
    for block_id in 0..IMAGE_SECTORS {
        disk.read_block(block_id, &mut sector).unwrap();
        other.write_block(block_id, &sector).unwrap();
    }

    assert_eq!(fresh.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(snapshot(&fresh), snapshot(&fs));
    assert_eq!(fresh.usage(), fs.usage());
}

#[test]
fn blank_disk_is_reformatted() {
    let disk = disk();
    assert_eq!(
        ZadFs::mount(disk.clone()).map(|_| ()),
        Err(Error::CorruptImage)
    );

    let (fs, outcome) = ZadFs::mount_or_format(disk.clone()).unwrap();
    assert_eq!(outcome, LoadOutcome::Reformatted);
    assert!(snapshot(&fs).is_empty());

    // 重新格式化的结果已写回
    let (_, outcome) = ZadFs::mount_or_format(disk).unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
}

#[test]
fn tampered_image_triggers_reformat_on_load() {
    let disk = disk();
    let mut fs = ZadFs::format(Some(disk.clone())).unwrap();
    let root = fs.root();
    fs.create_file("/keep", b"me", root).unwrap();

    let mut sector = [0u8; zadfs::BLOCK_SIZE];
    disk.read_block(0, &mut sector).unwrap();
    sector[0] ^= 0x55;
    disk.write_block(0, &sector).unwrap();

    assert_eq!(fs.load(), Ok(LoadOutcome::Reformatted));
    assert!(snapshot(&fs).is_empty());
    assert_eq!(ZadFs::mount(disk).map(|fs| fs.usage().entries), Ok(1));
}

#[test]
fn device_failure_is_io() {
    let disk = disk();
    let mut fs = ZadFs::format(Some(disk.clone())).unwrap();
    let root = fs.root();

    disk.set_faulty(true);
    assert!(matches!(fs.make_directory("/d", root), Err(Error::Io(_))));
    assert!(matches!(fs.save(), Err(Error::Io(_))));
    assert!(matches!(fs.load(), Err(Error::Io(_))));
    assert!(matches!(
        ZadFs::mount_or_format(disk.clone()),
        Err(Error::Io(_))
    ));

    disk.set_faulty(false);
    assert_eq!(fs.load(), Ok(LoadOutcome::Loaded));
}

#[test]
fn too_small_device() {
    let disk = Arc::new(RamDisk::new(IMAGE_SECTORS - 1));
    assert!(matches!(ZadFs::format(Some(disk)), Err(Error::Io(_))));
}

#[test]
fn ram_only_mode_touches_no_device() {
    let mut fs = ZadFs::format(None).unwrap();
    let root = fs.root();
    fs.make_directory("/d", root).unwrap();
    assert_eq!(fs.save(), Err(Error::NotDiskBacked));
}

#[test]
fn absent_device_is_refused() {
    let disk = disk();
    let mut fs = ZadFs::format(Some(disk.clone())).unwrap();
    let root = fs.root();
    fs.make_directory("/d", root).unwrap();

    disk.set_present(false);
    let absent = Err(Error::Io(BlockError::NotPresent));
    assert_eq!(ZadFs::mount(disk.clone()).map(|_| ()), absent);
    assert_eq!(ZadFs::mount_or_format(disk.clone()).map(|_| ()), absent);
    assert_eq!(ZadFs::format(Some(disk.clone())).map(|_| ()), absent);
    assert_eq!(fs.load(), Err(Error::Io(BlockError::NotPresent)));
    // 探测失败时什么也没写
    assert_eq!(fs.resolve("/d", root).map(|_| ()), Ok(()));

    disk.set_present(true);
    let mounted = ZadFs::mount(disk).unwrap();
    assert_eq!(snapshot(&mounted), snapshot(&fs));
}
