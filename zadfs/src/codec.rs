//! # 持久化层
//!
//! 整个镜像按固定字段、小端序编码成一段字节，切成扇区后依次写到
//! [`BASE_SECTOR`] 开始的连续扇区；加载时反过来读回并校验。
//!
//! 每次保存都重写整个镜像，没有增量也没有原子性：写到一半断电会留下损坏的镜像，
//! 只能靠魔数、版本和结构检查发现。
//!
//! ```text
//! 头部  (21B)  magic u32 | version u32 | root u32 | entry_count u32 | next_data_offset u32 | disk_backed u8
//! 目录项 (54B) × MAX_ENTRIES
//!              name [u8; 32] | kind u8 | used u8 | size u32 | data_offset u32
//!              | parent u32 | first_child u32 | next_sibling u32      (u32::MAX 表示无)
//! 数据区 (DATA_SIZE)
//! ```

use alloc::vec;
use alloc::vec::Vec;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use block_dev::{BLOCK_SIZE, BlockDevice};
use vfs::{DirEntryType, Error};

use crate::layout::{Entry, EntryId};
use crate::table::Table;
use crate::{
    BASE_SECTOR, DATA_SIZE, IMAGE_SECTORS, IMAGE_SIZE, MAGIC, MAX_ENTRIES, NAME_MAX_LEN, VERSION,
};

pub const HEADER_SIZE: usize = 21;
pub const ENTRY_SIZE: usize = NAME_MAX_LEN + 1 + 2 + 5 * 4;

/// 链接字段中表示“无”的值
const NIL: u32 = u32::MAX;

#[derive(Debug, BinRead, BinWrite)]
#[brw(little)]
struct RawHeader {
    magic: u32,
    version: u32,
    root: u32,
    entry_count: u32,
    next_data_offset: u32,
    disk_backed: u8,
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(little)]
struct RawEntry {
    name: [u8; NAME_MAX_LEN + 1],
    kind: u8,
    used: u8,
    size: u32,
    data_offset: u32,
    parent: u32,
    first_child: u32,
    next_sibling: u32,
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(little)]
struct RawImage {
    header: RawHeader,
    #[br(count = MAX_ENTRIES)]
    entries: Vec<RawEntry>,
    #[br(count = DATA_SIZE)]
    data: Vec<u8>,
}

#[inline]
fn to_raw_link(id: Option<EntryId>) -> u32 {
    id.map_or(NIL, u32::from)
}

#[inline]
fn from_raw_link(raw: u32) -> Option<EntryId> {
    (raw != NIL).then_some(EntryId::new(raw))
}

impl From<&Entry> for RawEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            name: *entry.raw_name(),
            kind: entry.kind as u8,
            used: entry.used as u8,
            size: entry.size,
            data_offset: entry.data_offset,
            parent: to_raw_link(entry.parent),
            first_child: to_raw_link(entry.first_child),
            next_sibling: to_raw_link(entry.next_sibling),
        }
    }
}

impl TryFrom<RawEntry> for Entry {
    type Error = Error;

    fn try_from(raw: RawEntry) -> crate::Result<Self> {
        let used = raw.used != 0;
        let kind = match raw.kind {
            0 => DirEntryType::Regular,
            1 => DirEntryType::Directory,
            // 空闲槽位里的旧值不可信，也不需要
            _ if !used => DirEntryType::default(),
            other => {
                log::warn!("corrupt image: unknown entry kind {other}");
                return Err(Error::CorruptImage);
            }
        };

        let mut entry = Entry::from_raw_name(raw.name);
        entry.kind = kind;
        entry.used = used;
        entry.size = raw.size;
        entry.data_offset = raw.data_offset;
        entry.parent = from_raw_link(raw.parent);
        entry.first_child = from_raw_link(raw.first_child);
        entry.next_sibling = from_raw_link(raw.next_sibling);

        Ok(entry)
    }
}

/// 编码整个镜像，长度恒为 [`IMAGE_SIZE`]；表的尺寸不对时返回 [`Error::CorruptImage`]
pub fn encode(table: &Table) -> crate::Result<Vec<u8>> {
    let raw = RawImage {
        header: RawHeader {
            magic: MAGIC,
            version: VERSION,
            root: table.root.into(),
            entry_count: table.entry_count,
            next_data_offset: table.next_data_offset,
            disk_backed: table.disk_backed as u8,
        },
        entries: table.entries.iter().map(RawEntry::from).collect(),
        data: table.data.clone(),
    };

    let mut bytes = vec![0u8; IMAGE_SIZE];
    let mut cursor = Cursor::new(&mut bytes[..]);
    raw.write(&mut cursor).map_err(|err| {
        log::error!("encode: {err:?}");
        Error::CorruptImage
    })?;
    if cursor.position() != IMAGE_SIZE as u64 {
        log::error!("encode: wrote {} of {IMAGE_SIZE} bytes", cursor.position());
        return Err(Error::CorruptImage);
    }

    Ok(bytes)
}

/// 解码并校验镜像
pub fn decode(bytes: &[u8]) -> crate::Result<Table> {
    let magic = bytes
        .first_chunk::<4>()
        .map(|magic| u32::from_le_bytes(*magic));
    if magic != Some(MAGIC) {
        log::warn!("corrupt image: bad magic {magic:x?}");
        return Err(Error::CorruptImage);
    }

    let raw = RawImage::read(&mut Cursor::new(bytes)).map_err(|err| {
        log::warn!("corrupt image: {err:?}");
        Error::CorruptImage
    })?;
    if raw.header.version != VERSION {
        log::warn!(
            "corrupt image: version {} (expected {VERSION})",
            raw.header.version
        );
        return Err(Error::CorruptImage);
    }

    let entries = raw
        .entries
        .into_iter()
        .map(Entry::try_from)
        .collect::<crate::Result<Vec<_>>>()?;
    let table = Table {
        root: EntryId::new(raw.header.root),
        entry_count: raw.header.entry_count,
        next_data_offset: raw.header.next_data_offset,
        disk_backed: raw.header.disk_backed != 0,
        entries,
        data: raw.data,
    };
    table.check()?;

    Ok(table)
}

/// 把镜像写到块设备，最后一个扇区不足部分补零
pub fn save(table: &Table, device: &dyn BlockDevice) -> crate::Result<()> {
    let bytes = encode(table)?;
    for (i, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        device.write_block(BASE_SECTOR + i, &block)?;
    }
    log::info!(
        "saved image: {IMAGE_SECTORS} sectors from sector {BASE_SECTOR}, {} entries",
        table.entry_count
    );

    Ok(())
}

/// 从块设备读回镜像
pub fn load(device: &dyn BlockDevice) -> crate::Result<Table> {
    let mut bytes = vec![0u8; IMAGE_SECTORS * BLOCK_SIZE];
    for (i, block) in bytes.chunks_mut(BLOCK_SIZE).enumerate() {
        device.read_block(BASE_SECTOR + i, block)?;
    }

    let table = decode(&bytes[..IMAGE_SIZE])?;
    log::info!("loaded image: {} entries", table.entry_count);

    Ok(table)
}
