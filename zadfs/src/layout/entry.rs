use core::str;

use derive_more::{Display, From, Into};
use vfs::{DirEntryType, Error};

use crate::NAME_MAX_LEN;

/// 目录项在表中的下标
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct EntryId(u32);

impl EntryId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 一个文件或目录
///
/// `used` 为假时该槽位空闲，其余字段可能是删除前留下的旧值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    pub(crate) kind: DirEntryType,
    /// 文件为字节数，目录为子项个数
    pub(crate) size: u32,
    /// 文件内容在数据区中的起点
    pub(crate) data_offset: u32,
    pub(crate) parent: Option<EntryId>,
    pub(crate) first_child: Option<EntryId>,
    pub(crate) next_sibling: Option<EntryId>,
    pub(crate) used: bool,
}

impl Entry {
    /// `name` 须已通过 [`check_name`]
    pub(crate) fn new(name: &str, kind: DirEntryType, parent: EntryId) -> Self {
        let mut entry = Self {
            kind,
            parent: Some(parent),
            used: true,
            ..Self::default()
        };
        entry.set_name(name);
        entry
    }

    pub(crate) fn root() -> Self {
        Self {
            kind: DirEntryType::Directory,
            used: true,
            ..Self::default()
        }
    }

    pub(crate) fn from_raw_name(name: [u8; NAME_MAX_LEN + 1]) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        self.name = [0; NAME_MAX_LEN + 1];
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN);
        str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub(crate) fn raw_name(&self) -> &[u8; NAME_MAX_LEN + 1] {
        &self.name
    }

    /// 名字是否以 `\0` 结尾且为合法 UTF-8
    pub(crate) fn name_is_valid(&self) -> bool {
        self.name
            .iter()
            .position(|&c| c == 0)
            .is_some_and(|len| str::from_utf8(&self.name[..len]).is_ok())
    }

    #[inline]
    pub fn kind(&self) -> DirEntryType {
        self.kind
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == DirEntryType::Directory
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn data_offset(&self) -> u32 {
        self.data_offset
    }

    #[inline]
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.used
    }
}

/// 新建目录项时检查名字
pub(crate) fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty()
        || name.len() > NAME_MAX_LEN
        || name == "."
        || name == ".."
        || name.contains(['/', '\0'])
    {
        return Err(Error::InvalidPath);
    }
    Ok(())
}
