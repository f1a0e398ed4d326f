//! # 表层
//!
//! 定长目录项表和只追加的数据区：槽位分配、数据追加、子项链表的挂接与摘除。
//!
//! - 分配槽位是线性扫描，没有空闲链表；
//! - 数据区只增不减，删除文件不会回收其字节，直到重新格式化；
//! - 子项挂在链表头部，所以 `ls` 的顺序是最近创建的在前。

use alloc::vec;
use alloc::vec::Vec;

use vfs::{DirEntryType, Error};

use crate::layout::{Entry, EntryId};
use crate::{DATA_SIZE, MAX_ENTRIES, Result};

/// 整个文件系统镜像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub(crate) root: EntryId,
    /// 仅供参考，遍历时以 `used` 为准
    pub(crate) entry_count: u32,
    /// 数据区追加游标
    pub(crate) next_data_offset: u32,
    pub(crate) disk_backed: bool,
    pub(crate) entries: Vec<Entry>,
    pub(crate) data: Vec<u8>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// 格式化：只有根目录的空表
    pub fn new() -> Self {
        let mut entries = vec![Entry::default(); MAX_ENTRIES];
        entries[0] = Entry::root();

        Self {
            root: EntryId::new(0),
            entry_count: 1,
            next_data_offset: 0,
            disk_backed: false,
            entries,
            data: vec![0; DATA_SIZE],
        }
    }

    #[inline]
    pub fn root(&self) -> EntryId {
        self.root
    }

    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[inline]
    pub fn next_data_offset(&self) -> u32 {
        self.next_data_offset
    }

    #[inline]
    pub fn is_disk_backed(&self) -> bool {
        self.disk_backed
    }

    /// 取出仍在使用中的目录项
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.index()).filter(|entry| entry.used)
    }

    #[inline]
    pub(crate) fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    #[inline]
    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.index()]
    }

    /// 找到第一个空闲槽位，不会占用它
    pub fn allocate_slot(&self) -> Result<EntryId> {
        self.entries
            .iter()
            .position(|entry| !entry.used)
            .map(|index| EntryId::new(index as u32))
            .ok_or(Error::CapacityExceeded)
    }

    /// 数据区剩余空间是否放得下 `len` 字节
    #[inline]
    pub fn has_room(&self, len: usize) -> bool {
        self.next_data_offset as usize + len <= self.data.len()
    }

    /// 追加到数据区，返回起始偏移
    pub fn append_data(&mut self, bytes: &[u8]) -> Result<u32> {
        if !self.has_room(bytes.len()) {
            return Err(Error::OutOfSpace);
        }

        let offset = self.next_data_offset;
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.next_data_offset += bytes.len() as u32;
        log::trace!("append {} bytes at {offset}", bytes.len());

        Ok(offset)
    }

    /// 写入新目录项并计数
    pub(crate) fn occupy(&mut self, id: EntryId, entry: Entry) {
        debug_assert!(!self.entry(id).used);
        *self.entry_mut(id) = entry;
        self.entry_count += 1;
    }

    /// 标记槽位空闲，其它字段保持原样
    pub(crate) fn release(&mut self, id: EntryId) {
        self.entry_mut(id).used = false;
        self.entry_count -= 1;
    }

    /// 把 `child` 插到 `parent` 子项链表的头部
    pub fn link_child(&mut self, parent: EntryId, child: EntryId) {
        let head = self.entry(parent).first_child;
        let entry = self.entry_mut(child);
        entry.parent = Some(parent);
        entry.next_sibling = head;

        let dir = self.entry_mut(parent);
        dir.first_child = Some(child);
        dir.size += 1;
        log::debug!("link {child} under {parent}");
    }

    /// 从 `parent` 的子项链表中摘除 `child`
    pub fn unlink_child(&mut self, parent: EntryId, child: EntryId) {
        let next = self.entry(child).next_sibling;

        if self.entry(parent).first_child == Some(child) {
            self.entry_mut(parent).first_child = next;
        } else {
            let Some(prev) = self
                .children(parent)
                .find(|&id| self.entry(id).next_sibling == Some(child))
            else {
                log::warn!("{child} is not a child of {parent}");
                return;
            };
            self.entry_mut(prev).next_sibling = next;
        }

        let dir = self.entry_mut(parent);
        dir.size -= 1;
        self.entry_mut(child).next_sibling = None;
        log::debug!("unlink {child} from {parent}");
    }

    /// 按链表顺序遍历目录的子项
    pub fn children(&self, dir: EntryId) -> Children<'_> {
        Children {
            table: self,
            next: self.entry(dir).first_child,
        }
    }

    pub fn find_child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        self.children(dir).find(|&id| self.entry(id).name() == name)
    }

    /// 文件内容
    pub fn data_of(&self, id: EntryId) -> &[u8] {
        let entry = self.entry(id);
        let start = entry.data_offset as usize;
        &self.data[start..start + entry.size as usize]
    }

    /// 检查表的结构，用于加载磁盘镜像之后
    ///
    /// - 根是使用中的目录且没有父目录；
    /// - 子项链表有限长、只含使用中的项、父指针一致、名字不重复，目录大小等于子项数；
    /// - 其余使用中的项都恰好出现在其父目录的链表里一次；
    /// - 文件内容不越过数据区。
    pub fn check(&self) -> Result<()> {
        let corrupt = |why: &str| {
            log::warn!("corrupt image: {why}");
            Err(Error::CorruptImage)
        };

        if self.entries.len() != MAX_ENTRIES || self.data.len() != DATA_SIZE {
            return corrupt("table geometry");
        }
        if self.next_data_offset as usize > DATA_SIZE {
            return corrupt("data cursor past the arena");
        }
        let in_range = |id: Option<EntryId>| id.is_none_or(|id| id.index() < MAX_ENTRIES);

        match self.get(self.root) {
            Some(root) if root.is_dir() && root.parent.is_none() => (),
            _ => return corrupt("bad root"),
        }

        let mut seen = vec![false; MAX_ENTRIES];
        seen[self.root.index()] = true;
        let mut stack = vec![self.root];
        while let Some(dir) = stack.pop() {
            let mut names: Vec<&str> = Vec::new();
            let mut next = self.entry(dir).first_child;
            let mut count = 0;
            while let Some(id) = next {
                if !in_range(Some(id)) || seen[id.index()] {
                    return corrupt("child list out of range or cyclic");
                }
                let entry = self.entry(id);
                if !entry.used || entry.parent != Some(dir) || !entry.name_is_valid() {
                    return corrupt("bad child");
                }
                if names.contains(&entry.name()) {
                    return corrupt("duplicate sibling name");
                }
                if !in_range(entry.first_child) || !in_range(entry.next_sibling) {
                    return corrupt("link out of range");
                }
                match entry.kind {
                    DirEntryType::Directory => stack.push(id),
                    DirEntryType::Regular => {
                        if entry.data_offset as usize + entry.size as usize > DATA_SIZE {
                            return corrupt("file past the arena");
                        }
                    }
                }
                names.push(entry.name());
                seen[id.index()] = true;
                count += 1;
                next = entry.next_sibling;
            }
            if self.entry(dir).size != count {
                return corrupt("directory size mismatch");
            }
        }

        let used = self.entries.iter().filter(|entry| entry.used).count();
        let reachable = seen.iter().filter(|&&seen| seen).count();
        if used != reachable {
            return corrupt("unreachable entries");
        }

        Ok(())
    }
}

pub struct Children<'a> {
    table: &'a Table,
    next: Option<EntryId>,
}

impl Iterator for Children<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.next?;
            let entry = self.table.entry(id);
            self.next = entry.next_sibling;
            if entry.used {
                return Some(id);
            }
        }
    }
}
