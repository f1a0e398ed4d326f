//! # 操作层
//!
//! [`ZadFs`] 独占整张表，所有操作都通过 `&self`/`&mut self` 进行，
//! 单写者的约束由借用规则保证。
//!
//! 挂了块设备时为磁盘模式：每个修改操作成功后都同步地把整个镜像写回磁盘。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::{BlockDevice, BlockError};
use vfs::{DirEntry, DirEntryType, Error};

use crate::codec;
use crate::layout::{Entry, EntryId, check_name};
use crate::path::Path;
use crate::table::Table;
use crate::{DATA_SIZE, MAX_ENTRIES, Result};

pub struct ZadFs {
    table: Table,
    device: Option<Arc<dyn BlockDevice>>,
}

/// 加载的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// 磁盘上的镜像不合法，已重新格式化并写回
    Reformatted,
}

/// 空间占用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub entries: usize,
    pub max_entries: usize,
    /// 数据区已追加的字节，包括已删除文件留下的
    pub data_used: usize,
    pub data_capacity: usize,
}

impl core::fmt::Debug for ZadFs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ZadFs")
            .field("entries", &self.table.entry_count)
            .field("next_data_offset", &self.table.next_data_offset)
            .field("device", &self.device)
            .finish()
    }
}

impl ZadFs {
    /// 格式化出只有根目录的文件系统；有设备时立即写回
    pub fn format(device: Option<Arc<dyn BlockDevice>>) -> Result<Self> {
        if let Some(device) = &device {
            ensure_present(&**device)?;
        }
        let mut table = Table::new();
        table.disk_backed = device.is_some();
        let fs = Self { table, device };
        fs.commit()?;
        log::info!("formatted (disk backed: {})", fs.is_disk_backed());

        Ok(fs)
    }

    /// 从设备加载；镜像不合法时返回 [`Error::CorruptImage`]
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self> {
        ensure_present(&*device)?;
        let mut table = codec::load(&*device)?;
        table.disk_backed = true;
        log::info!("mounted, {} entries", table.entry_count);

        Ok(Self {
            table,
            device: Some(device),
        })
    }

    /// 加载，镜像不合法则重新格式化
    pub fn mount_or_format(device: Arc<dyn BlockDevice>) -> Result<(Self, LoadOutcome)> {
        match Self::mount(device.clone()) {
            Ok(fs) => Ok((fs, LoadOutcome::Loaded)),
            Err(Error::CorruptImage) => {
                log::warn!("invalid image on disk, formatting");
                Ok((Self::format(Some(device))?, LoadOutcome::Reformatted))
            }
            Err(err) => Err(err),
        }
    }

    /// 丢弃所有内容，保留设备
    pub fn reformat(&mut self) -> Result<()> {
        self.table = Table::new();
        self.table.disk_backed = self.device.is_some();
        log::info!("reformatted");
        self.commit()
    }

    #[inline]
    pub fn root(&self) -> EntryId {
        self.table.root
    }

    #[inline]
    pub fn is_disk_backed(&self) -> bool {
        self.table.disk_backed && self.device.is_some()
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.table.get(id)
    }

    pub fn usage(&self) -> Usage {
        Usage {
            entries: self.table.entries.iter().filter(|entry| entry.used).count(),
            max_entries: MAX_ENTRIES,
            data_used: self.table.next_data_offset as usize,
            data_capacity: DATA_SIZE,
        }
    }

    /// 调用方给出的当前目录必须是使用中的目录
    fn check_cwd(&self, cwd: EntryId) -> Result<()> {
        match self.table.get(cwd) {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(Error::NotADirectory),
            None => Err(Error::NotFound),
        }
    }

    /// 规范化为绝对路径；只有相对路径才依赖当前目录
    fn absolute(&self, path: &str, cwd: EntryId) -> Result<alloc::string::String> {
        if path.is_relative() {
            self.check_cwd(cwd)?;
        }
        self.table.absolute(path, cwd)
    }

    pub fn resolve(&self, path: &str, cwd: EntryId) -> Result<EntryId> {
        let path = self.absolute(path, cwd)?;
        self.table.resolve_absolute(&path)
    }

    /// 目录项的绝对路径
    pub fn path_of(&self, id: EntryId) -> Result<alloc::string::String> {
        self.table.get(id).ok_or(Error::NotFound)?;
        Ok(self.table.path_of(id))
    }

    /// 新建目录项的准备：父目录存在、是目录、没有同名项
    fn prepare_create(&self, path: &str, cwd: EntryId) -> Result<(EntryId, alloc::string::String)> {
        let path = self.absolute(path, cwd)?;
        let (parent_path, name) = path.parent_file().ok_or(Error::InvalidPath)?;
        check_name(name)?;

        let parent = self.table.resolve_absolute(parent_path)?;
        if !self.table.entry(parent).is_dir() {
            return Err(Error::NotADirectory);
        }
        if self.table.find_child(parent, name).is_some() {
            return Err(Error::AlreadyExists);
        }

        Ok((parent, name.into()))
    }

    pub fn make_directory(&mut self, path: &str, cwd: EntryId) -> Result<EntryId> {
        let (parent, name) = self.prepare_create(path, cwd)?;
        let id = self.table.allocate_slot()?;

        self.table
            .occupy(id, Entry::new(&name, DirEntryType::Directory, parent));
        self.table.link_child(parent, id);
        log::debug!("mkdir {path:?} -> {id}");
        self.commit()?;

        Ok(id)
    }

    /// 列出目录，`path` 为空时列出当前目录；顺序为最近创建的在前
    pub fn list(&self, path: Option<&str>, cwd: EntryId) -> Result<Vec<DirEntry>> {
        let dir = match path {
            Some(path) => self.resolve(path, cwd)?,
            None => {
                self.check_cwd(cwd)?;
                cwd
            }
        };
        if !self.table.entry(dir).is_dir() {
            return Err(Error::NotADirectory);
        }

        Ok(self
            .table
            .children(dir)
            .map(|id| {
                let entry = self.table.entry(id);
                DirEntry {
                    id: id.into(),
                    ty: entry.kind,
                    name: entry.name().into(),
                    size: entry.size,
                }
            })
            .collect())
    }

    /// 新建文件；槽位与数据区要么都占用，要么都不动
    pub fn create_file(&mut self, path: &str, content: &[u8], cwd: EntryId) -> Result<EntryId> {
        let (parent, name) = self.prepare_create(path, cwd)?;
        let id = self.table.allocate_slot()?;
        if !self.table.has_room(content.len()) {
            return Err(Error::OutOfSpace);
        }

        let offset = self.table.append_data(content)?;
        let mut entry = Entry::new(&name, DirEntryType::Regular, parent);
        entry.size = content.len() as u32;
        entry.data_offset = offset;
        self.table.occupy(id, entry);
        self.table.link_child(parent, id);
        log::debug!("create {path:?} -> {id}, {} bytes at {offset}", content.len());
        self.commit()?;

        Ok(id)
    }

    pub fn read_file(&self, path: &str, cwd: EntryId) -> Result<&[u8]> {
        let id = self.resolve(path, cwd)?;
        if self.table.entry(id).is_dir() {
            return Err(Error::NotAFile);
        }

        Ok(self.table.data_of(id))
    }

    /// 删除文件或空目录；文件内容占据的数据区不会回收
    pub fn remove(&mut self, path: &str, cwd: EntryId) -> Result<()> {
        let id = self.resolve(path, cwd)?;
        self.remove_entry(id)
    }

    /// 只删除空目录
    pub fn remove_dir(&mut self, path: &str, cwd: EntryId) -> Result<()> {
        let id = self.resolve(path, cwd)?;
        if !self.table.entry(id).is_dir() {
            return Err(Error::NotADirectory);
        }
        self.remove_entry(id)
    }

    fn remove_entry(&mut self, id: EntryId) -> Result<()> {
        let entry = self.table.entry(id);
        // 只有根目录没有父目录
        let parent = entry.parent.ok_or(Error::InvalidPath)?;
        if entry.is_dir() && self.table.children(id).next().is_some() {
            return Err(Error::DirectoryNotEmpty);
        }

        self.table.unlink_child(parent, id);
        self.table.release(id);
        log::debug!("remove {id} from {parent}");
        self.commit()
    }

    /// 复制文件，目标已存在时与新建文件一样失败
    pub fn copy(&mut self, src: &str, dst: &str, cwd: EntryId) -> Result<EntryId> {
        let content = self.read_file(src, cwd)?.to_vec();
        self.create_file(dst, &content, cwd)
    }

    /// 切换目录，返回新的当前目录
    pub fn change_dir(&self, path: &str, cwd: EntryId) -> Result<EntryId> {
        let id = self.resolve(path, cwd)?;
        if !self.table.entry(id).is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(id)
    }

    /// 把整个镜像写回设备
    pub fn save(&self) -> Result<()> {
        let device = self.device.as_deref().ok_or(Error::NotDiskBacked)?;
        codec::save(&self.table, device)
    }

    /// 从设备重新加载，覆盖内存中的镜像；镜像不合法时重新格式化并写回
    pub fn load(&mut self) -> Result<LoadOutcome> {
        let device = self.device.clone().ok_or(Error::NotDiskBacked)?;
        ensure_present(&*device)?;
        match codec::load(&*device) {
            Ok(mut table) => {
                table.disk_backed = true;
                self.table = table;
                Ok(LoadOutcome::Loaded)
            }
            Err(Error::CorruptImage) => {
                log::warn!("invalid image on disk, formatting");
                self.reformat()?;
                Ok(LoadOutcome::Reformatted)
            }
            Err(err) => Err(err),
        }
    }

    /// 磁盘模式下同步写回
    fn commit(&self) -> Result<()> {
        if self.is_disk_backed() {
            self.save()?;
        }
        Ok(())
    }
}

/// 挂载或格式化之前先确认设备存在
fn ensure_present(device: &dyn BlockDevice) -> Result<()> {
    if device.detect() {
        Ok(())
    } else {
        log::warn!("no block device detected");
        Err(Error::Io(BlockError::NotPresent))
    }
}
