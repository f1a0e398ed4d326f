use alloc::string::String;

/// `ls` 返回的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry handle
    pub id: u32,
    pub ty: DirEntryType,
    pub name: String,
    /// 文件为字节数，目录为子项个数
    pub size: u32,
}

impl DirEntry {
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.ty == DirEntryType::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    #[default]
    Regular = 0,
    Directory = 1,
}
