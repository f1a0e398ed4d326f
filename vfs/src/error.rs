use block_dev::BlockError;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "File or directory not found")]
    NotFound,
    #[display(fmt = "Invalid path")]
    InvalidPath,
    #[display(fmt = "Not a directory")]
    NotADirectory,
    #[display(fmt = "Not a file")]
    NotAFile,
    #[display(fmt = "Already exists")]
    AlreadyExists,
    #[display(fmt = "Directory not empty")]
    DirectoryNotEmpty,
    /// 数据区用尽
    #[display(fmt = "No space left on device")]
    OutOfSpace,
    /// 目录项表用尽
    #[display(fmt = "Too many files")]
    CapacityExceeded,
    #[display(fmt = "I/O error: {}", _0)]
    Io(BlockError),
    /// 磁盘上的镜像魔数或结构不合法
    #[display(fmt = "Invalid filesystem image")]
    CorruptImage,
    #[display(fmt = "Not in disk-backed mode")]
    NotDiskBacked,
}

impl From<BlockError> for Error {
    fn from(err: BlockError) -> Self {
        Self::Io(err)
    }
}

impl core::error::Error for Error {}
