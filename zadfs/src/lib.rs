#![no_std]

extern crate alloc;

/* ZadFS 的整体架构，自上而下 */

// 操作层：mkdir/ls/create/cat/rm/cp，磁盘模式下每次修改后整体落盘
mod fs;

// 路径层：把路径字符串解析为目录项句柄
mod path;

// 表层：定长目录项表与只追加的数据区
mod table;

// 持久化层：整张表与数据区 <-> 连续扇区
pub mod codec;

// 数据结构层：目录项与句柄
mod layout;

pub use block_dev::{BLOCK_SIZE, BlockDevice};
pub use vfs::{DirEntry, DirEntryType, Error};

pub use self::{
    fs::{LoadOutcome, Usage, ZadFs},
    layout::{Entry, EntryId},
    path::Path,
    table::Table,
};

/// 镜像签名
pub const MAGIC: u32 = 0x005A_DF55;
/// 磁盘布局版本，结构有变化时递增
pub const VERSION: u32 = 1;
/// 目录项表容量
pub const MAX_ENTRIES: usize = 128;
/// 名字的最大字节数（磁盘上再补一个 `\0`）
pub const NAME_MAX_LEN: usize = 31;
/// 路径的最大字节数
pub const MAX_PATH: usize = 128;
/// 数据区容量
pub const DATA_SIZE: usize = 4096;
/// 镜像在块设备上的起始扇区
pub const BASE_SECTOR: usize = 0;
/// 编码后镜像的字节数
pub const IMAGE_SIZE: usize = codec::HEADER_SIZE + MAX_ENTRIES * codec::ENTRY_SIZE + DATA_SIZE;
/// 镜像占据的扇区数
pub const IMAGE_SECTORS: usize = IMAGE_SIZE.div_ceil(BLOCK_SIZE);

type Result<T> = core::result::Result<T, Error>;
