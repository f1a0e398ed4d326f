//! # 块设备接口层
//!
//! 块设备是以**块**（扇区）为单位存储数据的设备，例如磁盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 本层不做任何缓冲或缓存：每次读写都直接落到设备上。

#![no_std]

extern crate alloc;

#[cfg(all(feature = "ata", target_arch = "x86_64"))]
mod ata;
mod ram;

use core::any::Any;
use core::fmt::{self, Debug};

#[cfg(all(feature = "ata", target_arch = "x86_64"))]
pub use self::ata::AtaPio;
pub use self::ram::RamDisk;

/// 扇区大小，读写都以此为单位
pub const BLOCK_SIZE: usize = 512;

/// 块设备驱动特质
///
/// 所有操作都是同步的；块号从0开始，连续的块号属于同一个逻辑设备。
pub trait BlockDevice: Debug + Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError>;

    /// 设备是否存在
    fn detect(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// 块号超出设备容量
    OutOfRange { block_id: usize },
    /// 缓冲区长度不是一个块
    BadBuffer { len: usize },
    /// 设备报告了错误，附带其状态寄存器
    Device { status: u8 },
    /// 探测不到设备
    NotPresent,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { block_id } => write!(f, "block {block_id} out of range"),
            Self::BadBuffer { len } => write!(f, "buffer of {len} bytes is not one block"),
            Self::Device { status } => write!(f, "device error (status={status:#04x})"),
            Self::NotPresent => write!(f, "no device present"),
        }
    }
}

#[inline]
pub(crate) fn check_buffer(len: usize) -> Result<(), BlockError> {
    if len == BLOCK_SIZE {
        Ok(())
    } else {
        Err(BlockError::BadBuffer { len })
    }
}
