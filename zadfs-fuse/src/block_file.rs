use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BLOCK_SIZE, BlockDevice, BlockError};
use send_wrapper::SendWrapper;

/// 以文件模拟的磁盘，按扇区寻址
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    blocks: usize,
}

impl BlockFile {
    /// 容量取文件当前长度，不足一个扇区的尾部不用
    pub fn new(fd: File) -> io::Result<Self> {
        let blocks = fd.metadata()?.len() as usize / BLOCK_SIZE;

        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            blocks,
        })
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    fn seek(&self, file: &mut File, block_id: usize, len: usize) -> Result<(), BlockError> {
        if len != BLOCK_SIZE {
            return Err(BlockError::BadBuffer { len });
        }
        if block_id >= self.blocks {
            return Err(BlockError::OutOfRange { block_id });
        }
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(host_error)?;
        Ok(())
    }
}

fn host_error(err: io::Error) -> BlockError {
    log::error!("image file: {err}");
    BlockError::Device { status: 0 }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let mut file = self.inner.borrow_mut();
        self.seek(&mut file, block_id, buf.len())?;
        file.read_exact(buf).map_err(host_error)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        let mut file = self.inner.borrow_mut();
        self.seek(&mut file, block_id, buf.len())?;
        file.write_all(buf).map_err(host_error)
    }

    /// 空文件视为没有磁盘
    fn detect(&self) -> bool {
        self.blocks > 0
    }
}
