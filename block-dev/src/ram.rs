use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BLOCK_SIZE, BlockDevice, BlockError, check_buffer};

/// 位于内存中的块设备，容量固定。
///
/// 可以注入故障：故障状态下所有读写都返回设备错误；
/// 也可以把磁盘“拔掉”，此时 [`BlockDevice::detect`] 返回假。
#[derive(Debug)]
pub struct RamDisk {
    inner: Mutex<RamDiskInner>,
}

#[derive(Debug)]
struct RamDiskInner {
    blocks: Vec<[u8; BLOCK_SIZE]>,
    faulty: bool,
    present: bool,
}

impl RamDisk {
    /// Status reported while the disk is faulty: ERR | DF
    pub const FAULT_STATUS: u8 = 0x21;

    pub fn new(blocks: usize) -> Self {
        Self {
            inner: Mutex::new(RamDiskInner {
                blocks: vec![[0; BLOCK_SIZE]; blocks],
                faulty: false,
                present: true,
            }),
        }
    }

    #[inline]
    pub fn blocks(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    pub fn set_faulty(&self, faulty: bool) {
        self.inner.lock().faulty = faulty;
    }

    pub fn set_present(&self, present: bool) {
        self.inner.lock().present = present;
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        check_buffer(buf.len())?;
        let inner = self.inner.lock();
        if inner.faulty {
            log::debug!("ramdisk: injected fault on block {block_id}");
            return Err(BlockError::Device {
                status: Self::FAULT_STATUS,
            });
        }
        let block = inner
            .blocks
            .get(block_id)
            .ok_or(BlockError::OutOfRange { block_id })?;
        buf.copy_from_slice(block);

        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        check_buffer(buf.len())?;
        let mut inner = self.inner.lock();
        if inner.faulty {
            log::debug!("ramdisk: injected fault on block {block_id}");
            return Err(BlockError::Device {
                status: Self::FAULT_STATUS,
            });
        }
        let block = inner
            .blocks
            .get_mut(block_id)
            .ok_or(BlockError::OutOfRange { block_id })?;
        block.copy_from_slice(buf);

        Ok(())
    }

    fn detect(&self) -> bool {
        self.inner.lock().present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let disk = RamDisk::new(4);
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xAB;
        block[BLOCK_SIZE - 1] = 0xCD;
        disk.write_block(3, &block).unwrap();

        let mut buf = [0u8; BLOCK_SIZE];
        disk.read_block(3, &mut buf).unwrap();
        assert_eq!(buf, block);

        disk.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_range() {
        let disk = RamDisk::new(2);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(
            disk.read_block(2, &mut buf),
            Err(BlockError::OutOfRange { block_id: 2 })
        );
    }

    #[test]
    fn short_buffer() {
        let disk = RamDisk::new(1);
        assert_eq!(
            disk.write_block(0, &[0u8; 100]),
            Err(BlockError::BadBuffer { len: 100 })
        );
    }

    #[test]
    fn faulty_disk() {
        let disk = RamDisk::new(1);
        disk.set_faulty(true);
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(matches!(
            disk.read_block(0, &mut buf),
            Err(BlockError::Device { .. })
        ));

        disk.set_faulty(false);
        assert!(disk.read_block(0, &mut buf).is_ok());
    }

    #[test]
    fn unplugged_disk() {
        let disk = RamDisk::new(1);
        assert!(disk.detect());
        disk.set_present(false);
        assert!(!disk.detect());
        disk.set_present(true);
        assert!(disk.detect());
    }
}
