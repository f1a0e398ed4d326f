//! Primary-bus ATA PIO driver (LBA28, master drive).
//!
//! Every wait is a busy spin on the status register with no timeout: a drive
//! that never becomes ready hangs the caller.

use core::hint;

use spin::Mutex;
use x86_64::instructions::port::{Port, PortReadOnly, PortWriteOnly};

use crate::{BlockDevice, BlockError, check_buffer};

const PRIMARY_IO_BASE: u16 = 0x1F0;

const STATUS_ERR: u8 = 0x01;
const STATUS_DRQ: u8 = 0x08;
const STATUS_DF: u8 = 0x20;
const STATUS_RDY: u8 = 0x40;
const STATUS_BSY: u8 = 0x80;
/// 总线悬空时读到的状态
const FLOATING_BUS: u8 = 0xFF;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;
const CMD_CACHE_FLUSH: u8 = 0xE7;

const SELECT_MASTER: u8 = 0xA0;
const SELECT_MASTER_LBA: u8 = 0xE0;

const LBA28_LIMIT: usize = 1 << 28;
/// 探测时最多轮询状态的次数
const DETECT_POLLS: usize = 10_000;

struct AtaPorts {
    data: Port<u16>,
    sector_count: PortWriteOnly<u8>,
    lba_lo: PortWriteOnly<u8>,
    lba_mid: PortWriteOnly<u8>,
    lba_hi: PortWriteOnly<u8>,
    drive: PortWriteOnly<u8>,
    status: PortReadOnly<u8>,
    command: PortWriteOnly<u8>,
}

pub struct AtaPio {
    ports: Mutex<AtaPorts>,
}

impl core::fmt::Debug for AtaPio {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtaPio")
            .field("io_base", &PRIMARY_IO_BASE)
            .finish()
    }
}

impl AtaPio {
    /// # Safety
    ///
    /// 调用者需保证主通道的I/O端口确实属于一个ATA控制器，
    /// 且没有其它代码同时操作这些端口。
    pub const unsafe fn new() -> Self {
        Self {
            ports: Mutex::new(AtaPorts {
                data: Port::new(PRIMARY_IO_BASE),
                sector_count: PortWriteOnly::new(PRIMARY_IO_BASE + 2),
                lba_lo: PortWriteOnly::new(PRIMARY_IO_BASE + 3),
                lba_mid: PortWriteOnly::new(PRIMARY_IO_BASE + 4),
                lba_hi: PortWriteOnly::new(PRIMARY_IO_BASE + 5),
                drive: PortWriteOnly::new(PRIMARY_IO_BASE + 6),
                status: PortReadOnly::new(PRIMARY_IO_BASE + 7),
                command: PortWriteOnly::new(PRIMARY_IO_BASE + 7),
            }),
        }
    }
}

impl AtaPorts {
    #[inline]
    fn status(&mut self) -> u8 {
        unsafe { self.status.read() }
    }

    /// 等待 BSY 清零且 RDY 置位
    fn wait_ready(&mut self) {
        while self.status() & (STATUS_BSY | STATUS_RDY) != STATUS_RDY {
            hint::spin_loop();
        }
    }

    /// 等待命令完成，然后检查错误位
    fn wait_done(&mut self) -> Result<u8, BlockError> {
        let mut status = self.status();
        while status & STATUS_BSY != 0 {
            hint::spin_loop();
            status = self.status();
        }
        if status & (STATUS_ERR | STATUS_DF) != 0 {
            log::error!("ata: command failed, status={status:#04x}");
            return Err(BlockError::Device { status });
        }
        Ok(status)
    }

    fn wait_drq(&mut self) -> Result<(), BlockError> {
        let status = self.wait_done()?;
        if status & STATUS_DRQ == 0 {
            return Err(BlockError::Device { status });
        }
        Ok(())
    }

    fn issue(&mut self, lba: usize, command: u8) {
        self.wait_ready();
        unsafe {
            self.drive
                .write(SELECT_MASTER_LBA | ((lba >> 24) & 0x0F) as u8);
            self.sector_count.write(1);
            self.lba_lo.write(lba as u8);
            self.lba_mid.write((lba >> 8) as u8);
            self.lba_hi.write((lba >> 16) as u8);
            self.command.write(command);
        }
    }
}

fn check_lba(block_id: usize) -> Result<(), BlockError> {
    if block_id < LBA28_LIMIT {
        Ok(())
    } else {
        Err(BlockError::OutOfRange { block_id })
    }
}

impl BlockDevice for AtaPio {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        check_buffer(buf.len())?;
        check_lba(block_id)?;
        log::trace!("ata: read lba={block_id}");

        let mut ports = self.ports.lock();
        ports.issue(block_id, CMD_READ_SECTORS);
        ports.wait_drq()?;
        for pair in buf.chunks_exact_mut(2) {
            let word = unsafe { ports.data.read() };
            pair.copy_from_slice(&word.to_le_bytes());
        }

        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        check_buffer(buf.len())?;
        check_lba(block_id)?;
        log::trace!("ata: write lba={block_id}");

        let mut ports = self.ports.lock();
        ports.issue(block_id, CMD_WRITE_SECTORS);
        ports.wait_drq()?;
        for pair in buf.chunks_exact(2) {
            let word = u16::from_le_bytes([pair[0], pair[1]]);
            unsafe { ports.data.write(word) };
        }
        ports.wait_done()?;

        unsafe { ports.command.write(CMD_CACHE_FLUSH) };
        ports.wait_done()?;

        Ok(())
    }

    fn detect(&self) -> bool {
        let mut ports = self.ports.lock();
        unsafe { ports.drive.write(SELECT_MASTER) };

        // 读四次状态寄存器，约400ns，等待驱动器选择生效
        let mut status = 0;
        for _ in 0..4 {
            status = ports.status();
        }
        if status == FLOATING_BUS {
            log::info!("ata: no drive on primary bus");
            return false;
        }

        for _ in 0..DETECT_POLLS {
            if status & (STATUS_BSY | STATUS_RDY) == STATUS_RDY {
                return true;
            }
            hint::spin_loop();
            status = ports.status();
        }
        log::info!("ata: drive never became ready, status={status:#04x}");

        false
    }
}
