mod cli;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use typed_bytesize::ByteSizeIec;
use zadfs::{BLOCK_SIZE, IMAGE_SECTORS, ZadFs};
use zadfs_fuse::{BlockFile, Shell};

use self::cli::{Cli, Command};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Format { image, kib } => {
            let device = open_image(&image, Some(ByteSizeIec::kib(kib).0))?;
            ZadFs::format(Some(device)).map_err(io::Error::other)?;
            println!("formatted {image:?}");
        }
        Command::Pack { source, image, kib } => {
            let device = open_image(&image, Some(ByteSizeIec::kib(kib).0))?;
            let mut fs = ZadFs::format(Some(device)).map_err(io::Error::other)?;
            pack(&mut fs, &source)?;
        }
        Command::Shell { image } => {
            let device = image.map(|image| open_image(&image, None)).transpose()?;
            let mut fs = zadfs_fuse::boot(device, &mut io::stdout().lock())?;

            let mut shell = Shell::new(&fs);
            shell.run(&mut fs, io::stdin().lock(), &mut io::stdout().lock())?;
        }
    }

    Ok(())
}

/// 打开镜像文件；`len` 为 `Some` 时截断重建，否则只在不够放下镜像时加长
fn open_image(path: &Path, len: Option<u64>) -> io::Result<Arc<dyn BlockDevice>> {
    let min_len = (IMAGE_SECTORS * BLOCK_SIZE) as u64;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(len.is_some())
        .open(path)?;

    let len = len.unwrap_or(fd.metadata()?.len()).max(min_len);
    if fd.metadata()?.len() < len {
        fd.set_len(len)?;
    }
    log::info!("image {path:?}: {len} bytes");

    Ok(Arc::new(BlockFile::new(fd)?))
}

fn pack(fs: &mut ZadFs, source: &Path) -> io::Result<()> {
    let root = fs.root();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            log::warn!("skip {:?}: not a regular file", entry.path());
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skip {:?}: name is not UTF-8", entry.path());
            continue;
        };

        let content = fs::read(entry.path())?;
        fs.create_file(&name, &content, root)
            .map_err(io::Error::other)?;
        println!("packed {name:?}: {} bytes", content.len());
    }

    Ok(())
}
