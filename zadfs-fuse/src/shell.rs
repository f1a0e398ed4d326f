//! 宿主机上的命令行，逐行读取命令并作用于同一个 [`ZadFs`]。
//!
//! 命令出错只打印信息，不会结束会话。

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use block_dev::{BlockDevice, BlockError};
use zadfs::{EntryId, Error, LoadOutcome, ZadFs};

const PROMPT_TAIL: &str = " ~# ";

/// 命令名与说明，按帮助中的顺序排列
const COMMANDS: &[(&str, &str)] = &[
    ("help", "Show this help message"),
    ("ls", "List directory contents"),
    ("mkdir", "Create a new directory"),
    ("rmdir", "Remove an empty directory"),
    ("touch", "Create file with content"),
    ("cat", "Display file contents"),
    ("rm", "Remove file or empty directory"),
    ("cp", "Copy file"),
    ("cd", "Change current directory"),
    ("pwd", "Print current directory"),
    ("df", "Show table and data usage"),
    ("savefs", "Save filesystem to disk"),
    ("loadfs", "Load filesystem from disk"),
    ("formatfs", "Erase and format the filesystem"),
];

#[derive(Debug)]
pub struct Shell {
    cwd: EntryId,
}

/// 开机：探测磁盘，能挂载就挂载，镜像不合法就格式化，没有磁盘则只用内存
pub fn boot<W: Write>(device: Option<Arc<dyn BlockDevice>>, out: &mut W) -> io::Result<ZadFs> {
    let Some(device) = device else {
        writeln!(out, "No disk image. Using RAM only.")?;
        return ZadFs::format(None).map_err(io::Error::other);
    };

    match ZadFs::mount_or_format(device) {
        Ok((fs, LoadOutcome::Loaded)) => {
            writeln!(out, "FS loaded from disk.")?;
            Ok(fs)
        }
        Ok((fs, LoadOutcome::Reformatted)) => {
            writeln!(out, "Invalid FS, formatting.")?;
            Ok(fs)
        }
        Err(Error::Io(BlockError::NotPresent)) => {
            writeln!(out, "No disk found. Using RAM only.")?;
            ZadFs::format(None).map_err(io::Error::other)
        }
        Err(err) => Err(io::Error::other(err)),
    }
}

impl Shell {
    pub fn new(fs: &ZadFs) -> Self {
        Self { cwd: fs.root() }
    }

    pub fn cwd(&self) -> EntryId {
        self.cwd
    }

    pub fn prompt(&self, fs: &ZadFs) -> String {
        let cwd = fs.path_of(self.cwd).unwrap_or_else(|_| String::from("/"));
        cwd + PROMPT_TAIL
    }

    /// 读到输入结束为止
    pub fn run<R, W>(&mut self, fs: &mut ZadFs, input: R, out: &mut W) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(out, "Type 'help' to see available commands.")?;
        let mut lines = input.lines();
        loop {
            write!(out, "{}", self.prompt(fs))?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            self.execute(&line?, fs, out)?;
        }

        Ok(())
    }

    /// 执行一行命令，只有写输出失败才返回错误
    pub fn execute<W: Write>(&mut self, line: &str, fs: &mut ZadFs, out: &mut W) -> io::Result<()> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(());
        };
        let args: Vec<&str> = tokens.collect();
        log::debug!("command {verb:?} {args:?}");

        match (verb, args.as_slice()) {
            ("help", _) => {
                writeln!(out, "Available commands:")?;
                for (name, help) in COMMANDS {
                    writeln!(out, "  {name:<12}- {help}")?;
                }
            }
            ("ls", args) => match fs.list(args.first().copied(), self.cwd) {
                Ok(entries) => {
                    writeln!(out, "Contents:")?;
                    if entries.is_empty() {
                        writeln!(out, "  (empty)")?;
                    }
                    for entry in entries {
                        let slash = if entry.is_dir() { "/" } else { "" };
                        writeln!(out, "  {}{slash}", entry.name)?;
                    }
                }
                Err(err) => report(out, verb, err)?,
            },
            ("mkdir", [path, ..]) => match fs.make_directory(path, self.cwd) {
                Ok(_) => writeln!(out, "Directory created!")?,
                Err(err) => report(out, verb, err)?,
            },
            ("rmdir", [path, ..]) => match fs.remove_dir(path, self.cwd) {
                Ok(()) => {
                    writeln!(out, "Removed!")?;
                    self.leave_removed_cwd(fs);
                }
                Err(err) => report(out, verb, err)?,
            },
            ("touch", [path, content @ ..]) => {
                let content = content.join(" ");
                match fs.create_file(path, content.as_bytes(), self.cwd) {
                    Ok(_) => writeln!(out, "File created!")?,
                    Err(err) => report(out, verb, err)?,
                }
            }
            ("cat", [path, ..]) => match fs.read_file(path, self.cwd) {
                Ok(content) => writeln!(out, "{}", String::from_utf8_lossy(content))?,
                Err(err) => report(out, verb, err)?,
            },
            ("rm", [path, ..]) => match fs.remove(path, self.cwd) {
                Ok(()) => {
                    writeln!(out, "Removed!")?;
                    self.leave_removed_cwd(fs);
                }
                Err(err) => report(out, verb, err)?,
            },
            ("cp", [src, dst, ..]) => match fs.copy(src, dst, self.cwd) {
                Ok(_) => writeln!(out, "Copied!")?,
                Err(err) => report(out, verb, err)?,
            },
            ("cd", args) => {
                let path = args.first().copied().unwrap_or("/");
                match fs.change_dir(path, self.cwd) {
                    Ok(cwd) => self.cwd = cwd,
                    Err(err) => writeln!(out, "cd: {err}: {path}")?,
                }
            }
            ("pwd", _) => match fs.path_of(self.cwd) {
                Ok(path) => writeln!(out, "{path}")?,
                Err(err) => report(out, verb, err)?,
            },
            ("df", _) => {
                let usage = fs.usage();
                writeln!(out, "Entries: {}/{}", usage.entries, usage.max_entries)?;
                writeln!(
                    out,
                    "Data:    {}/{} bytes",
                    usage.data_used, usage.data_capacity
                )?;
            }
            ("savefs", _) => match fs.save() {
                Ok(()) => writeln!(out, "Filesystem saved to disk.")?,
                Err(err) => report(out, verb, err)?,
            },
            ("loadfs", _) => {
                let outcome = fs.load();
                // 旧的句柄在新镜像里不一定有意义
                self.cwd = fs.root();
                match outcome {
                    Ok(LoadOutcome::Loaded) => writeln!(out, "Filesystem loaded from disk.")?,
                    Ok(LoadOutcome::Reformatted) => writeln!(out, "Invalid FS, formatting.")?,
                    Err(err) => report(out, verb, err)?,
                }
            }
            ("formatfs", _) => {
                let result = fs.reformat();
                self.cwd = fs.root();
                match result {
                    Ok(()) => writeln!(out, "Filesystem formatted.")?,
                    Err(err) => report(out, verb, err)?,
                }
            }
            (verb, _) if COMMANDS.iter().any(|&(name, _)| name == verb) => {
                writeln!(out, "Usage: {}", usage(verb))?;
            }
            (verb, _) => {
                writeln!(out, "Unknown command: {verb}")?;
                writeln!(out, "Type 'help' for available commands.")?;
            }
        }

        Ok(())
    }

    /// 当前目录被删掉后回到根目录，以免句柄在槽位复用后指向别的目录
    fn leave_removed_cwd(&mut self, fs: &ZadFs) {
        if fs.entry(self.cwd).is_none() {
            log::debug!("cwd {} was removed, back to root", self.cwd);
            self.cwd = fs.root();
        }
    }
}

fn report<W: Write>(out: &mut W, verb: &str, err: Error) -> io::Result<()> {
    log::debug!("{verb} failed: {err:?}");
    writeln!(out, "{verb}: {err}")
}

fn usage(verb: &str) -> &'static str {
    match verb {
        "mkdir" => "mkdir <path>",
        "rmdir" => "rmdir <path>",
        "touch" => "touch <path> [content...]",
        "cat" => "cat <path>",
        "rm" => "rm <path>",
        "cp" => "cp <source> <destination>",
        _ => "help",
    }
}
