//! # 路径层
//!
//! 绝对路径从根目录开始逐段查找子项链表；
//! 相对路径先沿 `parent` 向上走回根，拼出当前目录的绝对路径，再与之拼接解析。

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec::Vec;

use vfs::{DirEntryType, Error};

use crate::layout::EntryId;
use crate::table::Table;
use crate::{MAX_PATH, NAME_MAX_LEN, Result};

pub trait Path: ToOwned {
    fn is_absolute(&self) -> bool;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// 返回不以`/`结束（根除外）、不包含`.`与`..`的绝对路径。
    ///
    /// # 参数
    ///
    /// `cwd`: 当前目录的绝对路径，仅在`self`为相对路径时使用。
    fn canonicalize(&self, cwd: &Self) -> Result<Self::Owned>;

    /// 返回路径的`(父目录, 文件名)`，根目录返回`None`。
    ///
    /// 只用于[`Path::canonicalize`]的结果。
    fn parent_file(&self) -> Option<(&Self, &Self)>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn canonicalize(&self, cwd: &Self) -> Result<String> {
        if self.is_empty() || self.len() > MAX_PATH {
            return Err(Error::InvalidPath);
        }

        let mut cmps = Vec::new();
        if self.is_relative() {
            // 过滤掉`cwd`开头的`/`带来的空串，尤其是`cwd == /`时
            cmps.extend(cwd.split('/').filter(|s| !s.is_empty()));
        }

        let body = self.trim_start_matches('/');
        let body = body.strip_suffix('/').unwrap_or(body);
        if !body.is_empty() {
            for cmp in body.split('/') {
                match cmp {
                    ".." => {
                        cmps.pop().ok_or(Error::InvalidPath)?;
                    }
                    "." => (),
                    "" => return Err(Error::InvalidPath),
                    s if s.len() > NAME_MAX_LEN => return Err(Error::InvalidPath),
                    s => cmps.push(s),
                }
            }
        }
        cmps.insert(0, ""); // 在接下来的拼接中代表根目录

        let path = if cmps.len() == 1 {
            String::from("/")
        } else {
            cmps.join("/")
        };
        // 与当前目录拼接后也不能超长
        if path.len() > MAX_PATH {
            return Err(Error::InvalidPath);
        }

        Ok(path)
    }

    fn parent_file(&self) -> Option<(&Self, &Self)> {
        if self == "/" {
            return None;
        }

        self.rsplit_once('/')
            .map(|(p, f)| if p.is_empty() { ("/", f) } else { (p, f) })
    }
}

impl Table {
    /// 当前目录的绝对路径：沿`parent`走到根，倒序拼接名字
    pub fn path_of(&self, id: EntryId) -> String {
        let mut names = Vec::new();
        let mut walk = id;
        while let Some(parent) = self.entry(walk).parent {
            names.push(self.entry(walk).name());
            walk = parent;
        }

        let mut path = String::with_capacity(MAX_PATH);
        if names.is_empty() {
            path.push('/');
        }
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// 把任意路径规范化为绝对路径
    pub fn absolute(&self, path: &str, cwd: EntryId) -> Result<String> {
        if path.is_absolute() {
            path.canonicalize("/")
        } else {
            path.canonicalize(&self.path_of(cwd))
        }
    }

    /// 解析已规范化的绝对路径
    pub fn resolve_absolute(&self, path: &str) -> Result<EntryId> {
        if !path.is_absolute() {
            return Err(Error::InvalidPath);
        }

        let mut id = self.root;
        for cmp in path.split('/').filter(|s| !s.is_empty()) {
            if self.entry(id).kind != DirEntryType::Directory {
                return Err(Error::NotFound);
            }
            id = self.find_child(id, cmp).ok_or(Error::NotFound)?;
        }

        Ok(id)
    }

    pub fn resolve(&self, path: &str, cwd: EntryId) -> Result<EntryId> {
        let path = self.absolute(path, cwd)?;
        self.resolve_absolute(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Entry;

    fn mkdir(table: &mut Table, parent: EntryId, name: &str) -> EntryId {
        let id = table.allocate_slot().unwrap();
        table.occupy(id, Entry::new(name, DirEntryType::Directory, parent));
        table.link_child(parent, id);
        id
    }

    #[test]
    fn canonicalize_absolute() {
        assert_eq!("/".canonicalize("/").unwrap(), "/");
        assert_eq!("/a/b".canonicalize("/x").unwrap(), "/a/b");
        assert_eq!("/a/b/".canonicalize("/").unwrap(), "/a/b");
        assert_eq!("/a/./b/../c".canonicalize("/").unwrap(), "/a/c");
        assert_eq!("/a/..".canonicalize("/").unwrap(), "/");
    }

    #[test]
    fn canonicalize_relative() {
        assert_eq!("b".canonicalize("/").unwrap(), "/b");
        assert_eq!("b/c".canonicalize("/a").unwrap(), "/a/b/c");
        assert_eq!("..".canonicalize("/a/b").unwrap(), "/a");
        assert_eq!(".".canonicalize("/a").unwrap(), "/a");
        assert_eq!("../../x".canonicalize("/a/b").unwrap(), "/x");
    }

    #[test]
    fn canonicalize_rejects() {
        assert_eq!("".canonicalize("/"), Err(Error::InvalidPath));
        assert_eq!("/..".canonicalize("/"), Err(Error::InvalidPath));
        assert_eq!("..".canonicalize("/"), Err(Error::InvalidPath));
        assert_eq!("/a//b".canonicalize("/"), Err(Error::InvalidPath));
        let long_name = alloc::format!("/{}", "n".repeat(NAME_MAX_LEN + 1));
        assert_eq!(long_name.canonicalize("/"), Err(Error::InvalidPath));
        let long_path = "/abc".repeat(MAX_PATH / 4 + 1);
        assert_eq!(long_path.canonicalize("/"), Err(Error::InvalidPath));
    }

    #[test]
    fn joined_path_is_bounded() {
        // 127 字节的当前目录
        let cwd = alloc::format!("{}/{}", "/abc".repeat(30), "n".repeat(6));
        assert_eq!(cwd.len(), MAX_PATH - 1);
        assert_eq!("x".canonicalize(&cwd), Err(Error::InvalidPath));
        assert_eq!("..".canonicalize(&cwd).unwrap().len(), MAX_PATH - 8);
        assert_eq!(".".canonicalize(&cwd).unwrap(), cwd);
    }

    #[test]
    fn parent_file() {
        assert_eq!("/".parent_file(), None);
        assert_eq!("/a".parent_file(), Some(("/", "a")));
        assert_eq!("/a/b/c".parent_file(), Some(("/a/b", "c")));
    }

    #[test]
    fn path_of_walks_to_root() {
        let mut table = Table::new();
        let root = table.root();
        let a = mkdir(&mut table, root, "a");
        let b = mkdir(&mut table, a, "b");

        assert_eq!(table.path_of(root), "/");
        assert_eq!(table.path_of(a), "/a");
        assert_eq!(table.path_of(b), "/a/b");
    }

    #[test]
    fn relative_matches_absolute() {
        let mut table = Table::new();
        let root = table.root();
        let a = mkdir(&mut table, root, "a");
        let b = mkdir(&mut table, a, "b");
        let c = mkdir(&mut table, b, "c");

        assert_eq!(table.resolve("/a/b/c", root), Ok(c));
        assert_eq!(table.resolve("b/c", a), Ok(c));
        assert_eq!(table.resolve("c", b), Ok(c));
        assert_eq!(table.resolve("..", c), Ok(b));
        assert_eq!(table.resolve("/", c), Ok(root));
        assert_eq!(table.resolve("/a/x", root), Err(Error::NotFound));
        assert_eq!(table.resolve("x/c", a), Err(Error::NotFound));
    }
}
