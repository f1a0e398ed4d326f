//! # 数据结构层
//!
//! ZadFS 的镜像布局：
//! 头部 | 目录项表（定长） | 数据区（只追加）
//!
//! 目录树由表内的下标串起来：`parent`、`first_child`、`next_sibling`，
//! 整个镜像因此可以原样搬到磁盘上再搬回来。

mod entry;

pub use self::entry::{Entry, EntryId};
pub(crate) use self::entry::check_name;
