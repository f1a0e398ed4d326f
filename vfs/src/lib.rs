#![no_std]

extern crate alloc;

mod dirent;
mod error;

pub use self::{
    dirent::{DirEntry, DirEntryType},
    error::Error,
};
