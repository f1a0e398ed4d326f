
mod block_file;
mod shell;

pub use self::{
    block_file::BlockFile,
    shell::{Shell, boot},
};
