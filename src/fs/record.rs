use serde::{Deserialize, Serialize};

use crate::{error::CodecError, utils::traits::OnDiskRegion};

use super::{MAX_NAME_LEN, RECORD_SIZE};

/// name of the root directory
pub const ROOT_NAME: &str = "/";

/// on-disk payload describing a filesystem object,
/// tagged by its type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Directory {
        name: String,
        children_inodes_count: u64,
    },
    File {
        name: String,
        size: u64,
        first_block: u64,
    },
}

fn check_name(name: &str) -> Result<(), CodecError> {
    if name.len() > MAX_NAME_LEN {
        return Err(CodecError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

impl Record {
    /// an empty directory
    pub fn directory(name: impl Into<String>) -> Result<Self, CodecError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Record::Directory {
            name,
            children_inodes_count: 0,
        })
    }

    /// an empty file without data blocks
    pub fn file(name: impl Into<String>) -> Result<Self, CodecError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Record::File {
            name,
            size: 0,
            first_block: 0,
        })
    }

    /// the record of the root directory "/"
    pub fn root() -> Self {
        Record::Directory {
            name: ROOT_NAME.to_string(),
            children_inodes_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Record::Directory { name, .. } | Record::File { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Record::Directory { .. })
    }
}

impl OnDiskRegion for Record {
    const REGION_SIZE: usize = RECORD_SIZE as usize;
}
