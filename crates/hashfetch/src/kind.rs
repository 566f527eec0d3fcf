use std::fmt;
use std::str::FromStr;

use hashfetch_store::ArtifactKind;
use serde::{Deserialize, Serialize};

/// What the caller expects a hash to materialize as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedKind {
    /// A single regular file.
    File,
    /// An unpacked directory tree.
    Dapp,
}

impl ExpectedKind {
    pub fn accepts(self, found: ArtifactKind) -> bool {
        matches!(
            (self, found),
            (ExpectedKind::File, ArtifactKind::File) | (ExpectedKind::Dapp, ArtifactKind::Directory)
        )
    }
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedKind::File => f.write_str("file"),
            ExpectedKind::Dapp => f.write_str("dapp"),
        }
    }
}

impl FromStr for ExpectedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ExpectedKind::File),
            "dapp" => Ok(ExpectedKind::Dapp),
            other => Err(format!("unknown kind '{other}', expected 'file' or 'dapp'")),
        }
    }
}
