use serde::{Deserialize, Serialize};

/// NAI-format token amount, as emitted by the node.
///
/// The amount is kept as the decimal string from the wire; the indexer
/// never does arithmetic on it, it only persists the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub amount: String,
    pub precision: u8,
    pub nai: String,
}

impl Asset {
    /// Token symbol for the known NAIs, the raw NAI otherwise.
    pub fn symbol(&self) -> &str {
        match self.nai.as_str() {
            "@@000000013" => "HBD",
            "@@000000021" => "HIVE",
            "@@000000037" => "VESTS",
            other => other,
        }
    }
}
