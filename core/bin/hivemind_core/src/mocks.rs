//! Mock chain data appended past the real block log.
//!
//! Test deployments extend the chain with blocks loaded from JSON files;
//! the provider falls back to this store for heights the database does
//! not know. File format: an object keyed by block number, values being
//! signed blocks (or virtual-operation lists for the vops file).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use hivemind_types::{BlockNumber, RawOperation, SignedBlock};

#[derive(Debug, Default)]
pub struct MockChainData {
    blocks: HashMap<u32, SignedBlock>,
    vops: HashMap<u32, Vec<RawOperation>>,
}

impl MockChainData {
    pub fn load_block_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open mock block file {}", path.display()))?;
        let raw: HashMap<String, SignedBlock> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed mock block file {}", path.display()))?;

        for (num, block) in raw {
            let num: u32 = num
                .parse()
                .with_context(|| format!("non-numeric block key `{}` in {}", num, path.display()))?;
            self.blocks.insert(num, block);
        }
        log::info!("Loaded mock blocks from {}", path.display());
        Ok(())
    }

    pub fn load_vops_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open mock vops file {}", path.display()))?;
        let raw: HashMap<String, Vec<RawOperation>> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed mock vops file {}", path.display()))?;

        for (num, ops) in raw {
            let num: u32 = num
                .parse()
                .with_context(|| format!("non-numeric vops key `{}` in {}", num, path.display()))?;
            self.vops.entry(num).or_default().extend(ops);
        }
        log::info!("Loaded mock virtual operations from {}", path.display());
        Ok(())
    }

    pub fn get_block(&self, num: BlockNumber) -> Option<&SignedBlock> {
        self.blocks.get(&*num)
    }

    pub fn vops_for(&self, num: BlockNumber) -> &[RawOperation] {
        self.vops.get(&*num).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
