//! The declaration of the types describing the Hive chain data consumed by
//! the indexer: signed blocks, their transactions and operations, and the
//! virtual operations emitted by consensus.

#[macro_use]
mod macros;

pub mod asset;
pub mod block;
pub mod operation;
pub mod vops;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::ops::{Add, Deref, DerefMut, Sub};
use std::str::FromStr;

pub use crate::{
    asset::Asset,
    block::{BlockIdError, SignedBlock, Transaction},
    operation::{Operation, RawOperation},
    vops::VirtualOperation,
};

basic_type!(
    /// Hive block sequential index.
    BlockNumber,
    u32
);
