//! Burn-payment tracking.
//!
//! Only transfers addressed to the null account are indexed; they fund
//! post promotion.

use chrono::NaiveDateTime;
use hivemind_storage::chain::records::NewPayment;
use hivemind_storage::{QueryResult, StorageProcessor};
use hivemind_types::operation::TransferOp;
use hivemind_types::BlockNumber;

use crate::domain::asset_to_decimal;

const NULL_ACCOUNT: &str = "null";

#[derive(Debug, Default)]
pub struct Payments {
    staged: Vec<NewPayment>,
}

impl Payments {
    pub fn op_transfer(
        &mut self,
        op: &TransferOp,
        tx_idx: usize,
        num: BlockNumber,
        date: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if op.to != NULL_ACCOUNT {
            return Ok(());
        }
        self.staged.push(NewPayment {
            block_num: *num as i32,
            tx_idx: tx_idx as i32,
            from_account: op.from.clone(),
            to_account: op.to.clone(),
            amount: asset_to_decimal(&op.amount)?,
            token: op.amount.symbol().to_string(),
            created_at: date,
        });
        Ok(())
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        storage.chain_schema().save_payments(&self.staged).await?;
        self.staged.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    #[cfg(test)]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}
