use crate::transaction::Transaction;
use crate::Block;

/// Spendable amount of `address` replayed from chain history.
///
/// The baseline is the change output of the address's most recent
/// self-authored transaction (or `last_known` if it never spent); every
/// output paid to the address by a transaction signed after that point is
/// added on top.
pub fn balance(address: &str, chain: &[Block], last_known: u64) -> u64 {
    let transactions: Vec<&Transaction> = chain.iter().flat_map(|b| b.data.iter()).collect();

    let latest_spend = transactions
        .iter()
        .filter(|tx| tx.input.address == address)
        .max_by_key(|tx| tx.input.timestamp);

    let (mut total, since) = match latest_spend {
        Some(tx) => (paid_to(tx, address), tx.input.timestamp),
        None => (last_known, 0),
    };

    for tx in transactions.iter().filter(|tx| tx.input.timestamp > since) {
        total = total.saturating_add(paid_to(tx, address));
    }
    total
}

fn paid_to(tx: &Transaction, address: &str) -> u64 {
    tx.outputs
        .iter()
        .filter(|o| o.address == address)
        .fold(0u64, |total, o| total.saturating_add(o.amount))
}
