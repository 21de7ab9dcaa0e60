// TBD extractor: forward references to picks whose slot is not yet known.

use std::collections::BTreeMap;

use crate::ledger::TransactionRecord;
use crate::picks::pick::DraftPick;

/// One placeholder pick per referenced (season, round), in (season, round)
/// order.
///
/// The earliest ledger record (by record id, never by the editable display
/// order) fixes the placeholder's first-seen record and its owner: the pick's
/// stated original owner, else the party the pick moved away from.
pub fn extract_tbd_picks(transactions: &[TransactionRecord]) -> Vec<DraftPick> {
    let mut ordered: Vec<&TransactionRecord> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.record_id);

    let mut first_seen: BTreeMap<(i32, u32), DraftPick> = BTreeMap::new();
    for txn in ordered {
        let Some(hint) = txn.pick.as_ref().filter(|h| h.is_unresolved()) else {
            continue;
        };
        first_seen.entry((hint.season, hint.round)).or_insert_with(|| {
            let owner = hint
                .original_owner
                .clone()
                .or_else(|| txn.from_party.clone());
            DraftPick::tbd(hint.season, hint.round, owner, txn.record_id)
        });
    }

    first_seen.into_values().collect()
}
