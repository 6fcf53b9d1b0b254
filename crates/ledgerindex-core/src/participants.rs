//! Participant extraction: every address a transaction touches.
//!
//! Inner transactions are walked depth-first with an explicit stack, bounded
//! by the protocol's nesting limit.

use indexmap::IndexSet;

use crate::txn::{SignedTxnWithAd, TxnBody};
use crate::types::Address;

/// Maximum nesting depth of inner transactions allowed by the protocol.
pub const MAX_INNER_DEPTH: usize = 8;

/// Visit `root` and (optionally) its inner transactions in depth-first
/// pre-order: a parent first, then each child subtree in original order.
///
/// Subtrees deeper than [`MAX_INNER_DEPTH`] are not visited.
pub fn walk_txns<'a>(
    root: &'a SignedTxnWithAd,
    include_inner: bool,
    mut visit: impl FnMut(&'a SignedTxnWithAd),
) {
    let mut stack: Vec<(&'a SignedTxnWithAd, usize)> = vec![(root, 0)];
    while let Some((stxn, depth)) = stack.pop() {
        visit(stxn);
        if !include_inner || stxn.inner_txns().is_empty() {
            continue;
        }
        if depth >= MAX_INNER_DEPTH {
            tracing::warn!(
                depth,
                skipped = stxn.inner_txns().len(),
                "Inner transactions exceed nesting limit, not walked"
            );
            continue;
        }
        // Reverse so the first child is popped first.
        for inner in stxn.inner_txns().iter().rev() {
            stack.push((inner, depth + 1));
        }
    }
}

/// Report every address `stxn` touches, with repetition.
///
/// The sender always comes first, followed by type-specific addresses.
pub fn extract_participants(
    stxn: &SignedTxnWithAd,
    include_inner: bool,
    mut visit: impl FnMut(&Address),
) {
    walk_txns(stxn, include_inner, |s| visit_one(s, &mut visit));
}

fn visit_one(stxn: &SignedTxnWithAd, visit: &mut impl FnMut(&Address)) {
    let txn = &stxn.txn;
    visit(&txn.sender);
    match &txn.body {
        TxnBody::Payment(pay) => {
            visit(&pay.receiver);
            if !pay.close_remainder_to.is_zero() {
                visit(&pay.close_remainder_to);
            }
        }
        TxnBody::AssetTransfer(xfer) => {
            if !xfer.asset_sender.is_zero() {
                visit(&xfer.asset_sender);
            }
            visit(&xfer.receiver);
            if !xfer.close_to.is_zero() {
                visit(&xfer.close_to);
            }
        }
        TxnBody::AssetFreeze(frz) => visit(&frz.freeze_account),
        TxnBody::ApplicationCall(app) => {
            for account in &app.accounts {
                visit(account);
            }
        }
        TxnBody::KeyRegistration(_) | TxnBody::AssetConfig(_) | TxnBody::StateProof => {}
    }
}

/// Collect participants in visit order, with repetition.
pub fn participants(stxn: &SignedTxnWithAd, include_inner: bool) -> Vec<Address> {
    let mut out = Vec::new();
    extract_participants(stxn, include_inner, |a| out.push(*a));
    out
}

/// Collect distinct participants in first-seen order.
pub fn unique_participants(stxn: &SignedTxnWithAd, include_inner: bool) -> IndexSet<Address> {
    let mut out = IndexSet::new();
    extract_participants(stxn, include_inner, |a| {
        out.insert(*a);
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::{
        ApplicationCallFields, ApplyData, AssetFreezeFields, EvalDelta, PaymentFields,
        Transaction,
    };

    fn addr(b: u8) -> Address {
        Address::repeat(b)
    }

    fn with_inner(stxn: SignedTxnWithAd, inner: Vec<SignedTxnWithAd>) -> SignedTxnWithAd {
        stxn.with_apply_data(ApplyData {
            eval_delta: EvalDelta { inner_txns: inner },
            ..Default::default()
        })
    }

    fn app_call(sender: u8, accounts: Vec<Address>) -> SignedTxnWithAd {
        SignedTxnWithAd::new(Transaction::new(
            addr(sender),
            TxnBody::ApplicationCall(ApplicationCallFields {
                application_id: 1,
                accounts,
                ..Default::default()
            }),
        ))
    }

    #[test]
    fn payment_order_and_optional_close() {
        let plain = SignedTxnWithAd::new(Transaction::payment(addr(1), addr(2), 10));
        assert_eq!(participants(&plain, false), vec![addr(1), addr(2)]);

        let close = SignedTxnWithAd::new(Transaction::new(
            addr(1),
            TxnBody::Payment(PaymentFields {
                receiver: addr(2),
                amount: 0,
                close_remainder_to: addr(3),
            }),
        ));
        assert_eq!(participants(&close, false), vec![addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn asset_transfer_with_clawback_and_close() {
        let mut txn = Transaction::asset_transfer(addr(1), addr(2), 5, 1);
        if let TxnBody::AssetTransfer(x) = &mut txn.body {
            x.asset_sender = addr(4);
            x.close_to = addr(3);
        }
        let stxn = SignedTxnWithAd::new(txn);
        assert_eq!(
            participants(&stxn, false),
            vec![addr(1), addr(4), addr(2), addr(3)]
        );
    }

    #[test]
    fn freeze_and_app_accounts() {
        let frz = SignedTxnWithAd::new(Transaction::new(
            addr(1),
            TxnBody::AssetFreeze(AssetFreezeFields {
                freeze_account: addr(9),
                freeze_asset: 3,
                frozen: true,
            }),
        ));
        assert_eq!(participants(&frz, false), vec![addr(1), addr(9)]);

        let app = app_call(1, vec![addr(5), addr(6), addr(5)]);
        assert_eq!(
            participants(&app, false),
            vec![addr(1), addr(5), addr(6), addr(5)]
        );
        assert_eq!(unique_participants(&app, false).len(), 3);
    }

    #[test]
    fn inner_transactions_depth_first() {
        let grandchild = SignedTxnWithAd::inner(Transaction::payment(addr(20), addr(21), 1));
        let child_a = with_inner(
            SignedTxnWithAd::inner(Transaction::payment(addr(10), addr(11), 1)),
            vec![grandchild],
        );
        let child_b = SignedTxnWithAd::inner(Transaction::payment(addr(30), addr(31), 1));
        let root = with_inner(app_call(1, vec![]), vec![child_a, child_b]);

        assert_eq!(participants(&root, false), vec![addr(1)]);
        assert_eq!(
            participants(&root, true),
            vec![addr(1), addr(10), addr(11), addr(20), addr(21), addr(30), addr(31)]
        );
    }

    #[test]
    fn nesting_beyond_limit_is_not_walked() {
        let mut node = SignedTxnWithAd::inner(Transaction::payment(addr(99), addr(99), 0));
        for _ in 0..MAX_INNER_DEPTH {
            node = with_inner(app_call(2, vec![]), vec![node]);
        }
        // Depth MAX_INNER_DEPTH is still reachable.
        assert!(participants(&node, true).contains(&addr(99)));

        let too_deep = with_inner(app_call(2, vec![]), vec![node]);
        assert!(!participants(&too_deep, true).contains(&addr(99)));
    }
}
