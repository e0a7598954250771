//! Builds and signs multi-input/multi-output transactions spending a slice
//! of [`Utxo`]s into another slice of (not-yet-spendable) `Utxo`s.

use bitcoin::absolute::LockTime;
use bitcoin::opcodes::all::OP_DUP;
use bitcoin::script::Builder;
use bitcoin::secp256k1::{Message, Secp256k1, Signing, Verification};
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::sighash::{forkid_signature_hash, SIGHASH_ALL, SIGHASH_FORKID};
use crate::utxo::Utxo;

/// Fixed protocol version stamped on every transaction this driver produces.
pub const TX_VERSION: i32 = 2;

/// Build and sign a transaction spending `inputs` into `outputs`, charging
/// `fee` satoshis.
///
/// Returns `None` (does not mutate `outputs`) if `fee` exceeds the summed
/// input value, or if the per-output share after fee would round to zero --
/// these are the "insufficient value" condition of the spec, reported to
/// the caller as a plain bool/Option rather than an error. Any rounding
/// remainder from splitting `in_qty - fee` across `outputs.len()` shares is
/// absorbed as additional fee, not redistributed.
///
/// On success, each entry of `outputs` is mutated in place: its
/// `constraint_script` is (re)computed, its `satoshi` set to the per-output
/// share, and its `prevout` stamped with `(txid, index)` of the transaction
/// just built -- making it immediately spendable by a later `build` call.
///
/// Signing uses `SIGHASH_ALL | SIGHASH_FORKID` as required by the target
/// node family (see [`crate::sighash`]). Signing is not expected to fail for
/// well-formed inputs; if it does, this is treated as an invariant
/// violation and the process aborts rather than returning an error.
pub fn build<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    inputs: &mut [Utxo],
    outputs: &mut [Utxo],
    fee: u64,
) -> Option<Transaction> {
    let in_qty: u64 = inputs.iter().map(|u| u.satoshi).sum();
    if fee > in_qty {
        return None;
    }

    let num_outputs = outputs.len() as u64;
    let out_qty = (in_qty - fee) / num_outputs;
    if out_qty == 0 {
        return None;
    }

    let tx_inputs: Vec<TxIn> = inputs
        .iter()
        .map(|u| TxIn {
            previous_output: u.prevout,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        })
        .collect();

    let tx_outputs: Vec<TxOut> = outputs
        .iter_mut()
        .enumerate()
        .map(|(idx, u)| {
            let script = u.create_p2pkh(secp);
            u.satoshi = out_qty;
            u.prevout = OutPoint::new(u.prevout.txid, idx as u32);
            TxOut {
                value: bitcoin::Amount::from_sat(out_qty),
                script_pubkey: script,
            }
        })
        .collect();

    let mut tx = Transaction {
        version: Version(TX_VERSION),
        lock_time: LockTime::ZERO,
        input: tx_inputs,
        output: tx_outputs,
    };

    let sighash_type = SIGHASH_ALL | SIGHASH_FORKID;
    for (i, input) in inputs.iter_mut().enumerate() {
        let sighash = forkid_signature_hash(&tx, i, &input.constraint_script, input.satoshi, sighash_type);
        let msg = Message::from_digest_slice(sighash.as_ref()).unwrap_or_else(|e| {
            log::error!("sighash message construction failed: {e}");
            std::process::abort();
        });
        let sig = secp.sign_ecdsa(&msg, &input.priv_key);

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(sighash_type as u8);

        let pub_key = input.pub_key(secp);
        let script_sig = if input.constraint_script.as_bytes().first() == Some(&OP_DUP.to_u8()) {
            Builder::new()
                .push_slice(sig_bytes.as_slice())
                .push_slice(pub_key.to_bytes().as_slice())
                .into_script()
        } else {
            Builder::new().push_slice(sig_bytes.as_slice()).into_script()
        };

        tx.input[i].script_sig = script_sig;
    }

    let txid = tx.compute_txid();
    for output in outputs.iter_mut() {
        output.prevout.txid = txid;
    }

    Some(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    fn fresh_utxo(secp: &Secp256k1<bitcoin::secp256k1::All>, satoshi: u64) -> Utxo {
        let priv_key = SecretKey::new(&mut rand::rngs::OsRng);
        let mut u = Utxo::new(OutPoint::null(), satoshi, ScriptBuf::new(), priv_key);
        u.create_p2pkh(secp);
        u
    }

    #[test]
    fn zero_fee_one_to_one_regtest() {
        let secp = Secp256k1::new();
        let mut inputs = vec![fresh_utxo(&secp, 100_000_000)];
        let mut outputs = vec![fresh_utxo(&secp, 0)];

        let tx = build(&secp, &mut inputs, &mut outputs, 0).expect("build should succeed");
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value.to_sat(), 100_000_000);
        assert_eq!(outputs[0].satoshi, 100_000_000);
        assert_eq!(outputs[0].prevout.txid, tx.compute_txid());
    }

    #[test]
    fn insufficient_value_is_reported_as_none() {
        let secp = Secp256k1::new();
        let mut inputs = vec![fresh_utxo(&secp, 100)];
        let mut outputs = vec![fresh_utxo(&secp, 0)];

        let result = build(&secp, &mut inputs, &mut outputs, 200);
        assert!(result.is_none());
    }

    #[test]
    fn fee_and_outputs_balance() {
        let secp = Secp256k1::new();
        let mut inputs = vec![fresh_utxo(&secp, 10_000), fresh_utxo(&secp, 5_000)];
        let mut outputs = vec![fresh_utxo(&secp, 0), fresh_utxo(&secp, 0), fresh_utxo(&secp, 0)];

        let tx = build(&secp, &mut inputs, &mut outputs, 300).expect("build should succeed");
        let in_total: u64 = inputs.iter().map(|u| u.satoshi).sum();
        let out_total: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert!(in_total - out_total >= 300);
        let expected_share = (15_000 - 300) / 3;
        for o in &tx.output {
            assert_eq!(o.value.to_sat(), expected_share);
        }
    }

    #[test]
    fn p2pk_script_sig_has_no_pubkey_push() {
        // A constraint script that does not start with OP_DUP is treated as P2PK:
        // the signature script contains only the signature push.
        let secp = Secp256k1::new();
        let priv_key = SecretKey::new(&mut rand::rngs::OsRng);
        let mut input = Utxo::new(OutPoint::null(), 50_000, ScriptBuf::new(), priv_key);
        let pub_key = input.pub_key(&secp);
        input.constraint_script = Builder::new()
            .push_slice(pub_key.to_bytes().as_slice())
            .push_opcode(bitcoin::opcodes::all::OP_CHECKSIG)
            .into_script();

        let mut inputs = vec![input];
        let mut outputs = vec![fresh_utxo(&secp, 0)];
        let tx = build(&secp, &mut inputs, &mut outputs, 0).expect("build should succeed");

        // Only one push (the signature) should be in the scriptSig.
        let instructions: Vec<_> = tx.input[0].script_sig.instructions().collect();
        assert_eq!(instructions.len(), 1);
    }
}
