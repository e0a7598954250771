//! The UTXO value type: a spendable output and its spending key.

use bitcoin::hashes::Hash;
use bitcoin::key::PublicKey;
use bitcoin::opcodes::all::{OP_CHECKSIG, OP_EQUALVERIFY, OP_HASH160};
use bitcoin::script::Builder;
use bitcoin::secp256k1::{Secp256k1, SecretKey, Signing};
use bitcoin::{OutPoint, ScriptBuf};

/// A spendable output together with the private key that can spend it.
///
/// Ownership: once a `Utxo` has been consumed as a transaction input and the
/// spending transaction signed, it must not be reused. Each generator worker
/// owns a disjoint slice of the pool and is the sole mutator of its slice --
/// there is no internal locking here, by design (see the scheduler and
/// worker modules for the partitioning discipline that makes this safe).
#[derive(Debug, Clone)]
pub struct Utxo {
    /// (txid, vout) of the parent transaction output this UTXO represents.
    pub prevout: OutPoint,
    /// Amount in satoshis.
    pub satoshi: u64,
    /// The output's scriptPubKey -- the spending condition.
    pub constraint_script: ScriptBuf,
    /// The private scalar that spends this output.
    pub priv_key: SecretKey,
    /// Cached public key, filled lazily by [`Utxo::pub_key`].
    pub_key: Option<PublicKey>,
}

impl Utxo {
    /// Construct a UTXO from its parent outpoint, amount, locking script and key.
    pub fn new(prevout: OutPoint, satoshi: u64, constraint_script: ScriptBuf, priv_key: SecretKey) -> Self {
        Utxo {
            prevout,
            satoshi,
            constraint_script,
            priv_key,
            pub_key: None,
        }
    }

    /// Construct a fresh UTXO-shaped placeholder with a newly generated key
    /// and no script yet assigned. Used by the splitter to allocate output
    /// buffers before a `createP2PKH` pass fills in the script.
    pub fn new_keyed<C: Signing>(secp: &Secp256k1<C>) -> Self {
        let priv_key = SecretKey::new(&mut rand::rngs::OsRng);
        let pub_key = PublicKey::new(priv_key.public_key(secp));
        Utxo {
            prevout: OutPoint::null(),
            satoshi: 0,
            constraint_script: ScriptBuf::new(),
            priv_key,
            pub_key: Some(pub_key),
        }
    }

    /// Generate a fresh private key for this UTXO and precompute its public
    /// key. Used by the splitter's parallel keygen pass -- a fresh
    /// nondeterministic keygen source is drawn per UTXO.
    pub fn regenerate_key<C: Signing>(&mut self, secp: &Secp256k1<C>) {
        self.priv_key = SecretKey::new(&mut rand::rngs::OsRng);
        self.pub_key = Some(PublicKey::new(self.priv_key.public_key(secp)));
    }

    /// Return the cached public key, deriving it from `priv_key` if this is
    /// the first call.
    pub fn pub_key<C: Signing>(&mut self, secp: &Secp256k1<C>) -> PublicKey {
        if let Some(pk) = self.pub_key {
            return pk;
        }
        let pk = PublicKey::new(self.priv_key.public_key(secp));
        self.pub_key = Some(pk);
        pk
    }

    /// (Re)generate this UTXO's P2PKH constraint script --
    /// `DUP HASH160 <pubkey_hash> EQUALVERIFY CHECKSIG` -- and cache it.
    pub fn create_p2pkh<C: Signing>(&mut self, secp: &Secp256k1<C>) -> ScriptBuf {
        let pub_key = self.pub_key(secp);
        let hash = bitcoin::hashes::hash160::Hash::hash(&pub_key.to_bytes());
        let script = Builder::new()
            .push_opcode(bitcoin::opcodes::all::OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(hash.to_byte_array())
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        self.constraint_script = script.clone();
        script
    }

    /// The (txid, vout) this UTXO is spendable at.
    pub fn outpoint(&self) -> OutPoint {
        self.prevout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_script_has_expected_shape() {
        let secp = Secp256k1::new();
        let mut utxo = Utxo::new_keyed(&secp);
        let script = utxo.create_p2pkh(&secp);
        let bytes = script.as_bytes();
        assert_eq!(bytes[0], bitcoin::opcodes::all::OP_DUP.to_u8());
        assert_eq!(bytes[1], OP_HASH160.to_u8());
        assert_eq!(bytes[2], 20); // push 20-byte hash
        assert_eq!(bytes[3 + 20], OP_EQUALVERIFY.to_u8());
        assert_eq!(bytes[4 + 20], OP_CHECKSIG.to_u8());
    }

    #[test]
    fn pub_key_is_cached() {
        let secp = Secp256k1::new();
        let mut utxo = Utxo::new_keyed(&secp);
        let first = utxo.pub_key(&secp);
        let second = utxo.pub_key(&secp);
        assert_eq!(first, second);
    }
}
