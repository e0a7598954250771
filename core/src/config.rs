//! JSON configuration loading: the `config`, `coins` and optional `schedule`
//! top-level keys of the driver's configuration file.

use std::path::Path;
use std::str::FromStr;

use bitcoin::secp256k1::SecretKey;
use bitcoin::{OutPoint, PrivateKey, ScriptBuf, Txid};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::fee::{FeeProducer, FeeSpec};
use crate::schedule::{Schedule, ScheduleOp, SchedulePhase};
use crate::splitter::SplitterConfig;
use crate::utxo::Utxo;
use crate::wire::{parse_magic, REGTEST_MAGIC};

/// Absolute-vs-offset cutover for schedule times, per spec: any time at or
/// above this is treated as a Unix timestamp, anything below as an offset
/// (in seconds) from process start.
const ABSOLUTE_TIME_CUTOVER: u64 = 1_567_000_000;

fn default_split_per_tx() -> u64 {
    23
}
fn default_default_port() -> u16 {
    18444
}
fn default_min_utxos() -> u64 {
    4_000_000
}
fn default_max_threads() -> u64 {
    10
}
fn default_bitcoind() -> String {
    "127.0.0.1:18444".to_string()
}
fn default_net() -> String {
    "regtest".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFee {
    Constant(u64),
    Range([u64; 2]),
}

impl From<RawFee> for FeeSpec {
    fn from(raw: RawFee) -> Self {
        match raw {
            RawFee::Constant(f) => FeeSpec::Constant(f),
            RawFee::Range([min, max]) => FeeSpec::Range(min, max),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    fee: Option<RawFee>,
    #[serde(default = "default_split_per_tx")]
    split_per_tx: u64,
    #[serde(default = "default_default_port")]
    default_port: u16,
    #[serde(default = "default_min_utxos")]
    min_utxos: u64,
    #[serde(default = "default_max_threads")]
    max_threads: u64,
    #[serde(default = "default_bitcoind")]
    bitcoind: String,
    net_magic: Option<String>,
    #[serde(default = "default_net")]
    net: String,
}

// `txid`/`vout`/... etc below are mandatory per spec.md §6, but are kept
// `Option` here rather than required fields: `serde_json` reports a missing
// field with the same `serde_json::Error` type as a genuine JSON-syntax
// failure, and `driver::main` treats `Error::Json` as an invariant violation
// (abort -- spec.md §7). A document that is syntactically valid JSON but
// simply omits `host` on a schedule target is a **configuration** error
// (log + exit nonzero), not a parse failure, so presence is checked by hand
// in `parse_coin`/`parse_target`/`parse_phase` below and reported as
// `Error::Config` instead of being allowed to surface as `Error::Json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCoin {
    txid: Option<String>,
    vout: Option<u32>,
    satoshi: Option<u64>,
    priv_key: Option<String>,
    script_pub_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    host: Option<String>,
    rate: Option<u64>,
    #[serde(default)]
    rate_end: Option<u64>,
    fee: Option<RawFee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhase {
    name: Option<String>,
    start: Option<u64>,
    end: Option<u64>,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    config: RawConfig,
    coins: Vec<RawCoin>,
    schedule: Option<Vec<RawPhase>>,
}

/// The four node families this driver is permitted to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Net {
    Regtest,
    Testnet,
    ChainNol,
    Mainnet,
}

impl FromStr for Net {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "regtest" => Ok(Net::Regtest),
            "testnet" => Ok(Net::Testnet),
            "chain_nol" => Ok(Net::ChainNol),
            "mainnet" => Ok(Net::Mainnet),
            other => Err(Error::Config(format!("unknown net '{other}'"))),
        }
    }
}

/// A fully parsed, validated configuration.
#[derive(Debug)]
pub struct Config {
    pub splitter: SplitterConfig,
    pub default_fee: FeeProducer,
    pub bitcoind: String,
    pub net: Net,
    pub seed_coins: Vec<Utxo>,
    pub schedule: Option<Schedule>,
}

impl Config {
    /// Load and validate the configuration document at `path`.
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Json`]
    /// only for a genuine JSON-syntax failure (the driver maps this to an
    /// abort -- spec.md §7 treats it as an invariant violation), and
    /// [`Error::Config`]/[`Error::InvalidAddress`] for every other problem
    /// (missing mandatory field, unknown `net`, malformed coin/WIF value) --
    /// the driver maps all of those, and a missing file, to exit code `-1`.
    /// Mandatory fields of `coins[]` and `schedule[]` entries are parsed as
    /// `Option` and checked by hand in `parse_coin`/`parse_phase`/
    /// `parse_target` precisely so that omitting one is a configuration
    /// error rather than indistinguishable from broken JSON syntax.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)?;
        let doc: RawDocument = serde_json::from_str(&raw)?;
        Config::from_raw(doc)
    }

    fn from_raw(doc: RawDocument) -> Result<Config> {
        let net = Net::from_str(&doc.config.net)?;
        let magic = match &doc.config.net_magic {
            Some(hex_str) => parse_magic(hex_str)?,
            None => REGTEST_MAGIC,
        };

        let default_fee = match doc.config.fee {
            Some(raw) => {
                let spec: FeeSpec = raw.into();
                match spec {
                    FeeSpec::Constant(f) => FeeProducer::constant(f),
                    FeeSpec::Range(min, max) => FeeProducer::range(min, max),
                }
            }
            None => FeeProducer::constant(0),
        };

        let seed_coins = doc
            .coins
            .into_iter()
            .map(parse_coin)
            .collect::<Result<Vec<_>>>()?;

        let schedule = match doc.schedule {
            Some(phases) => Some(parse_schedule(phases)?),
            None => None,
        };

        let splitter = SplitterConfig {
            split_per_tx: doc.config.split_per_tx as usize,
            min_utxos: doc.config.min_utxos as usize,
            max_threads: doc.config.max_threads as usize,
            default_port: doc.config.default_port,
            magic,
        };

        Ok(Config {
            splitter,
            default_fee,
            bitcoind: doc.config.bitcoind,
            net,
            seed_coins,
            schedule,
        })
    }
}

/// Pull a mandatory field out of its `Option`, reporting absence as a
/// configuration error rather than letting it surface as a JSON parse
/// failure -- see the note above `RawCoin`.
fn require<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::Config(format!("missing mandatory field '{name}'")))
}

fn parse_coin(raw: RawCoin) -> Result<Utxo> {
    let txid_str = require(raw.txid, "coins[].txid")?;
    let vout = require(raw.vout, "coins[].vout")?;
    let satoshi = require(raw.satoshi, "coins[].satoshi")?;
    let priv_key_str = require(raw.priv_key, "coins[].privKey")?;
    let script_pub_key = require(raw.script_pub_key, "coins[].scriptPubKey")?;

    // The RPC-conventional display txid is byte-reversed relative to wire
    // order; `Txid::from_str` already accounts for that.
    let txid = Txid::from_str(&txid_str).map_err(|e| Error::Config(format!("bad txid: {e}")))?;
    let prevout = OutPoint::new(txid, vout);

    let priv_key = PrivateKey::from_wif(&priv_key_str)
        .map_err(|e| Error::Config(format!("bad WIF privKey: {e}")))?;
    let secret_key: SecretKey = priv_key.inner;

    let script_bytes = hex::decode(&script_pub_key)?;
    let constraint_script = ScriptBuf::from_bytes(script_bytes);

    Ok(Utxo::new(prevout, satoshi, constraint_script, secret_key))
}

fn parse_schedule(phases: Vec<RawPhase>) -> Result<Schedule> {
    let parsed = phases
        .into_iter()
        .map(parse_phase)
        .collect::<Result<Vec<_>>>()?;
    Ok(Schedule { phases: parsed })
}

fn parse_phase(phase: RawPhase) -> Result<SchedulePhase> {
    let name = require(phase.name, "schedule[].name")?;
    let start = require(phase.start, "schedule[].start")?;
    let end = require(phase.end, "schedule[].end")?;
    let targets = phase
        .targets
        .into_iter()
        .map(parse_target)
        .collect::<Result<Vec<_>>>()?;
    Ok(SchedulePhase {
        name,
        start_time: resolve_time(start),
        end_time: resolve_time(end),
        targets,
    })
}

fn parse_target(t: RawTarget) -> Result<ScheduleOp> {
    let host = require(t.host, "schedule[].targets[].host")?;
    let rate = require(t.rate, "schedule[].targets[].rate")?;
    let fee = match t.fee {
        Some(raw) => {
            let spec: FeeSpec = raw.into();
            match spec {
                FeeSpec::Constant(f) => FeeProducer::constant(f),
                FeeSpec::Range(min, max) => FeeProducer::range(min, max),
            }
        }
        None => FeeProducer::constant(0),
    };
    Ok(ScheduleOp {
        host,
        rate_begin: rate,
        rate_end: t.rate_end.unwrap_or(rate),
        fee,
    })
}

/// Absolute Unix timestamps (>= [`ABSOLUTE_TIME_CUTOVER`]) are converted to
/// an offset from now; anything smaller is already an offset.
fn resolve_time(t: u64) -> u64 {
    if t >= ABSOLUTE_TIME_CUTOVER {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        t.saturating_sub(now)
    } else {
        t
    }
}
