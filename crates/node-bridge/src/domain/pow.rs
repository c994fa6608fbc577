//! # Proof-of-Work Miner
//!
//! The work score of a block is the number of leading zero bits of the
//! double SHA-256 of its encoding. The encoding ends with the nonce, so the
//! search hashes `prefix || nonce_le` where `prefix` is the encoding minus its
//! last eight bytes.
//!
//! ## Retargeting
//!
//! A block must reference fresh parents to be accepted. When a tip refresher
//! is available, each search is bounded by the refresh interval; on timeout
//! the parents are replaced, the prefix re-encoded and the search restarted.

use crate::error::{BridgeError, Result};
use crate::ports::LedgerCodec;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared_types::{Block, BlockId, ProtocolParameters};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Length of the nonce at the end of an encoded block.
pub const NONCE_BYTES: usize = 8;

/// Nonces tried between two checks of the stop flags.
const STOP_CHECK_INTERVAL: u64 = 1 << 12;

/// Source of fresh parents for a block under construction.
#[async_trait]
pub trait TipRefresher: Send + Sync {
    /// Fetch tips to use as strong parents.
    async fn refresh_tips(&self) -> Result<Vec<BlockId>>;
}

/// Compute double SHA-256 hash
#[inline]
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

/// Number of leading zero bits of `sha256d(data)`.
pub fn work_score(data: &[u8]) -> u32 {
    leading_zero_bits(&sha256d(data))
}

fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Multi-threaded nonce search.
#[derive(Clone, Debug)]
pub struct PowMiner {
    num_threads: usize,
}

impl PowMiner {
    /// Create a miner using `num_threads` search threads.
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Number of search threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Search for a nonce such that `prefix || nonce_le` reaches `target`.
    ///
    /// Blocks the calling thread. Returns `None` if `stop` was raised first.
    pub fn mine(&self, prefix: &[u8], target: u32, stop: &AtomicBool) -> Option<u64> {
        let found = AtomicBool::new(false);
        let result_nonce = AtomicU64::new(0);

        // Divide nonce space across threads
        let threads = self.num_threads as u64;
        let range_per_thread = u64::MAX / threads;

        std::thread::scope(|scope| {
            for thread_id in 0..threads {
                let found = &found;
                let result_nonce = &result_nonce;

                scope.spawn(move || {
                    let start = thread_id * range_per_thread;
                    let end = if thread_id == threads - 1 {
                        u64::MAX
                    } else {
                        start + range_per_thread
                    };

                    let mut data = Vec::with_capacity(prefix.len() + NONCE_BYTES);
                    data.extend_from_slice(prefix);
                    data.extend_from_slice(&[0u8; NONCE_BYTES]);
                    let nonce_at = prefix.len();

                    for (tried, nonce) in (start..end).enumerate() {
                        if tried as u64 % STOP_CHECK_INTERVAL == 0
                            && (found.load(Ordering::Relaxed) || stop.load(Ordering::Relaxed))
                        {
                            break;
                        }

                        data[nonce_at..].copy_from_slice(&nonce.to_le_bytes());
                        if work_score(&data) >= target {
                            if found
                                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                                .is_ok()
                            {
                                result_nonce.store(nonce, Ordering::Release);
                            }
                            break;
                        }
                    }
                });
            }
        });

        found
            .load(Ordering::Acquire)
            .then(|| result_nonce.load(Ordering::Acquire))
    }
}

enum SearchOutcome {
    Found(u64),
    TimedOut,
    Cancelled,
}

/// Do the proof-of-work required by `api.min_pow_score` and store the nonce
/// in `block`.
///
/// Fetches initial parents through `refresh_tips` if the block has none.
/// Returns the size of the encoded block.
pub async fn do_pow(
    cancel: &CancellationToken,
    block: &mut Block,
    codec: &dyn LedgerCodec,
    api: &ProtocolParameters,
    parallelism: usize,
    refresh_tips_interval: Duration,
    refresh_tips: Option<&dyn TipRefresher>,
) -> Result<usize> {
    if block.strong_parents.is_empty() {
        let refresher = refresh_tips.ok_or(BridgeError::ParentsNotGiven)?;
        block.strong_parents = refresher.refresh_tips().await?;
    }

    if api.min_pow_score == 0 {
        block.nonce = 0;
        return Ok(codec.encode_block(block, api)?.len());
    }

    if cancel.is_cancelled() {
        return Err(BridgeError::OperationAborted);
    }

    let mut prefix = pow_prefix(codec, block, api)?;
    let timeout = refresh_tips.map(|_| refresh_tips_interval);

    loop {
        let outcome = search(cancel, prefix.clone(), api.min_pow_score, parallelism, timeout).await?;

        match outcome {
            SearchOutcome::Found(nonce) => {
                block.nonce = nonce;
                info!(nonce, target = api.min_pow_score, "PoW done");
                return Ok(prefix.len() + NONCE_BYTES);
            }
            SearchOutcome::Cancelled => return Err(BridgeError::OperationAborted),
            SearchOutcome::TimedOut => {
                if cancel.is_cancelled() {
                    return Err(BridgeError::OperationAborted);
                }
                let Some(refresher) = refresh_tips else {
                    return Err(BridgeError::Internal("PoW timed out without a tip refresher".into()));
                };

                debug!("PoW took too long, refreshing tips");
                block.strong_parents = match refresher.refresh_tips().await {
                    Ok(tips) => tips,
                    Err(_) if cancel.is_cancelled() => return Err(BridgeError::OperationAborted),
                    Err(e) => return Err(e),
                };
                prefix = pow_prefix(codec, block, api)?;
            }
        }
    }
}

/// Encoded block without its trailing nonce.
fn pow_prefix(codec: &dyn LedgerCodec, block: &Block, api: &ProtocolParameters) -> Result<Vec<u8>> {
    let mut data = codec
        .encode_block(block, api)
        .map_err(|e| BridgeError::Encode(format!("unable to perform PoW as block can't be serialized: {e}")))?;

    if data.len() < NONCE_BYTES {
        return Err(BridgeError::Encode("encoded block shorter than its nonce".into()));
    }
    data.truncate(data.len() - NONCE_BYTES);
    Ok(data)
}

async fn search(
    cancel: &CancellationToken,
    prefix: Vec<u8>,
    target: u32,
    parallelism: usize,
    timeout: Option<Duration>,
) -> Result<SearchOutcome> {
    let stop = Arc::new(AtomicBool::new(false));
    let miner_stop = stop.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        PowMiner::new(parallelism).mine(&prefix, target, &miner_stop)
    });

    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = cancel.cancelled() => {
            stop.store(true, Ordering::Relaxed);
            let _ = handle.await;
            return Ok(SearchOutcome::Cancelled);
        }
        _ = deadline => {
            stop.store(true, Ordering::Relaxed);
            handle.await
        }
    };

    match joined.map_err(|e| BridgeError::Internal(format!("PoW worker failed: {e}")))? {
        Some(nonce) => Ok(SearchOutcome::Found(nonce)),
        None => Ok(SearchOutcome::TimedOut),
    }
}
