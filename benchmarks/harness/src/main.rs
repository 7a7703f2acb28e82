//! alr-bench-harness
//!
//! Run small end-to-end benchmarks (generate -> settle -> verify -> reduce)
//! and append CSV rows into `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p alr-bench-harness -- --profile configs/profiles/small.toml
//!   cargo run -p alr-bench-harness -- --profile configs/profiles/medium.toml --proofs off

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use alr_core::generator::generate_backlog;
use alr_core::{chain_from_batches, AccountId, ActionSource, MemorySource, TokenId};
use alr_crypto::{empty_action_state, Field};
use alr_merkle::MerkleMap;
use alr_reducer::{BatchReducer, ReducerCells, ReducerParams};
use alr_rollup::{RollupParams, RollupProgram};

#[derive(Debug, Deserialize)]
struct Profile {
    /// Dispatched updates in the synthetic backlog
    updates: u32,
    /// Maximum actions per update
    max_actions: u8,
    /// Key-space size (keys are drawn from 1..=keys)
    keys: u64,
    /// Action slots per reducer transaction
    batch_size: usize,
    /// Repetitions of the whole pipeline
    repeats: u32,
}

fn parse_flag(name: &str, default: &str) -> String {
    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        if k == format!("--{name}") {
            return it.next().unwrap_or_else(|| default.to_string());
        }
    }
    default.to_string()
}

fn dur_ms(d: Duration) -> u128 {
    d.as_millis()
}

fn main() -> Result<()> {
    let profile_path = PathBuf::from(parse_flag("profile", "configs/profiles/small.toml"));
    let proofs_str = parse_flag("proofs", "on");
    let proofs_enabled = match proofs_str.as_str() {
        "on" => true,
        "off" => false,
        other => anyhow::bail!("unknown --proofs {other} (use on|off)"),
    };

    let profile_src = fs::read_to_string(&profile_path)
        .with_context(|| format!("read profile {:?}", profile_path))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    println!(
        "Profile: updates={}, max_actions={}, keys={}, batch_size={}, repeats={}, proofs={proofs_str}",
        profile.updates, profile.max_actions, profile.keys, profile.batch_size, profile.repeats
    );

    fs::create_dir_all("benchmarks/reports").ok();

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let csv_path = PathBuf::from(format!("benchmarks/reports/bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)?;
    writeln!(
        csv,
        "timestamp,proofs,updates,max_actions,keys,batch_size,repeat,stage,ms,extra"
    )?;

    let rollup_params = RollupParams {
        max_actions_per_update: usize::from(profile.max_actions),
        proofs_enabled,
        ..RollupParams::default()
    };
    let program = RollupProgram::new(rollup_params);

    let mut reducer_params = ReducerParams::new(profile.batch_size);
    reducer_params.max_actions_per_update = usize::from(profile.max_actions);
    reducer_params.proofs_enabled = proofs_enabled;
    let reducer = BatchReducer::new(reducer_params)?;

    for rep in 0..profile.repeats {
        // 1) generate backlog
        let t0 = Instant::now();
        let backlog = generate_backlog(profile.updates, profile.max_actions, profile.keys, 42);
        let t_gen = t0.elapsed();
        let n_actions: usize = backlog.iter().map(Vec::len).sum();
        writeln!(
            csv,
            "{ts},{proofs_str},{},{},{},{},{rep},gen,{},n_actions={n_actions}",
            profile.updates,
            profile.max_actions,
            profile.keys,
            profile.batch_size,
            dur_ms(t_gen)
        )?;

        // 2) settle: fold the whole backlog into a fresh map
        let chain = chain_from_batches(empty_action_state(), backlog.iter().cloned());
        let mut tree = MerkleMap::new(rollup_params.tree_height())?;
        let t0 = Instant::now();
        let proof = program.prove(&mut tree, &chain)?;
        let t_settle = t0.elapsed();
        let proof_bytes = serde_json::to_vec(&proof)?.len();
        writeln!(
            csv,
            "{ts},{proofs_str},{},{},{},{},{rep},settle,{},root={} proof_bytes={proof_bytes}",
            profile.updates,
            profile.max_actions,
            profile.keys,
            profile.batch_size,
            dur_ms(t_settle),
            proof.public_output.root
        )?;

        // 3) verify (only with proofs on; the bare fold emits a dummy)
        if proofs_enabled {
            let t0 = Instant::now();
            proof.verify(program.vk())?;
            let t_verify = t0.elapsed();
            writeln!(
                csv,
                "{ts},{proofs_str},{},{},{},{},{rep},verify,{},",
                profile.updates,
                profile.max_actions,
                profile.keys,
                profile.batch_size,
                dur_ms(t_verify)
            )?;
        }

        // 4) reduce: dispatch the same backlog and process every planned batch
        let account = AccountId(Field::from(1));
        let token = TokenId::default();
        let mut source = MemorySource::new();
        for batch in backlog {
            reducer.dispatch(&mut source, account, token, batch)?;
        }
        let mut cells = ReducerCells::deploy();
        let t0 = Instant::now();
        let mut batches_run = 0usize;
        let mut applied = 0usize;
        loop {
            let planned = reducer.prepare_batches(&source, &cells, account, token)?;
            if planned.is_empty() {
                break;
            }
            for prepared in &planned {
                let ledger = source.ledger_action_state(account, token)?;
                reducer.process_batch(&mut cells, ledger, prepared, |_, is_dummy, _| {
                    if !is_dummy {
                        applied += 1;
                    }
                    Ok(())
                })?;
                batches_run += 1;
            }
        }
        let t_reduce = t0.elapsed();
        writeln!(
            csv,
            "{ts},{proofs_str},{},{},{},{},{rep},reduce,{},batches={batches_run} applied={applied}",
            profile.updates,
            profile.max_actions,
            profile.keys,
            profile.batch_size,
            dur_ms(t_reduce)
        )?;
    }

    println!("Wrote report → {}", csv_path.display());
    Ok(())
}
