// crates/alr-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use alr_core::{
    chain_from_batches, AccountId, Action, ActionSource, MemorySource, StateCommitments, TokenId,
};
use alr_crypto::{empty_action_state, Field};
use alr_merkle::MerkleMap;
use alr_reducer::{BatchReducer, ReducerCells, ReducerParams};
use alr_rollup::{apply_actions, RollupParams, RollupProgram, RollupProof};
use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "alr-cli",
    about = "Action-log rollup reference CLI",
    long_about = "Action-log rollup reference CLI.\n\nUse this tool to generate action backlogs, settle them into a Merkle map with a fold proof, verify settlement artifacts, and run the batch reducer end to end.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Generate a synthetic backlog of dispatched action updates.
    Generate {
        /// Number of dispatched updates (>0)
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
        updates: u32,

        /// Maximum actions per update (>0)
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..))]
        max_actions: u8,

        /// Size of the key space; keys are drawn from 1..=keys (key 0 is reserved)
        #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u64).range(1..))]
        keys: u64,

        /// RNG seed for reproducible backlogs
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output path for the backlog (JSON)
        #[arg(long, default_value = "actions.json")]
        out: PathBuf,
    },

    /// Print the action-state head a backlog file chains up to.
    Head {
        /// Input path to the backlog (JSON)
        #[arg(long)]
        actions: PathBuf,
    },

    /// Settle a backlog into a fresh Merkle map and write a proof artifact.
    Settle {
        /// Input path to the backlog (JSON)
        #[arg(long)]
        actions: PathBuf,

        /// Output path for the settlement artifact (JSON)
        #[arg(long, default_value = "settlement.json")]
        out: PathBuf,

        /// Pending updates folded per proof window
        #[arg(long, default_value_t = 22)]
        max_actions_per_proof: usize,

        /// Actions allowed in a single dispatched update
        #[arg(long, default_value_t = 4)]
        max_actions_per_update: usize,

        /// Log2 of the map's leaf capacity
        #[arg(long, default_value_t = 30)]
        log_capacity: u32,

        /// Run the fold without attesting proofs (artifact cannot be verified)
        #[arg(long, default_value_t = false)]
        no_proofs: bool,
    },

    /// Verify a settlement artifact, optionally replaying its backlog.
    Verify {
        /// Input path to the settlement artifact (JSON)
        #[arg(long)]
        proof: PathBuf,

        /// Optional backlog to replay against the artifact's commitments
        #[arg(long)]
        actions: Option<PathBuf>,
    },

    /// Run the batch reducer over a backlog and print the final cells.
    Reduce {
        /// Input path to the backlog (JSON)
        #[arg(long)]
        actions: PathBuf,

        /// Action slots processed per transaction (>0)
        #[arg(long, default_value_t = 5)]
        batch_size: usize,

        /// Plan and process without attesting stack proofs
        #[arg(long, default_value_t = false)]
        no_proofs: bool,
    },
}

/// On-disk settlement artifact: the parameter set the program was compiled
/// with, the claimed endpoints, and one fold proof per window tying them
/// together. Each window's statement covers only its own slice of the
/// backlog, so the proofs are kept as a chain: verification walks them from
/// `initial` to `settled`.
#[derive(Debug, Serialize, Deserialize)]
struct SettlementArtifact {
    params: RollupParams,
    initial: StateCommitments,
    settled: StateCommitments,
    proofs: Vec<RollupProof>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Generate {
            updates,
            max_actions,
            keys,
            seed,
            out,
        } => generate(updates, max_actions, keys, seed, out),

        Cmd::Head { actions } => head(actions),

        Cmd::Settle {
            actions,
            out,
            max_actions_per_proof,
            max_actions_per_update,
            log_capacity,
            no_proofs,
        } => settle(
            actions,
            out,
            max_actions_per_proof,
            max_actions_per_update,
            log_capacity,
            no_proofs,
        ),

        Cmd::Verify { proof, actions } => verify(proof, actions),

        Cmd::Reduce {
            actions,
            batch_size,
            no_proofs,
        } => reduce(actions, batch_size, no_proofs),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn generate(updates: u32, max_actions: u8, keys: u64, seed: u64, out: PathBuf) -> Result<()> {
    use alr_core::generator::generate_backlog;

    info!(updates, max_actions, keys, seed, "generating synthetic action backlog");
    let backlog = generate_backlog(updates, max_actions, keys, seed);
    let total: usize = backlog.iter().map(Vec::len).sum();

    ensure_parent_dir(&out)?;
    write_json(&out, &backlog)?;

    println!(
        "Generated backlog: {} updates, {} actions → {}",
        backlog.len(),
        total,
        out.display()
    );
    Ok(())
}

fn head(actions: PathBuf) -> Result<()> {
    let backlog = read_actions(&actions)?;
    let updates = backlog.len();
    let total: usize = backlog.iter().map(Vec::len).sum();

    let chain = chain_from_batches(empty_action_state(), backlog);
    println!("{updates} updates, {total} actions, action state head {}", chain.hash());
    Ok(())
}

fn settle(
    actions: PathBuf,
    out: PathBuf,
    max_actions_per_proof: usize,
    max_actions_per_update: usize,
    log_capacity: u32,
    no_proofs: bool,
) -> Result<()> {
    let backlog = read_actions(&actions)?;
    let updates = backlog.len();
    let params = RollupParams {
        max_actions_per_proof,
        max_actions_per_update,
        log_total_capacity: log_capacity,
        proofs_enabled: !no_proofs,
    };

    info!(updates, proofs = params.proofs_enabled, "settling backlog");
    let artifact = build_artifact(params, backlog)?;
    ensure_parent_dir(&out)?;
    write_json(&out, &artifact)?;

    println!(
        "Settled {updates} updates in {} window(s): {} → {}",
        artifact.proofs.len(),
        artifact.settled,
        out.display()
    );
    Ok(())
}

/// Fold `backlog` into a fresh map and assemble the settlement artifact.
fn build_artifact(params: RollupParams, backlog: Vec<Vec<Action>>) -> Result<SettlementArtifact> {
    let program = RollupProgram::new(params);
    let mut tree = MerkleMap::new(params.tree_height())?;
    let initial = StateCommitments::new(tree.root(), tree.length(), empty_action_state());
    let chain = chain_from_batches(empty_action_state(), backlog);
    let proofs = program.prove_windows(&mut tree, &chain)?;
    let settled = proofs
        .last()
        .context("fold produced no proof windows")?
        .public_output;
    Ok(SettlementArtifact {
        params,
        initial,
        settled,
        proofs,
    })
}

/// Check an artifact's proof chain: every window proof verifies, the first
/// starts at the initial commitments, adjacent windows share an endpoint,
/// and the last lands on the settled commitments.
fn check_artifact(artifact: &SettlementArtifact) -> Result<()> {
    let program = RollupProgram::new(artifact.params);
    ensure!(!artifact.proofs.is_empty(), "artifact carries no proofs");

    let mut state = artifact.initial;
    for (i, p) in artifact.proofs.iter().enumerate() {
        p.verify(program.vk())
            .with_context(|| format!("fold window {i} failed verification"))?;
        ensure!(
            p.public_input == state,
            "fold window {i} does not start at the expected commitments"
        );
        state = p.public_output;
    }
    ensure!(
        state == artifact.settled,
        "artifact settled commitments do not match the proof chain"
    );
    Ok(())
}

fn verify(proof: PathBuf, actions: Option<PathBuf>) -> Result<()> {
    info!(proof=%proof.display(), "verifying settlement artifact");
    let artifact: SettlementArtifact = read_json(&proof)?;
    check_artifact(&artifact)?;

    if let Some(actions) = actions {
        let backlog = read_actions(&actions)?;
        let mut tree = MerkleMap::new(artifact.params.tree_height())?;
        let replayed = apply_actions(&mut tree, empty_action_state(), &backlog)?;
        ensure!(
            replayed == artifact.settled,
            "replaying {} updates reaches {replayed}, artifact claims {}",
            backlog.len(),
            artifact.settled
        );
        println!("OK: replay of {} updates matches", backlog.len());
    }

    println!(
        "OK: {} fold window(s) verified → {}",
        artifact.proofs.len(),
        artifact.settled
    );
    Ok(())
}

fn reduce(actions: PathBuf, batch_size: usize, no_proofs: bool) -> Result<()> {
    let backlog = read_actions(&actions)?;
    let updates = backlog.len();
    let mut params = ReducerParams::new(batch_size).with_env_overrides();
    if no_proofs {
        params.proofs_enabled = false;
    }
    let reducer = BatchReducer::new(params)?;

    let account = AccountId(Field::from(1));
    let token = TokenId(Field::ZERO);
    let mut source = MemorySource::new();

    info!(updates, batch_size, "dispatching backlog");
    for batch in backlog {
        reducer.dispatch(&mut source, account, token, batch)?;
    }

    let mut cells = ReducerCells::deploy();
    let mut view: HashMap<Field, Field> = HashMap::new();
    let mut rounds = 0usize;
    loop {
        let batches = reducer.prepare_batches(&source, &cells, account, token)?;
        if batches.is_empty() {
            break;
        }
        rounds += 1;
        info!(round = rounds, batches = batches.len(), "processing planned batches");

        for (i, prepared) in batches.iter().enumerate() {
            let ledger = source.ledger_action_state(account, token)?;
            let mut applied = 0usize;
            reducer.process_batch(&mut cells, ledger, prepared, |action, is_dummy, _| {
                if !is_dummy {
                    view.insert(action.key, action.value);
                    applied += 1;
                }
                Ok(())
            })?;
            info!(batch = i, applied, "processed batch");
        }
    }

    println!(
        "Reduced {updates} updates in {rounds} planning round(s): {} keys settled, action state {}",
        view.len(),
        cells.action_state()
    );
    Ok(())
}

/// Read a backlog file: a JSON array of updates, each an array of actions.
fn read_actions(path: &Path) -> Result<Vec<Vec<Action>>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing action backlog from {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, value).context("serialize to JSON")?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn mk_params() -> RollupParams {
        RollupParams {
            max_actions_per_proof: 2,
            max_actions_per_update: 3,
            log_total_capacity: 5,
            proofs_enabled: true,
        }
    }

    fn mk_backlog(n: u64) -> Vec<Vec<Action>> {
        (0..n)
            .map(|i| vec![Action::set(Field::from(i + 1), Field::from(100 + i))])
            .collect()
    }

    #[test]
    fn multi_window_artifact_round_trips_through_verification() {
        let artifact = build_artifact(mk_params(), mk_backlog(5)).unwrap();
        assert_eq!(artifact.proofs.len(), 3);

        // The final window alone does not reach back to the initial
        // commitments; only the chain as a whole does.
        let last = artifact.proofs.last().unwrap();
        assert_ne!(last.public_input, artifact.initial);
        assert_eq!(last.public_output, artifact.settled);

        let wire = serde_json::to_string(&artifact).unwrap();
        let back: SettlementArtifact = serde_json::from_str(&wire).unwrap();
        check_artifact(&back).unwrap();
    }

    #[test]
    fn gapped_or_truncated_artifact_is_rejected() {
        let mut gapped = build_artifact(mk_params(), mk_backlog(5)).unwrap();
        gapped.proofs.remove(1);
        let err = check_artifact(&gapped).unwrap_err();
        assert!(err
            .to_string()
            .contains("does not start at the expected commitments"));

        let mut truncated = build_artifact(mk_params(), mk_backlog(5)).unwrap();
        truncated.proofs.pop();
        let err = check_artifact(&truncated).unwrap_err();
        assert!(err.to_string().contains("settled commitments"));
    }
}

