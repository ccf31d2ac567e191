use std::time::{Duration, Instant};

use log::LevelFilter;
use rand::{rngs::OsRng, Rng};
use simplelog::SimpleLogger;

use path_oram::{Config, EvictionStrategy, OramError, PathOram};

const NUM_BLOCKS: usize = 1 << 10;

const BLOCK_SIZE: usize = 64;

const N_ACCESSES: usize = 4096;

struct Stats {
    mean: Duration,
    stddev: Duration,
}

fn mean_and_standard_deviation(data: &[Duration]) -> Stats {
    let mean =
        data.iter().copied().reduce(|acc, x| acc + x).unwrap() / u32::try_from(data.len()).unwrap();
    let variance = data
        .iter()
        .map(|x| {
            let diff = (x.abs_diff(mean)).as_nanos();
            diff * diff
        })
        .reduce(|acc, x| acc + x)
        .unwrap()
        / u128::try_from(data.len() - 1).unwrap();
    let stddev = Duration::from_nanos(variance.isqrt().try_into().unwrap());
    Stats { mean, stddev }
}

fn run(label: &str, cfg: Config) -> Result<(), OramError> {
    let mut oram = PathOram::in_memory(cfg)?;
    let mut rng = OsRng;

    let preload_start = Instant::now();
    for id in 0..NUM_BLOCKS as i64 {
        oram.write(id, &[id as u8; BLOCK_SIZE])?;
    }
    let preload_duration = preload_start.elapsed();

    let mut durations = Vec::with_capacity(N_ACCESSES);
    let mut peak_stash = 0;
    for _ in 0..N_ACCESSES {
        let id = rng.gen_range(0..NUM_BLOCKS as i64);
        let start = Instant::now();
        if rng.gen_bool(0.5) {
            oram.write(id, &[0xA5; BLOCK_SIZE])?;
        } else {
            oram.read(id)?;
        }
        durations.push(start.elapsed());
        peak_stash = peak_stash.max(oram.stash_size());
    }

    let Stats { mean, stddev } = mean_and_standard_deviation(&durations);
    println!(
        "{label}: preloaded {NUM_BLOCKS} blocks in {preload_duration:?}; \
         {N_ACCESSES} accesses at {mean:?} +- {stddev:?} each; peak stash {peak_stash}"
    );
    Ok(())
}

fn main() -> Result<(), OramError> {
    SimpleLogger::init(LevelFilter::Info, simplelog::Config::default()).unwrap();

    let base = Config {
        num_blocks: NUM_BLOCKS,
        block_size: BLOCK_SIZE,
        stash_limit: 200,
        ..Config::default()
    };

    run("level-by-level", base)?;
    run(
        "greedy-by-depth",
        Config {
            eviction_strategy: EvictionStrategy::GreedyByDepth,
            ..base
        },
    )?;
    run(
        "two-path",
        Config {
            eviction_strategy: EvictionStrategy::DeterministicTwoPath,
            ..base
        },
    )?;
    run(
        "constant-time",
        Config {
            constant_time: true,
            ..base
        },
    )?;

    Ok(())
}
