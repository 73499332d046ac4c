//! Replays an allocation script against an in-process heap.
//!
//! ```text
//! $ heap-sim m:100 m:100 f:0 a:96:24
//! malloc(100) -> #0 at 0x7f...
//!   area 0x7f...0000..0x7f...1000: [A 144] [F 3936]
//!   1 areas, 4096 bytes reserved, 1 allocated blocks (144 bytes), 1 free blocks (3936 bytes, largest payload 3904)
//! ...
//! ```

use std::process;

use argh::FromArgs;
use heap::align::BASE_ALIGN;
use snafu::{ResultExt as _, ensure_whatever};

use self::{
    report::{GenericError, Report},
    script::Op,
    sim::{Outcome, Simulator},
};

mod report;
mod script;
mod sim;

/// Replay malloc, calloc, aligned_alloc, realloc and free calls against a
/// bounded heap and print its block map after every step.
///
/// Operations: m:SIZE, c:COUNT:SIZE, a:ALIGN:SIZE, r:ID:SIZE, f:ID.
/// Allocations are numbered from 0 in script order.
#[derive(Debug, FromArgs)]
struct Args {
    /// bytes of memory available to the heap
    #[argh(option, default = "1024 * 1024")]
    pool_size: usize,

    /// unit every area request is rounded up to
    #[argh(option, default = "4096")]
    granularity: usize,

    /// print only the final statistics
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// log every heap decision
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// script operations
    #[argh(positional)]
    ops: Vec<Op>,
}

fn main() {
    let args: Args = argh::from_env();

    let default_filter = if args.verbose { "heap=trace" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    env_logger::Builder::from_env(env).init();

    if let Err(err) = run(&args) {
        let report = Report::new(err);
        eprintln!("{report}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GenericError> {
    ensure_whatever!(
        args.granularity > 0 && args.granularity.is_multiple_of(BASE_ALIGN),
        "granularity must be a non-zero multiple of {BASE_ALIGN}, granularity={}",
        args.granularity
    );

    let mut sim = Simulator::new(args.pool_size, args.granularity);
    log::debug!(
        "replaying {} operations, pool_size={}, granularity={}",
        args.ops.len(),
        args.pool_size,
        args.granularity
    );

    for (step, op) in args.ops.iter().enumerate() {
        let outcome = sim
            .apply(*op)
            .with_whatever_context(|_| format!("step {step} failed, op={op}"))?;
        if args.quiet {
            continue;
        }
        match outcome {
            Outcome::Allocated { id, addr } => println!("{op} -> #{id} at {addr:#x}"),
            Outcome::Failed => println!("{op} -> NULL (ENOMEM)"),
            Outcome::Freed { id } => println!("{op} -> #{id} released"),
        }
        print!("{}", sim.block_map());
        println!("  {}", sim.stats());
    }

    println!("final: {}", sim.stats());
    if sim.failures() > 0 {
        println!("failed allocations: {}", sim.failures());
    }
    Ok(())
}
