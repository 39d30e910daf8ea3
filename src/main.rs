//! LambdaOpt Command Line Interface
//!
//! Usage:
//!   lambdaopt [OPTIONS] <kernel>
//!   lambdaopt --help
//!
//! Examples:
//!   lambdaopt interchange --verify          # Run the pass and check the result
//!   lambdaopt skew --matrix "1,1;1,0"       # Wavefront: skew, then interchange
//!   lambdaopt imperfect -vv                 # Show nestification in the log

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use lambdaopt::analysis::UniformDependenceTest;
use lambdaopt::ir::{print_region, Interpreter, Node, Region, Store};
use lambdaopt::kernels::Kernel;
use lambdaopt::lambda::TransformMatrix;
use lambdaopt::transform::{linear_transform_loops, transform_nest_with, NestReport};
use lambdaopt::{CompilationContext, LinearTransformConfig};
use log::{debug, info};

/// LambdaOpt - linear loop transformations on bundled kernels
#[derive(Parser, Debug)]
#[command(name = "lambdaopt")]
#[command(author = "LambdaOpt Contributors")]
#[command(version)]
#[command(about = "Unimodular loop-nest transformation on chains of recurrences", long_about = None)]
struct Cli {
    /// Kernel to transform
    #[arg(value_name = "KERNEL")]
    kernel: KernelArg,

    /// Transform to apply instead of the interchange heuristic, rows
    /// separated by ';' (e.g. "0,1;1,0")
    #[arg(long, value_parser = parse_matrix)]
    matrix: Option<TransformMatrix>,

    /// Value of the invariant `n` for --verify
    #[arg(short, long, default_value = "6")]
    n: i64,

    /// Value of the invariant `m` for --verify
    #[arg(short, long, default_value = "5")]
    m: i64,

    /// Check the rewritten kernel against the original with the interpreter
    #[arg(long)]
    verify: bool,

    /// Disable the pass
    #[arg(long)]
    no_transform: bool,

    /// Reject imperfect nests instead of splitting them
    #[arg(long)]
    reject_imperfect: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KernelArg {
    /// A[j][i] = B[j][i] + i
    Interchange,
    /// A[i][j] = A[i][j - 1] + 1
    Carried,
    /// A[i][j] = A[i - 1][j + 1] + 1
    Skew,
    /// A[j][i] = 2i + j, i counting down
    Reverse,
    /// an inner loop followed by B[i] = i
    Imperfect,
}

impl From<KernelArg> for Kernel {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::Interchange => Kernel::Interchange,
            KernelArg::Carried => Kernel::Carried,
            KernelArg::Skew => Kernel::Skew,
            KernelArg::Reverse => Kernel::Reverse,
            KernelArg::Imperfect => Kernel::Imperfect,
        }
    }
}

fn parse_matrix(s: &str) -> Result<TransformMatrix, String> {
    let rows = s
        .split(';')
        .map(|row| {
            row.split(',')
                .map(|x| x.trim().parse::<i64>().map_err(|e| format!("bad entry {:?}: {}", x.trim(), e)))
                .collect::<Result<Vec<i64>, String>>()
        })
        .collect::<Result<Vec<_>, String>>()?;
    let n = rows.len();
    if rows.iter().any(|r| r.len() != n) {
        return Err(format!("matrix must be square, got {} rows", n));
    }
    Ok(TransformMatrix::from_rows(rows))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("LambdaOpt v{}", lambdaopt::VERSION);

    let config = LinearTransformConfig {
        enabled: !cli.no_transform,
        need_perfect_nest: !cli.reject_imperfect,
        dump_nests: cli.verbose > 0,
    };
    debug!("Configuration: {:?}", config);
    let mut ctx = CompilationContext::new(config);

    let kernel = Kernel::from(cli.kernel);
    let original = kernel.build(&mut ctx.interner);
    println!("// {} (original)", kernel.name());
    println!("{}", print_region(&original, &ctx.interner));

    let mut region = original.clone();
    let reports = match &cli.matrix {
        Some(trans) => {
            let loop_id = outermost_loop(&region).context("kernel has no loop")?;
            match transform_nest_with(&mut ctx, &mut region, loop_id, &UniformDependenceTest, trans) {
                Ok(report) => vec![report],
                Err(e) => bail!("cannot apply the transform: {}", e),
            }
        }
        None => linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest),
    };

    for report in &reports {
        print_report(report);
    }
    for diagnostic in ctx.take_diagnostics() {
        println!("// {}", diagnostic);
    }

    println!("// {} (rewritten)", kernel.name());
    println!("{}", print_region(&region, &ctx.interner));

    if cli.verify {
        verify(&ctx, &original, &region, cli.n, cli.m)?;
        println!("// verified with n = {}, m = {}", cli.n, cli.m);
    }
    Ok(())
}

fn outermost_loop(region: &Region) -> Option<usize> {
    region.nodes.iter().find_map(|n| match n {
        Node::Loop(l) => Some(l.id),
        Node::Stmt(_) => None,
    })
}

fn print_report(report: &NestReport) {
    println!("// loop nest {}: {:?}", report.loop_id, report.outcome);
    if let Some(trans) = &report.matrix {
        println!("// transform:\n{}", trans);
    }
    if let Some(nest) = &report.original {
        println!("// lambda nest before:\n{}", nest);
    }
    if let Some(nest) = &report.transformed {
        println!("// lambda nest after:\n{}", nest);
    }
    if let Some(id) = report.split_loop {
        println!("// statements moved to loop {}", id);
    }
}

fn verify(ctx: &CompilationContext, original: &Region, rewritten: &Region, n: i64, m: i64) -> Result<()> {
    let scalars = [(ctx.interner.get("n"), n), (ctx.interner.get("m"), m)];
    let scalars = scalars.into_iter().filter_map(|(s, v)| s.map(|s| (s, v)));
    let mut before = Store::with_scalars(scalars.clone());
    let mut after = Store::with_scalars(scalars);
    Interpreter::new(&ctx.interner)
        .run_region(original, &mut before)
        .context("running the original kernel")?;
    Interpreter::new(&ctx.interner)
        .run_region(rewritten, &mut after)
        .context("running the rewritten kernel")?;
    if before.arrays != after.arrays {
        let differing = before
            .arrays
            .iter()
            .find(|&(k, v)| after.arrays.get(k) != Some(v))
            .or_else(|| after.arrays.iter().find(|&(k, _)| !before.arrays.contains_key(k)));
        bail!("rewritten kernel computes different memory, first difference at {:?}", differing);
    }
    Ok(())
}
