// Branch Table Dump
// Builds the reference tables for a model and prints the branch inventory

use anyhow::{bail, Result};
use log::info;

use tau_travel_time::{RadialModel, RefTables};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("usage: {} <model-file>", args[0]);
    }

    let model = RadialModel::from_file(&args[1])?;
    info!("building tables for {}", model.name());
    let tables = RefTables::build(model)?;

    println!(
        "{:<10} {:>4} {:>9} {:>9} {:>9} {:>9}  legs",
        "phase", "n", "p min", "p max", "x min", "x max"
    );
    for b in &tables.branches {
        println!(
            "{:<10} {:>4} {:>9.5} {:>9.5} {:>9.3} {:>9.3}  {}{}{}{}",
            b.phase_code,
            b.p.len(),
            b.p_range[0],
            b.p_range[1],
            b.x_range[0].to_degrees(),
            b.x_range[1].to_degrees(),
            if b.seg.up_going { "u" } else { "d" },
            b.seg.up,
            b.seg.down,
            b.seg.ret,
        );
    }
    println!(
        "{} branches over {} merged slownesses",
        tables.branches.len(),
        tables.sampling.merged.len()
    );
    Ok(())
}
