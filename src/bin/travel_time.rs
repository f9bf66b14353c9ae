// Travel Time CLI
// Thin driver: load a model, open a session, print the arrival list

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use std::sync::Arc;

use tau_travel_time::{
    EngineConfig, Registry, Request, SessionFlags, SessionPool,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!(
            "usage: {} <model> <depth-km> <delta-deg> [elev-km] [--json]",
            args[0]
        );
    }
    let model_name = &args[1];
    let depth_km: f64 = args[2].parse().context("depth must be a number")?;
    let delta_deg: f64 = args[3].parse().context("distance must be a number")?;
    let elev_km: f64 = args
        .get(4)
        .filter(|a| !a.starts_with("--"))
        .map(|a| a.parse())
        .transpose()
        .context("elevation must be a number")?
        .unwrap_or(0.0);
    let json = args.iter().any(|a| a == "--json");

    // TravelTime.toml plus TT_-prefixed environment variables.
    let settings = config::Config::builder()
        .set_default("model_path", "data/models")?
        .set_default("aux_data_path", "data/aux")?
        .add_source(config::File::with_name("TravelTime").required(false))
        .add_source(config::Environment::with_prefix("TT"))
        .build()?;
    let engine_config: EngineConfig = settings.try_deserialize()?;

    info!("travel_time starting at {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    info!("  model: {}", model_name);
    info!("  depth: {} km, distance: {} deg, elevation: {} km", depth_km, delta_deg, elev_km);

    let registry = Arc::new(Registry::new(engine_config));
    let pool = SessionPool::new(registry);
    let mut session = pool.acquire(model_name)?;

    let flags = SessionFlags {
        return_all_phases: true,
        return_back_branches: true,
        tectonic: false,
        use_rstt: false,
        plot_mode: false,
    };
    session.new_session(depth_km, &[], flags)?;

    let request = Request {
        delta_deg: Some(delta_deg),
        elev_km,
        ..Default::default()
    };
    let arrivals = session.get_tt(&request);

    if json {
        println!("{}", serde_json::to_string_pretty(&arrivals)?);
    } else {
        println!(
            "{:<10} {:>10} {:>9} {:>9} {:>7} {:>10}  {:<6} {:<6}",
            "phase", "tt (s)", "dT/dD", "dT/dZ", "spread", "observ", "group", "aux"
        );
        for a in &arrivals {
            println!(
                "{:<10} {:>10.3} {:>9.4} {:>9.4} {:>7.3} {:>10.1}  {:<6} {:<6}",
                a.phase_code, a.tt, a.d_tdd, a.d_tdz, a.spread, a.observ, a.phase_group, a.aux_group
            );
        }
    }

    pool.release(session)?;
    Ok(())
}
