//! ioc-runner: headless runner for the IROP risk engine.
//!
//! Usage:
//!   ioc-runner --seed 12345 --flights 150 --tails 45
//!   ioc-runner --snapshot day.json --config overrides.json --db journal.db
//!   ioc-runner --seed 12345 --ipc-mode

use anyhow::Result;
use irop_core::{
    command::{SimulationOutcome, SimulationRequest},
    config::EngineConfig,
    engine::IropEngine,
    generator::{generate_day, GeneratorParams},
    propagation::Perturbation,
    snapshot::OpsSnapshot,
    store::EngineStore,
    types::Minutes,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetRisk {
        flight_key: String,
    },
    Chain {
        flight_key: String,
    },
    Impact {
        flight_key: String,
        #[serde(default)]
        delay_minutes: Option<Minutes>,
    },
    Simulate {
        request: SimulationRequest,
    },
    Top {
        #[serde(default = "default_top")]
        n: usize,
    },
    Quit,
}

fn default_top() -> usize {
    10
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let flights = parse_arg(&args, "--flights", 150usize);
    let tails = parse_arg(&args, "--tails", 45usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let snapshot_path = string_arg(&args, "--snapshot");
    let config_path = string_arg(&args, "--config");
    let db = string_arg(&args, "--db");

    if !ipc_mode {
        println!("IROP risk engine - ioc-runner");
        match snapshot_path {
            Some(path) => println!("  snapshot:  {path}"),
            None => println!("  synthetic: seed {seed}, {flights} flights, {tails} tails"),
        }
        println!("  config:    {}", config_path.unwrap_or("(defaults)"));
        println!("  journal:   {}", db.unwrap_or("(none)"));
        println!();
    }

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let snapshot = match snapshot_path {
        Some(path) => OpsSnapshot::load(path)?,
        None => {
            let params = GeneratorParams { flight_count: flights, tail_count: tails, ..GeneratorParams::default() };
            generate_day(seed, &params)?
        }
    };

    let mut engine = IropEngine::new(config, snapshot)?;
    if let Some(path) = db {
        engine = engine.with_journal(EngineStore::open(path)?)?;
        log::info!("runner: journaling to {path}");
    }

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        print_summary(&engine)?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &IropEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &IropEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::GetRisk { flight_key } => serde_json::to_value(engine.risk_record(&flight_key)?)?,
        IpcCommand::Chain { flight_key } => serde_json::to_value(engine.downstream_chain(&flight_key)?)?,
        IpcCommand::Impact { flight_key, delay_minutes } => {
            let perturbation = match delay_minutes {
                Some(minutes) => Perturbation::AddedDelay { minutes },
                None => Perturbation::CurrentDelay,
            };
            serde_json::to_value(engine.impact_report(&flight_key, perturbation)?)?
        }
        IpcCommand::Simulate { request } => serde_json::to_value(engine.simulate(&request)?)?,
        IpcCommand::Top { n } => serde_json::to_value(engine.top_risks(n))?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_summary(engine: &IropEngine) -> Result<()> {
    let baseline = engine.baseline();
    let counts = baseline.band_counts();

    println!("=== BASELINE SUMMARY ===");
    println!("  generation:     {}", baseline.generation());
    println!("  op date:        {}", baseline.snapshot().op_date());
    println!("  flights:        {}", baseline.snapshot().flight_count());
    println!("  tails:          {}", baseline.graph().chains().len());
    println!("  high risk:      {}", counts.high);
    println!("  medium risk:    {}", counts.medium);
    println!("  low risk:       {}", counts.low);

    println!();
    println!("=== TOP RISKS ===");
    let top = engine.top_risks(5);
    for r in &top {
        println!(
            "  {:<24} {:>5.1} {:<6} | crew {:>4.1} env {:>4.1} pax {:>4.1} mx {:>4.1} | downstream {}",
            r.flight_key,
            r.risk_score,
            r.risk_band.as_str(),
            r.components.crew_legality,
            r.components.airport_environment,
            r.components.passenger,
            r.components.maintenance,
            r.downstream_legs_affected,
        );
    }

    let Some(worst) = top.first() else {
        println!("  (no flights)");
        return Ok(());
    };
    println!();
    println!("=== WHAT-IF: +60 min on {} ===", worst.flight_key);
    let request = SimulationRequest::Delay { flight_key: worst.flight_key.clone(), delay_minutes: 60 };
    if let SimulationOutcome::Delay(sim) = engine.simulate(&request)? {
        println!(
            "  origin score:   {:.1} -> {:.1} ({} -> {})",
            sim.origin.score_before,
            sim.origin.score_after,
            sim.origin.band_before.as_str(),
            sim.origin.band_after.as_str()
        );
        for hop in &sim.impact.hops {
            println!(
                "  hop {} {:<24} carried {:>5.1}m | misconnect pax {:+.1} | revenue ${:+.0}",
                hop.hop, hop.flight_key, hop.carried_delay_minutes, hop.misconnect_pax_delta, hop.revenue_delta_usd
            );
        }
        match sim.impact.contained_at_hop {
            Some(hop) => println!("  contained at hop {hop}"),
            None => println!("  not contained within {} hops", sim.impact.max_depth),
        }
        println!(
            "  total: misconnect pax {:+.1}, revenue ${:+.0}, vouchers ${:+.0}",
            sim.impact.total_misconnect_pax_delta,
            sim.impact.total_revenue_delta_usd,
            sim.impact.total_voucher_delta_usd
        );
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
