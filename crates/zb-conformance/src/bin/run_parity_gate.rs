#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};

use zb_conformance::registry::standard_registry;
use zb_conformance::{run_registry, write_report_json, HarnessConfig};
use zb_wire::HttpTransport;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("run_parity_gate failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .context("usage: run_parity_gate <environment.json> [report.json]")?;
    let report_path = args.next();

    let config = HarnessConfig::from_json_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    let transport = HttpTransport::with_timeout(config.timeout)?;
    let cases = standard_registry();

    let report = run_registry(&config, &transport, &cases)?;

    println!(
        "parity gate: total={} passed={} failed={} skipped={}",
        report.total, report.passed, report.failed, report.skipped
    );
    for case in &report.cases {
        if let zb_conformance::Outcome::Failed { failures } = &case.outcome {
            println!("case {} failed:", case.name);
            for failure in failures {
                println!("  {failure}");
            }
        }
    }

    if let Some(path) = report_path {
        write_report_json(&path, &report)?;
        println!("wrote {path}");
    }

    if !report.all_passed() {
        bail!(
            "{} case(s) failed, {} skipped",
            report.failed,
            report.skipped
        );
    }
    Ok(())
}
