use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use cli::{Cli, Commands, OutputType};
use rapl_meter::{
    measureit,
    outputs::{BufferedOutput, CsvOutput, Output, PrintOutput},
    powercap, topology, EnergyDomain, MeasurementResult, Sensor, SensorConfig, Sysfs,
};

mod cli;

fn main() -> Result<(), anyhow::Error> {
    // initialize logger
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    // parse CLI arguments
    let cli = Cli::parse();
    let sysfs = Sysfs::new(cli.sysfs_root);

    // get cpu info
    let cpus = topology::cpu_ids(&sysfs).context("failed to read the cpu topology")?;
    let sockets = topology::socket_ids(&sysfs).context("failed to read the cpu topology")?;
    info!("{}/{} CPU sockets/cores found: {}", sockets.len(), cpus.len(), mkstring(&sockets, ", "));

    // run the command
    match cli.command {
        Commands::Info => {
            for domain in [EnergyDomain::Package, EnergyDomain::Dram, EnergyDomain::Gpu] {
                match powercap::discover(&sysfs, domain, None) {
                    Ok(dirs) => {
                        println!("\n{domain}:");
                        for dir in dirs {
                            println!("- {dir}");
                        }
                    }
                    Err(e) => println!("\n{domain}: unavailable ({e})"),
                }
            }
        }
        Commands::Run {
            domains,
            sockets,
            number,
            output,
            output_file,
            label,
            command,
        } => {
            let config = SensorConfig { sysfs, domains, sockets };
            let sensor = Sensor::from_config(&config).context("failed to initialize the RAPL sensor")?;
            info!(
                "Recording {} on sockets {}",
                mkstring(&sensor.available_domains(), ", "),
                mkstring(sensor.sockets(), ", ")
            );

            // prepare the output
            let mut csv = match output {
                OutputType::Csv => {
                    let filename = if let Some(f) = output_file {
                        f
                    } else {
                        let now = OffsetDateTime::now_utc().format(&Rfc3339)?;
                        PathBuf::from(format!("rapl-{now}.csv"))
                    };
                    let csv = CsvOutput::new(&filename)
                        .with_context(|| format!("failed to open {}", filename.display()))?;
                    Some(csv)
                }
                _ => None,
            };
            let sink: Box<dyn Output + '_> = match (output, csv.as_mut()) {
                (OutputType::Csv, Some(csv)) => Box::new(csv),
                (OutputType::Stdout, _) => Box::new(PrintOutput::new()),
                _ => Box::new(Discard),
            };

            let label = label.unwrap_or_else(|| command.join(" "));
            run_command(&sensor, &command, label, number, sink)?;

            if let Some(csv) = csv.as_mut() {
                csv.save()?;
                info!("Result saved to {}", csv.path().display());
            }
        }
    }

    Ok(())
}

/// Runs `command` `number` times inside one measurement, stopping at the first failure.
fn run_command(
    sensor: &Sensor,
    command: &[String],
    label: String,
    number: u32,
    sink: Box<dyn Output + '_>,
) -> anyhow::Result<()> {
    let (program, args) = command.split_first().ok_or_else(|| anyhow!("no command to run"))?;
    let mut failure: Option<anyhow::Error> = None;

    measureit(sensor, |()| {
        if failure.is_some() {
            return;
        }
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => (),
            Ok(status) => failure = Some(anyhow!("{program} failed: {status}")),
            Err(e) => failure = Some(anyhow::Error::new(e).context(format!("failed to run {program}"))),
        }
    })
    .label(label)
    .number(number)
    .output(sink)
    .call(())?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Drops the results.
struct Discard;

impl Output for Discard {
    fn add(&mut self, _result: &MeasurementResult) -> rapl_meter::Result<()> {
        Ok(())
    }
}

/// Takes a slice of elements that can be converted to strings, converts them and joins them all.
fn mkstring<A: ToString>(elems: &[A], sep: &str) -> String {
    elems.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(sep)
}
