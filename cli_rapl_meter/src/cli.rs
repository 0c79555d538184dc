use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rapl_meter::EnergyDomain;

#[derive(Parser)]
#[command(author, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Where sysfs is mounted.
    #[arg(long, global = true, default_value = "/sys")]
    pub sysfs_root: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Only show info about the CPU sockets and RAPL domains, then exit.
    Info,

    /// Measure the energy consumed by a command.
    Run {
        /// The RAPL domains to record. All the available domains by default.
        #[arg(short, long, value_delimiter = ',')]
        domains: Option<Vec<EnergyDomain>>,

        /// The sockets to monitor. All the sockets by default.
        #[arg(short, long, value_delimiter = ',')]
        sockets: Option<Vec<u32>>,

        /// How many times to run the command. The result is the average of the runs.
        #[arg(short, long, default_value_t = 1)]
        number: u32,

        /// Where to write the result.
        #[arg(short, long, value_enum, default_value = "stdout")]
        output: OutputType,

        /// Sets the output file, if output is set to csv.
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Label of the measurement. The command line by default.
        #[arg(short, long)]
        label: Option<String>,

        /// The command to measure, and its arguments.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Clone, ValueEnum, Debug, PartialEq, Eq, Copy)]
pub enum OutputType {
    None,
    Stdout,
    Csv,
}
