use std::io::{self, Write};

use super::{format_timestamp, Output};
use crate::error::Result;
use crate::result::MeasurementResult;

const SEPARATOR: &str = "-------------------------------";

/// Prints the results in a human-readable format, to the standard output by default.
pub struct PrintOutput {
    writer: Box<dyn Write + Send>,
    /// Print the `Debug` form of the results instead.
    raw: bool,
}

impl PrintOutput {
    pub fn new() -> PrintOutput {
        PrintOutput::to_writer(io::stdout())
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> PrintOutput {
        PrintOutput {
            writer: Box::new(writer),
            raw: false,
        }
    }

    pub fn raw(mut self, raw: bool) -> PrintOutput {
        self.raw = raw;
        self
    }

    pub fn format_output(&self, result: &MeasurementResult) -> String {
        if self.raw {
            return format!("{result:?}");
        }

        fn print_energy(s: &mut String, name: &str, energy: Option<&[Option<f64>]>) {
            match energy {
                None => s.push_str(&format!("{name} : not recorded\n")),
                Some(per_socket) => {
                    s.push_str(&format!("{name} :\n"));
                    for (socket, value) in per_socket.iter().enumerate() {
                        let energy = match value {
                            Some(uj) => format!("{uj:>10.4} uJ"),
                            None => format!("{:>10}", "n/a"),
                        };
                        s.push_str(&format!("\tsocket {socket} : {energy}\n"));
                    }
                }
            }
            s.push_str(SEPARATOR);
        }

        let mut s = format!(
            "Label : {}\nBegin : {}\nDuration : {:>10.4} s\n{SEPARATOR}\n",
            result.label(),
            format_timestamp(result.timestamp()),
            result.duration().as_secs_f64(),
        );
        print_energy(&mut s, "PKG", result.pkg());
        s.push('\n');
        print_energy(&mut s, "DRAM", result.dram());
        s
    }
}

impl Default for PrintOutput {
    fn default() -> Self {
        PrintOutput::new()
    }
}

impl Output for PrintOutput {
    fn add(&mut self, result: &MeasurementResult) -> Result<()> {
        let formatted = self.format_output(result);
        writeln!(self.writer, "{formatted}")?;
        self.writer.flush()?;
        Ok(())
    }
}
