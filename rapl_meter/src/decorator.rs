use crate::error::{RaplError, Result};
use crate::measurement::Measurement;
use crate::outputs::{Output, PrintOutput};
use crate::sensor::Sensor;

/// Wraps a function to measure the energy consumed by each of its calls.
///
/// Every call to [`MeasureIt::call`] runs the function `number` times inside one
/// measurement, labelled with the name of the function, and exports the averaged result.
///
/// ```no_run
/// use rapl_meter::{measureit, outputs::CsvOutput, Sensor};
///
/// fn fib(n: u64) -> u64 {
///     if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
/// }
///
/// let sensor = Sensor::new(None, None)?;
///
/// // print the result of each call
/// let x = measureit(&sensor, fib).call(30)?;
///
/// // average 10 runs, and store the result in a csv file
/// let mut csv = CsvOutput::new("fib.csv")?;
/// let y = measureit(&sensor, fib).output(&mut csv).number(10).call(30)?;
/// # Ok::<(), rapl_meter::RaplError>(())
/// ```
pub struct MeasureIt<'a, F> {
    func: F,
    label: String,
    sensor: &'a Sensor,
    output: Box<dyn Output + 'a>,
    number: u32,
}

/// Wraps `func`, see [`MeasureIt`].
pub fn measureit<F>(sensor: &Sensor, func: F) -> MeasureIt<'_, F> {
    MeasureIt {
        label: callable_name::<F>(),
        func,
        sensor,
        output: Box::new(PrintOutput::new()),
        number: 1,
    }
}

impl<'a, F> MeasureIt<'a, F> {
    /// Sets the output of the results (the console by default).
    pub fn output<'b>(self, output: impl Output + 'b) -> MeasureIt<'b, F>
    where
        'a: 'b,
    {
        MeasureIt {
            func: self.func,
            label: self.label,
            sensor: self.sensor,
            output: Box::new(output),
            number: self.number,
        }
    }

    /// Sets how many times the function runs for each measurement (1 by default).
    pub fn number(mut self, number: u32) -> Self {
        self.number = number;
        self
    }

    /// Overrides the label of the measurements (the name of the function by default).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Calls the function `number` times with a clone of `args`, and returns the last value.
    ///
    /// For functions of several arguments, wrap them in a closure that takes a tuple.
    pub fn call<A, R>(&mut self, args: A) -> Result<R>
    where
        F: FnMut(A) -> R,
        A: Clone,
    {
        if self.number == 0 {
            return Err(RaplError::InvalidArgument("the number of runs must be at least 1".to_owned()));
        }

        let mut measurement = Measurement::to_output(self.label.clone(), self.sensor, &mut self.output);
        measurement.begin()?;
        let mut value = (self.func)(args.clone());
        for _ in 1..self.number {
            value = (self.func)(args.clone());
        }
        measurement.end()?;

        if self.number > 1 {
            measurement.average_over(self.number)?;
        }
        measurement.export(None)?;
        Ok(value)
    }
}

impl<F> MeasureIt<'static, F> {
    /// Wraps `func` with the default sensor, see [`crate::setup`].
    pub fn with_default_sensor(func: F) -> Result<MeasureIt<'static, F>> {
        Ok(measureit(crate::default_sensor()?, func))
    }
}

/// The name of a function, from its type: `my_crate::module::my_function` becomes `my_function`.
///
/// Closures are named after the function that defines them.
fn callable_name<F>() -> String {
    let full = std::any::type_name::<F>();
    // drop the generic parameters, if any
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .unwrap_or(path)
        .to_owned()
}
