//! The default sensor is global to the process, so everything is checked in a single test.

mod common;

use common::FakeSysfs;
use rapl_meter::{measureit, outputs::TableOutput, EnergyDomain, MeasureIt, Measurement, RaplError};

#[test]
fn default_sensor_lifecycle() -> anyhow::Result<()> {
    assert!(matches!(rapl_meter::default_sensor(), Err(RaplError::NotSetUp)));
    assert!(matches!(Measurement::with_default_sensor("early"), Err(RaplError::NotSetUp)));
    assert!(matches!(MeasureIt::with_default_sensor(|x: u32| x), Err(RaplError::NotSetUp)));

    let fake = FakeSysfs::two_sockets();
    // a failed setup leaves the default sensor unset
    let res = rapl_meter::setup(fake.config(None, Some(vec![2])));
    assert!(matches!(res, Err(RaplError::BadSocketId(2))));

    let sensor = rapl_meter::setup(fake.config(Some(vec![EnergyDomain::Package]), None))?;
    assert_eq!(sensor.sockets(), &[0, 1]);
    assert!(matches!(rapl_meter::setup(fake.config(None, None)), Err(RaplError::AlreadySetUp)));
    assert!(std::ptr::eq(sensor, rapl_meter::default_sensor()?));

    let mut table = TableOutput::new();
    let mut measurement = Measurement::with_default_sensor("global")?.with_output(&mut table);
    measurement.begin()?;
    fake.write_energy(EnergyDomain::Package, 0, 20000);
    measurement.end()?;
    measurement.export(None)?;
    drop(measurement);
    assert_eq!(table.data().len(), 2);
    assert_eq!(table.data()[0].pkg, Some(20000.0 - common::PKG_0_VALUE as f64));
    assert_eq!(table.data()[0].dram, None);

    MeasureIt::with_default_sensor(|x: u32| x + 1)?.output(&mut table).call(1)?;
    assert_eq!(table.data().len(), 4);

    let other = measureit(rapl_meter::default_sensor()?, |x: u32| x).output(&mut table).call(7)?;
    assert_eq!(other, 7);
    Ok(())
}
