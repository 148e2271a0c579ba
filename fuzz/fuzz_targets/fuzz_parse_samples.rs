#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder or the pipeline behind it
    let Ok(batch) = chargeapt::sample::parse_samples_slice(data, chrono_tz::Tz::UTC) else {
        return;
    };

    let assembler = chargeapt::ReportAssembler::new(chrono_tz::Tz::Europe__Amsterdam, "€", 12);
    let report = assembler.assemble(&batch, &chargeapt::ReportOptions::default());
    assert_eq!(report.hourly.points.len(), 24);
    assert!(report.summary.total_energy_kwh >= 0.0);
});
