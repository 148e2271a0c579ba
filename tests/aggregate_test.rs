use chargeapt::aggregate::{HourlyMetric, hourly_distribution, monthly_buckets, yearly_buckets};
use chargeapt::sample::Sample;
use chargeapt::session::measure_sessions;
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

fn session(id: &str, owner: &str, start: DateTime<Utc>, kwh: f64) -> Vec<Sample> {
    let base = Sample {
        session_id: id.to_string(),
        timestamp: start,
        cumulative_energy_kwh: 100.0,
        power_kw: 3.7,
        incremental_cost: Some(0.0),
        rate: None,
        owner: Some(owner.to_string()),
    };
    let end = Sample {
        timestamp: start + Duration::minutes(90),
        cumulative_energy_kwh: 100.0 + kwh,
        incremental_cost: Some(kwh * 0.3),
        ..base.clone()
    };
    vec![base, end]
}

fn fixture() -> Vec<Sample> {
    let march = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
    let january = Utc.with_ymd_and_hms(2024, 1, 20, 21, 0, 0).unwrap();
    let last_year = Utc.with_ymd_and_hms(2023, 11, 2, 8, 30, 0).unwrap();
    [
        session("1", "B", january, 4.0),
        session("2", "A", march, 6.0),
        session("3", "B", march + Duration::days(1), 2.0),
        session("4", "A", january, 1.0),
        session("5", "A", last_year, 10.0),
    ]
    .concat()
}

#[test]
fn monthly_sort_order() {
    let rows = monthly_buckets(&measure_sessions(&fixture()), Tz::UTC);
    let keys: Vec<_> = rows
        .iter()
        .map(|r| (r.year, r.month, r.owner.clone().unwrap()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (2024, 3, "A".to_string()),
            (2024, 3, "B".to_string()),
            (2024, 1, "A".to_string()),
            (2024, 1, "B".to_string()),
            (2023, 11, "A".to_string()),
        ]
    );
    assert_eq!(rows[0].label, "March '24");
    assert_eq!(rows[4].label, "November '23");
}

#[test]
fn yearly_sort_order_and_totals() {
    let rows = yearly_buckets(&measure_sessions(&fixture()), Tz::UTC);
    let keys: Vec<_> = rows
        .iter()
        .map(|r| (r.year, r.owner.clone().unwrap()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (2024, "A".to_string()),
            (2024, "B".to_string()),
            (2023, "A".to_string()),
        ]
    );
    assert_eq!(rows[0].totals.session_count, 2);
    assert!((rows[0].totals.total_energy_kwh - 7.0).abs() < 1e-9);
    assert!((rows[0].totals.total_cost - 2.1).abs() < 1e-9);
    assert!((rows[0].totals.total_hours - 3.0).abs() < 1e-9);
}

#[test]
fn hourly_histogram_sums_in_year_sessions() {
    let measurements = measure_sessions(&fixture());
    let hist = hourly_distribution(&measurements, Tz::UTC, 2024, HourlyMetric::Energy);

    assert_eq!(hist.points.len(), 24);
    assert!(hist.points.iter().enumerate().all(|(i, p)| p.hour as usize == i));
    assert!((hist.total() - 13.0).abs() < 1e-9);
    assert!((hist.points[8].value - 8.0).abs() < 1e-9);
    assert!((hist.points[21].value - 5.0).abs() < 1e-9);
}

#[test]
fn empty_year_has_flat_histogram() {
    let hist = hourly_distribution(
        &measure_sessions(&fixture()),
        Tz::UTC,
        1999,
        HourlyMetric::Cost,
    );
    assert_eq!(hist.values(), vec![0.0; 24]);
}
