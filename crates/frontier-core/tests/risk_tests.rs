use frontier_core::risk::{
    calculate_risk_metrics, drawdown_series, max_drawdown, sortino_ratio, RiskMetricsInput,
};
use frontier_core::{FrontierError, ReturnFrequency};
use pretty_assertions::assert_eq;

// ===========================================================================
// Sortino ratio
// ===========================================================================

#[test]
fn test_sortino_all_positive_excess_is_infinite() {
    let returns = vec![0.004, 0.006, 0.01, 0.002];
    let s = sortino_ratio(&returns, 0.015, ReturnFrequency::Weekly).unwrap();
    assert_eq!(s, f64::INFINITY);
}

#[test]
fn test_sortino_sign_follows_mean_excess() {
    let losing = vec![-0.01, 0.002, -0.02, 0.001];
    let s = sortino_ratio(&losing, 0.015, ReturnFrequency::Weekly).unwrap();
    assert!(s < 0.0);

    let winning = vec![0.02, -0.001, 0.015, 0.01];
    let s = sortino_ratio(&winning, 0.015, ReturnFrequency::Weekly).unwrap();
    assert!(s > 0.0 && s.is_finite());
}

#[test]
fn test_sortino_monthly_hurdle() {
    // 1.2% annual is 0.1% a month: only the 0.0005 month is below it.
    let returns = vec![0.0005, 0.002, 0.003];
    let e: [f64; 3] = [0.0005 - 0.001, 0.002 - 0.001, 0.003 - 0.001];
    let dd = (e[0] * e[0]).sqrt();
    let expected = ((e[0] + e[1] + e[2]) / 3.0 * 12.0) / (dd * 12.0_f64.sqrt());
    let s = sortino_ratio(&returns, 0.012, ReturnFrequency::Monthly).unwrap();
    assert!((s - expected).abs() < 1e-9);
}

#[test]
fn test_sortino_empty_series() {
    let err = sortino_ratio(&[], 0.015, ReturnFrequency::Weekly).unwrap_err();
    assert!(matches!(err, FrontierError::EmptyData(_)));
}

// ===========================================================================
// Maximum drawdown
// ===========================================================================

#[test]
fn test_strictly_increasing_path_has_no_drawdown() {
    let returns: Vec<f64> = (1..=20).map(|i| 0.001 * i as f64).collect();
    assert_eq!(max_drawdown(&returns).unwrap(), 0.0);
}

#[test]
fn test_halve_then_recover() {
    // 1.0 -> 1.0 -> 0.5 -> 1.0
    let mdd = max_drawdown(&[0.0, -0.5, 1.0]).unwrap();
    assert!((mdd + 0.5).abs() < 1e-12);
    let series = drawdown_series(&[0.0, -0.5, 1.0]);
    assert_eq!(series.len(), 3);
    assert!((series[1] + 0.5).abs() < 1e-12);
    assert!(series[2].abs() < 1e-12);
}

#[test]
fn test_drawdown_picks_deepest_trough() {
    // 1.1 -> 0.99 (-10%) -> 1.188 -> 0.8316 (-30%)
    let mdd = max_drawdown(&[0.10, -0.10, 0.20, -0.30]).unwrap();
    assert!((mdd + 0.30).abs() < 1e-12);
}

#[test]
fn test_drawdown_empty_series() {
    assert!(matches!(
        max_drawdown(&[]),
        Err(FrontierError::EmptyData(_))
    ));
}

// ===========================================================================
// Risk metrics envelope
// ===========================================================================

#[test]
fn test_risk_metrics_from_json_defaults() {
    let input: RiskMetricsInput =
        serde_json::from_str(r#"{"returns": [0.01, -0.02, 0.015, 0.005]}"#).unwrap();
    assert_eq!(input.frequency, ReturnFrequency::Weekly);
    assert_eq!(input.risk_free_rate, 0.015);

    let out = calculate_risk_metrics(&input).unwrap();
    assert_eq!(out.result.observations, 4);
    assert!(out.result.max_drawdown < 0.0);
    assert!(out.result.downside_deviation > 0.0);
    assert_eq!(out.metadata.precision, "f64_ieee754");
}
