//! End-to-end tests of the analysis pipeline over in-memory data.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use stockcast::adapters::retrying_data_port::RetryingDataPort;
use stockcast::domain::analysis::Analyzer;
use stockcast::domain::config::{AnalysisConfig, Backoff, RetryPolicy};
use stockcast::domain::error::{ErrorKind, Stage, StockcastError};
use stockcast::domain::ohlcv::{DateRange, RawBar};
use stockcast::domain::forecast::{
    ForecastConfig, ForecastEngine, GridSpec, ModelCache, OrderSelection,
};

mod forecasting {
    use super::*;

    fn mean_absolute_error(points: &[f64], offset: usize) -> f64 {
        points
            .iter()
            .enumerate()
            .map(|(h, p)| (p - seasonal_level(offset + h)).abs())
            .sum::<f64>()
            / points.len() as f64
    }

    #[test]
    fn fixed_order_tracks_noise_free_continuation() {
        let n = 500;
        let engine = ForecastEngine::new(&fixed_forecast_config());
        let mut covered = 0usize;
        let mut total = 0usize;

        for seed in [3, 17, 29, 41, 97] {
            let closes = seasonal_closes(n, 0.5, seed);
            let series = price_series("SYN", series_anchor(), &closes);
            let result = engine.forecast(&series, 30, 5, 0.95).unwrap();
            assert_eq!(result.points.len(), 30);

            for (h, point) in result.points.iter().enumerate() {
                let truth = seasonal_level(n + h);
                if point.lower_bound <= truth && truth <= point.upper_bound {
                    covered += 1;
                }
                total += 1;
            }

            let estimates: Vec<f64> = result.points.iter().map(|p| p.point_estimate).collect();
            let mae = mean_absolute_error(&estimates, n);
            assert!(mae < 1.0, "seed {seed}: MAE {mae}");
        }

        let coverage = covered as f64 / total as f64;
        assert!(coverage >= 0.9, "coverage {coverage}");
    }

    #[test]
    fn default_selection_tracks_noise_free_continuation() {
        let n = 500;
        let engine = ForecastEngine::new(&ForecastConfig::default());
        let mut covered = 0usize;
        let mut total = 0usize;

        for seed in [3, 17, 29] {
            let closes = seasonal_closes(n, 0.5, seed);
            let series = price_series("SYN", series_anchor(), &closes);
            let result = engine.forecast_default(&series).unwrap();
            assert_eq!(result.points.len(), 30);
            assert_eq!(result.model.order.seasonal_d, 1, "seed {seed}: {}", result.model.order);

            for (h, point) in result.points.iter().enumerate() {
                let truth = seasonal_level(n + h);
                if point.lower_bound <= truth && truth <= point.upper_bound {
                    covered += 1;
                }
                total += 1;
            }

            let estimates: Vec<f64> = result.points.iter().map(|p| p.point_estimate).collect();
            let mae = mean_absolute_error(&estimates, n);
            assert!(mae < 1.0, "seed {seed}: MAE {mae}");
        }

        let coverage = covered as f64 / total as f64;
        assert!(coverage >= 0.9, "coverage {coverage}");
    }

    #[test]
    fn automatic_order_selection_finds_weekly_seasonality() {
        let n = 250;
        let closes = seasonal_closes(n, 0.5, 11);
        let series = price_series("SYN", series_anchor(), &closes);
        let config = ForecastConfig {
            selection: OrderSelection::Auto(GridSpec {
                max_p: 1,
                max_q: 1,
                ..GridSpec::default()
            }),
            fit_timeout: Duration::from_secs(120),
            ..ForecastConfig::default()
        };

        let result = ForecastEngine::new(&config).forecast_default(&series).unwrap();
        assert_eq!(result.model.order.seasonal_d, 1);
        assert_eq!(result.model.order.period, 5);
        assert!(result.model.aic.is_finite());

        let estimates: Vec<f64> = result.points.iter().map(|p| p.point_estimate).collect();
        let mae = mean_absolute_error(&estimates, n);
        assert!(mae < 1.5, "MAE {mae}");
        for p in &result.points {
            assert!(p.lower_bound <= p.point_estimate && p.point_estimate <= p.upper_bound);
        }
    }
}

mod orchestration {
    use super::*;

    #[test]
    fn complete_bundle_for_healthy_series() {
        let closes = seasonal_closes(300, 0.5, 5);
        let port = MockDataPort::new().with_bars("TCS.NS", raw_bars(series_anchor(), &closes));
        let analyzer = Analyzer::new(test_config(&["TCS.NS"]), port);

        let bundle = analyzer.analyze("TCS.NS", wide_range()).unwrap();

        assert!(bundle.is_complete(), "failures: {:?}", bundle.failures);
        assert_eq!(bundle.ticker, "TCS.NS");
        assert_eq!(bundle.metrics.days_analyzed, 300);
        assert_eq!(bundle.metrics.latest_close, closes[299]);

        let decomposition = bundle.decomposition.as_ref().unwrap();
        assert_eq!(decomposition.period, 30);
        assert_eq!(decomposition.len(), 300);

        let forecast = bundle.forecast.as_ref().unwrap();
        assert_eq!(forecast.points.len(), 30);
        assert!(forecast.points[0].date > bundle.metrics.latest_date);
        assert!(bundle.outlook.is_some());
    }

    #[test]
    fn decomposition_failure_keeps_other_sections() {
        let closes = seasonal_closes(70, 0.5, 6);
        let port = MockDataPort::new().with_bars("ITC.NS", raw_bars(series_anchor(), &closes));
        let mut config = test_config(&["ITC.NS"]);
        config.decomposition.period = 40;

        let bundle = Analyzer::new(config, port)
            .analyze("ITC.NS", wide_range())
            .unwrap();

        assert!(!bundle.is_complete());
        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].stage, Stage::Decomposition);
        assert_eq!(bundle.failures[0].kind, ErrorKind::InvalidPeriod);
        assert!(bundle.decomposition.is_none());
        assert!(bundle.forecast.is_some());
        assert!(bundle.outlook.is_some());
    }

    #[test]
    fn short_history_skips_decomposition_only() {
        let closes = seasonal_closes(45, 0.5, 14);
        let port = MockDataPort::new().with_bars("LT.NS", raw_bars(series_anchor(), &closes));
        let mut config = AnalysisConfig::new(wide_range());
        config.tickers = vec!["LT.NS".to_string()];

        let bundle = Analyzer::new(config, port).analyze("LT.NS", wide_range()).unwrap();

        assert_eq!(bundle.metrics.days_analyzed, 45);
        assert_eq!(bundle.failures.len(), 1, "failures: {:?}", bundle.failures);
        assert_eq!(bundle.failures[0].stage, Stage::Decomposition);
        assert_eq!(bundle.failures[0].kind, ErrorKind::InvalidPeriod);
        assert!(bundle.decomposition.is_none());
        assert_eq!(bundle.forecast.as_ref().unwrap().points.len(), 30);
        assert!(bundle.outlook.is_some());
    }

    #[test]
    fn forecast_failure_keeps_other_sections() {
        let closes = seasonal_closes(70, 0.5, 7);
        let port = MockDataPort::new().with_bars("ITC.NS", raw_bars(series_anchor(), &closes));
        let mut config = test_config(&["ITC.NS"]);
        config.forecast.seasonal_period = 20;

        let bundle = Analyzer::new(config, port)
            .analyze("ITC.NS", wide_range())
            .unwrap();

        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].stage, Stage::Forecast);
        assert_eq!(bundle.failures[0].kind, ErrorKind::InsufficientData);
        assert!(bundle.decomposition.is_some());
        assert!(bundle.forecast.is_none());
        assert!(bundle.outlook.is_none());
    }

    #[test]
    fn unknown_ticker_is_no_data() {
        let analyzer = Analyzer::new(test_config(&["NOPE.NS"]), MockDataPort::new());
        let err = analyzer.analyze("NOPE.NS", wide_range()).unwrap_err();
        assert!(matches!(err, StockcastError::NoData { .. }));
    }

    #[test]
    fn source_failure_is_data_unavailable() {
        let port = MockDataPort::new().with_error("SBIN.NS", "HTTP 503");
        let analyzer = Analyzer::new(test_config(&["SBIN.NS"]), port);
        let err = analyzer.analyze("SBIN.NS", wide_range()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn short_history_fails_in_preprocessing() {
        let closes = seasonal_closes(20, 0.5, 8);
        let port = MockDataPort::new().with_bars("LT.NS", raw_bars(series_anchor(), &closes));
        let analyzer = Analyzer::new(test_config(&["LT.NS"]), port);
        match analyzer.analyze("LT.NS", wide_range()) {
            Err(StockcastError::InsufficientData {
                stage,
                required,
                actual,
            }) => {
                assert_eq!(stage, Stage::Preprocess);
                assert_eq!(required, 30);
                assert_eq!(actual, 20);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn range_filters_the_fetched_rows() {
        let closes = seasonal_closes(300, 0.5, 9);
        let port = MockDataPort::new().with_bars("TCS.NS", raw_bars(series_anchor(), &closes));
        let analyzer = Analyzer::new(test_config(&["TCS.NS"]), port);
        let range = DateRange::new(date(2022, 1, 1), date(2022, 6, 30)).unwrap();

        let bundle = analyzer.analyze("TCS.NS", range).unwrap();
        assert!(bundle.metrics.latest_date <= date(2022, 6, 30));
        assert!(bundle.metrics.days_analyzed < 300);
    }

    #[test]
    fn many_tickers_keep_input_order() {
        let port = MockDataPort::new()
            .with_bars("A", raw_bars(series_anchor(), &seasonal_closes(120, 0.5, 1)))
            .with_error("B", "timeout")
            .with_bars("C", raw_bars(series_anchor(), &seasonal_closes(150, 0.5, 2)));
        let tickers: Vec<String> = ["A", "B", "C", "D"].iter().map(|t| t.to_string()).collect();
        let analyzer = Analyzer::new(test_config(&["A", "B", "C", "D"]), port);

        let results = analyzer.analyze_many(&tickers, wide_range());

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().ticker, "A");
        assert_eq!(results[0].as_ref().unwrap().metrics.days_analyzed, 120);
        assert!(matches!(results[1], Err(StockcastError::DataUnavailable { .. })));
        assert_eq!(results[2].as_ref().unwrap().metrics.days_analyzed, 150);
        assert!(matches!(results[3], Err(StockcastError::NoData { .. })));
    }

    #[test]
    fn configured_run_pairs_tickers_with_results() {
        let port = MockDataPort::new()
            .with_bars("A", raw_bars(series_anchor(), &seasonal_closes(100, 0.5, 1)));
        let analyzer = Analyzer::new(test_config(&["A", "B"]), port);

        let results = analyzer.analyze_configured();
        let tickers: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tickers, vec!["A", "B"]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }

    #[test]
    fn shared_cache_reuses_fitted_models() {
        let closes = seasonal_closes(200, 0.5, 12);
        let port = MockDataPort::new().with_bars("TCS.NS", raw_bars(series_anchor(), &closes));
        let cache = Arc::new(ModelCache::new());
        let analyzer = Analyzer::new(test_config(&["TCS.NS"]), port).with_cache(Arc::clone(&cache));

        let first = analyzer.analyze("TCS.NS", wide_range()).unwrap();
        let second = analyzer.analyze("TCS.NS", wide_range()).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(first.forecast, second.forecast);
        assert_eq!(analyzer.config().tickers, vec!["TCS.NS"]);
    }

    #[test]
    fn transient_failures_are_retried() {
        let closes = seasonal_closes(100, 0.5, 13);
        let port = MockDataPort::new()
            .with_bars("INFY.NS", raw_bars(series_anchor(), &closes))
            .with_transient_errors("INFY.NS", 2);
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Fixed {
                delay: Duration::from_millis(1),
            },
        };
        let port = RetryingDataPort::new(port, policy).with_sleep(|_| {});
        let analyzer = Analyzer::new(test_config(&["INFY.NS"]), port);

        let bundle = analyzer.analyze("INFY.NS", wide_range()).unwrap();
        assert_eq!(bundle.metrics.days_analyzed, 100);
    }
}

mod data_quality {
    use super::*;

    #[test]
    fn gaps_and_weekend_rows_are_cleaned_before_analysis() {
        let closes = seasonal_closes(120, 0.5, 21);
        let mut raw = raw_bars(series_anchor(), &closes);
        // Drop three business days and add a Saturday row.
        raw.remove(50);
        raw.remove(50);
        raw.remove(80);
        let saturday = date(2022, 1, 8);
        raw.push(RawBar::complete(saturday, 1.0, 1.0, 1.0, 1.0, 1));
        let port = MockDataPort::new().with_bars("HUL.NS", raw);

        let bundle = Analyzer::new(test_config(&["HUL.NS"]), port)
            .analyze("HUL.NS", wide_range())
            .unwrap();

        assert_eq!(bundle.series.len(), 120);
        assert_eq!(bundle.series.bars().iter().filter(|b| b.filled).count(), 3);
        assert!(bundle.series.dates().iter().all(|d| *d != saturday));
        assert!(bundle.warnings.iter().any(|w| w.contains("forward-filled")));
        assert!(bundle.forecast.is_some());
    }

    #[test]
    fn constant_prices_give_zero_return() {
        let closes = vec![250.0; 90];
        let port = MockDataPort::new().with_bars("BHARTIARTL.NS", raw_bars(series_anchor(), &closes));

        let bundle = Analyzer::new(test_config(&["BHARTIARTL.NS"]), port)
            .analyze("BHARTIARTL.NS", wide_range())
            .unwrap();

        assert_eq!(bundle.metrics.absolute_change, 0.0);
        assert_eq!(bundle.metrics.percent_change, 0.0);
        let outlook = bundle.outlook.expect("forecast of a flat series");
        assert!(outlook.change_pct.abs() < 1e-6);
    }

    #[test]
    fn non_positive_prices_fail_multiplicative_decomposition_only() {
        let closes: Vec<f64> = (0..90).map(|t| if t == 45 { 0.0 } else { 50.0 + t as f64 }).collect();
        let port = MockDataPort::new().with_bars("RELIANCE.NS", raw_bars(series_anchor(), &closes));

        let bundle = Analyzer::new(test_config(&["RELIANCE.NS"]), port)
            .analyze("RELIANCE.NS", wide_range())
            .unwrap();

        assert!(bundle.decomposition.is_none());
        assert_eq!(bundle.failures[0].stage, Stage::Decomposition);
        assert_eq!(bundle.failures[0].kind, ErrorKind::InvalidInput);
    }
}

mod serialisation {
    use super::*;

    #[test]
    fn bundle_serialises_to_json() {
        let closes = seasonal_closes(120, 0.5, 31);
        let port = MockDataPort::new().with_bars("TCS.NS", raw_bars(series_anchor(), &closes));
        let bundle = Analyzer::new(test_config(&["TCS.NS"]), port)
            .analyze("TCS.NS", wide_range())
            .unwrap();

        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["ticker"], "TCS.NS");
        assert_eq!(value["metrics"]["days_analyzed"], 120);
        assert_eq!(value["forecast"]["points"].as_array().unwrap().len(), 30);
        assert!(value["forecast"]["model"]["order"].is_object());
        assert!(value["outlook"]["label"].is_string());
        assert!(value.get("series").is_none());
    }

    #[test]
    fn stage_failures_serialise_with_snake_case_tags() {
        let closes = seasonal_closes(70, 0.5, 32);
        let port = MockDataPort::new().with_bars("ITC.NS", raw_bars(series_anchor(), &closes));
        let mut config = test_config(&["ITC.NS"]);
        config.decomposition.period = 40;
        let bundle = Analyzer::new(config, port).analyze("ITC.NS", wide_range()).unwrap();

        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["failures"][0]["stage"], "decomposition");
        assert_eq!(value["failures"][0]["kind"], "invalid_period");
        assert!(value["decomposition"].is_null());
    }
}
