//! CurrencyService unit tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use cryptopay_types::{AddCurrencyRequest, AppError, Currency, CurrencyRepository};

    use crate::currency::CurrencyService;
    use crate::service_tests::tests::{MockCurrencyRepo, MockRateProvider};
    use crate::workers::RateRefreshWorker;

    struct Fixture {
        service: CurrencyService,
        repo: Arc<MockCurrencyRepo>,
        provider: Arc<MockRateProvider>,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MockCurrencyRepo::new());
        let provider = Arc::new(MockRateProvider::new());
        let service = CurrencyService::load(repo.clone(), provider.clone())
            .await
            .unwrap();
        Fixture {
            service,
            repo,
            provider,
        }
    }

    fn jpy() -> AddCurrencyRequest {
        AddCurrencyRequest {
            code: "jpy".to_string(),
            name: "Japanese Yen".to_string(),
            symbol: "¥".to_string(),
            exchange_rate: 149.5,
        }
    }

    #[tokio::test]
    async fn test_load_seeds_empty_store() {
        let fx = fixture().await;

        assert_eq!(fx.repo.saves(), 1);
        assert!(fx.repo.stored("USD").unwrap().is_base);
        assert_eq!(fx.service.snapshot().base_code(), "USD");
        assert_eq!(fx.service.list_currencies().len(), 4);
    }

    #[tokio::test]
    async fn test_load_keeps_existing_table() {
        let repo = Arc::new(MockCurrencyRepo::new());
        let now = Utc::now();
        repo.save_currencies(&[
            Currency::base("EUR", "Euro", "€", now),
            Currency::new("USD", "US Dollar", "$", 1.086957, now),
        ])
        .await
        .unwrap();

        let service = CurrencyService::load(repo.clone(), Arc::new(MockRateProvider::new()))
            .await
            .unwrap();

        assert_eq!(repo.saves(), 1);
        assert_eq!(service.snapshot().base_code(), "EUR");
        assert_eq!(service.list_currencies().len(), 2);
    }

    #[tokio::test]
    async fn test_convert_through_base() {
        let fx = fixture().await;

        let converted = fx.service.convert("usd", "eur", 100.0).unwrap();

        assert_eq!(converted.from, "USD");
        assert_eq!(converted.to, "EUR");
        assert_eq!(converted.result, 92.0);
    }

    #[tokio::test]
    async fn test_convert_errors() {
        let fx = fixture().await;

        assert!(matches!(
            fx.service.convert("USD", "XYZ", 1.0),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.convert("USD", "EUR", -1.0),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_get_rate() {
        let fx = fixture().await;

        let rate = fx.service.get_rate("gbp").unwrap();

        assert_eq!(rate.code, "GBP");
        assert_eq!(rate.base, "USD");
        assert_eq!(rate.rate, 0.79);
    }

    #[tokio::test]
    async fn test_set_base_preserves_cross_rates() {
        let fx = fixture().await;
        let before = fx.service.convert("GBP", "INR", 100.0).unwrap().result;

        let base = fx.service.set_base_currency("eur").await.unwrap();

        assert_eq!(base.code, "EUR");
        assert_eq!(base.exchange_rate, 1.0);
        assert_eq!(fx.service.get_rate("USD").unwrap().rate, 1.086957);
        assert!(fx.repo.stored("EUR").unwrap().is_base);
        assert!(!fx.repo.stored("USD").unwrap().is_base);

        let after = fx.service.convert("GBP", "INR", 100.0).unwrap().result;
        assert!((before - after).abs() < 0.01, "{} vs {}", before, after);
    }

    #[tokio::test]
    async fn test_set_base_unknown_currency() {
        let fx = fixture().await;

        let result = fx.service.set_base_currency("XYZ").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(fx.service.snapshot().base_code(), "USD");
    }

    #[tokio::test]
    async fn test_failed_save_leaves_table_unchanged() {
        let fx = fixture().await;
        fx.repo.fail_saves();

        let result = fx.service.set_base_currency("EUR").await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(fx.service.snapshot().base_code(), "USD");
        assert!(fx.repo.stored("USD").unwrap().is_base);
    }

    #[tokio::test]
    async fn test_refresh_replaces_rates() {
        let fx = fixture().await;
        fx.provider
            .serve("USD", &[("EUR", 0.9), ("GBP", 0.8), ("INR", 83.5), ("JPY", 150.0)]);

        let report = fx.service.refresh_rates().await.unwrap();

        assert!(report.is_complete());
        assert_eq!(fx.service.get_rate("EUR").unwrap().rate, 0.9);
        assert_eq!(fx.repo.stored("INR").unwrap().exchange_rate, 83.5);
        // Currencies the table does not know are not added.
        assert!(fx.service.get_rate("JPY").is_err());
    }

    #[tokio::test]
    async fn test_refresh_keeps_missing_rates() {
        let fx = fixture().await;
        fx.provider.serve("USD", &[("EUR", 0.9), ("GBP", -1.0)]);

        let report = fx.service.refresh_rates().await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.missing, vec!["INR".to_string()]);
        assert_eq!(report.invalid, vec!["GBP".to_string()]);
        assert_eq!(fx.service.get_rate("EUR").unwrap().rate, 0.9);
        assert_eq!(fx.service.get_rate("GBP").unwrap().rate, 0.79);
        assert_eq!(fx.service.get_rate("INR").unwrap().rate, 83.12);
    }

    #[tokio::test]
    async fn test_refresh_skips_rate_below_precision() {
        let fx = fixture().await;
        fx.provider
            .serve("USD", &[("EUR", 0.0000004), ("GBP", 0.8), ("INR", 83.5)]);

        let report = fx.service.refresh_rates().await.unwrap();

        assert_eq!(report.invalid, vec!["EUR".to_string()]);
        assert_eq!(fx.service.get_rate("EUR").unwrap().rate, 0.92);
        assert_eq!(fx.repo.stored("EUR").unwrap().exchange_rate, 0.92);
        assert_eq!(fx.service.get_rate("GBP").unwrap().rate, 0.8);
        assert!(fx.service.convert("EUR", "USD", 1.0).unwrap().result.is_finite());
    }

    #[tokio::test]
    async fn test_refresh_upstream_failure_changes_nothing() {
        let fx = fixture().await;
        let saves = fx.repo.saves();

        let result = fx.service.refresh_rates().await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(fx.repo.saves(), saves);
        assert_eq!(fx.service.get_rate("EUR").unwrap().rate, 0.92);
    }

    #[tokio::test]
    async fn test_refresh_rejects_snapshot_for_other_base() {
        let fx = fixture().await;
        fx.provider.serve("EUR", &[("USD", 1.09)]);

        let result = fx.service.refresh_rates().await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(fx.service.get_rate("EUR").unwrap().rate, 0.92);
    }

    #[tokio::test]
    async fn test_add_currency() {
        let fx = fixture().await;

        let added = fx.service.add_currency(jpy()).await.unwrap();

        assert_eq!(added.code, "JPY");
        assert!(added.is_active);
        assert!(!added.is_base);
        assert_eq!(fx.service.convert("USD", "JPY", 2.0).unwrap().result, 299.0);
        assert!(fx.repo.stored("JPY").is_some());
    }

    #[tokio::test]
    async fn test_add_currency_rejections() {
        let fx = fixture().await;
        fx.service.add_currency(jpy()).await.unwrap();

        let duplicate = fx.service.add_currency(jpy()).await;
        let mut zero = jpy();
        zero.code = "CHF".to_string();
        zero.exchange_rate = 0.0;
        let bad_rate = fx.service.add_currency(zero).await;
        let mut blank = jpy();
        blank.code = "  ".to_string();
        let empty = fx.service.add_currency(blank).await;

        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
        assert!(matches!(bad_rate, Err(AppError::InvalidArgument(_))));
        assert!(matches!(empty, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_add_currency_rate_below_precision() {
        let fx = fixture().await;
        let saves = fx.repo.saves();
        let mut tiny = jpy();
        tiny.exchange_rate = 0.0000001;

        let result = fx.service.add_currency(tiny).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
        assert_eq!(fx.repo.saves(), saves);
        assert!(fx.service.get_rate("JPY").is_err());
    }

    #[tokio::test]
    async fn test_deactivated_currency_cannot_convert() {
        let fx = fixture().await;

        let gbp = fx.service.set_active("gbp", false).await.unwrap();

        assert!(!gbp.is_active);
        assert!(matches!(
            fx.service.convert("USD", "GBP", 1.0),
            Err(AppError::NotFound(_))
        ));

        fx.service.set_active("GBP", true).await.unwrap();
        assert_eq!(fx.service.convert("USD", "GBP", 100.0).unwrap().result, 79.0);
    }

    #[tokio::test]
    async fn test_base_cannot_be_deactivated() {
        let fx = fixture().await;

        let result = fx.service.set_active("USD", false).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
        assert!(fx.service.snapshot().base().is_active);
    }

    #[tokio::test]
    async fn test_reload_reads_store() {
        let fx = fixture().await;
        fx.repo
            .save_currencies(&[Currency::new("CHF", "Swiss Franc", "Fr", 0.88, Utc::now())])
            .await
            .unwrap();

        let reloaded = fx.service.reload().await.unwrap();

        assert_eq!(reloaded.len(), 5);
        assert_eq!(fx.service.get_rate("CHF").unwrap().rate, 0.88);
    }

    #[tokio::test]
    async fn test_refresh_worker_tick() {
        let fx = fixture().await;
        let service = Arc::new(fx.service);
        let worker = RateRefreshWorker::new(service.clone(), Duration::from_secs(3600));

        assert!(!worker.tick().await);

        fx.provider.serve("USD", &[("EUR", 0.95)]);
        assert!(worker.tick().await);
        assert_eq!(service.get_rate("EUR").unwrap().rate, 0.95);
    }
}
