//! # Propagation Flows
//!
//! Required / RequiresNew against the reference backends, observed through
//! the client providers the way application code sees them.

#[cfg(test)]
mod tests {
    use super::super::{init_test_telemetry, KvFixture, SqlFixture};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tx_backends::SqlDatabase;
    use tx_core::{
        unit_of_work, BackendError, Scope, Transactor, TransactorExt, TxError, TxOption,
    };

    // =============================================================================
    // COMMIT / ROLLBACK
    // =============================================================================

    #[tokio::test]
    async fn test_committed_write_visible_outside_transaction() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let clients = Arc::clone(&f.clients);

        f.transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "1"}))?;
                    Ok(())
                }),
                &[],
            )
            .await
            .unwrap();

        let client = f.clients.current_client(&Scope::new()).unwrap();
        assert!(!client.in_transaction());
        assert_eq!(client.select_all("test1").unwrap(), vec![json!({"id": "1"})]);
    }

    #[tokio::test]
    async fn test_rollback_only_leaves_no_effect() {
        init_test_telemetry();
        let sql = SqlFixture::new();
        let kv = KvFixture::new();
        let sql_clients = Arc::clone(&sql.clients);
        let kv_clients = Arc::clone(&kv.clients);

        sql.transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    sql_clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "1"}))?;
                    Ok(())
                }),
                &[TxOption::rollback_only()],
            )
            .await
            .unwrap();

        kv.transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    let (_, writer) = kv_clients.current_client(&scope)?;
                    writer.set("k", "v")?;
                    Ok(())
                }),
                &[TxOption::rollback_only()],
            )
            .await
            .unwrap();

        assert_eq!(sql.db.count("test1"), 0);
        assert!(kv.store.is_empty());
    }

    #[tokio::test]
    async fn test_typed_body_error_returned_unchanged() {
        #[derive(Debug)]
        enum DomainError {
            Validation(&'static str),
            Engine(TxError),
        }

        impl From<TxError> for DomainError {
            fn from(e: TxError) -> Self {
                Self::Engine(e)
            }
        }

        init_test_telemetry();
        let f = SqlFixture::new();
        let clients = Arc::clone(&f.clients);

        let result: Result<u32, DomainError> = f
            .transactor
            .required_with(&Scope::new(), &[], move |scope: Scope| async move {
                clients
                    .current_client(&scope)?
                    .insert("test1", json!({"id": "1"}))
                    .map_err(TxError::from)?;
                Err(DomainError::Validation("name too long"))
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation("name too long"))));
        assert_eq!(f.db.count("test1"), 0);
    }

    // =============================================================================
    // NESTING
    // =============================================================================

    #[tokio::test]
    async fn test_nested_required_joins_single_handle() {
        init_test_telemetry();
        // A second handle would exceed the limit.
        let f = SqlFixture::with_database(SqlDatabase::new("rdbms").with_max_open_transactions(1));
        let transactor = Arc::clone(&f.transactor);
        let clients = Arc::clone(&f.clients);

        f.transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "outer"}))?;
                    transactor
                        .required(
                            &scope,
                            unit_of_work(move |scope: Scope| async move {
                                let client = clients.current_client(&scope)?;
                                assert_eq!(client.count("test1")?, 1);
                                client.insert("test1", json!({"id": "inner"}))?;
                                Ok(())
                            }),
                            &[],
                        )
                        .await
                }),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(f.db.count("test1"), 2);
        assert_eq!(f.db.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_requires_new_inner_rollback_keeps_outer_commit() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let transactor = Arc::clone(&f.transactor);
        let clients = Arc::clone(&f.clients);

        f.transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "outer"}))?;
                    let inner_clients = Arc::clone(&clients);
                    let inner = transactor
                        .requires_new(
                            &scope,
                            unit_of_work(move |scope: Scope| async move {
                                let client = inner_clients.current_client(&scope)?;
                                // Suspended outer writes are not visible here.
                                assert_eq!(client.count("test1")?, 0);
                                client.insert("test1", json!({"id": "inner"}))?;
                                Err(TxError::aborted("inner fails"))
                            }),
                            &[],
                        )
                        .await;
                    assert!(inner.is_err());
                    Ok(())
                }),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(f.db.select_all("test1"), vec![json!({"id": "outer"})]);
    }

    #[tokio::test]
    async fn test_requires_new_inner_commit_survives_outer_rollback() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let transactor = Arc::clone(&f.transactor);
        let clients = Arc::clone(&f.clients);

        let result = f
            .transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "outer"}))?;
                    let inner_clients = Arc::clone(&clients);
                    transactor
                        .requires_new(
                            &scope,
                            unit_of_work(move |scope: Scope| async move {
                                inner_clients
                                    .current_client(&scope)?
                                    .insert("audit", json!({"id": "inner"}))?;
                                Ok(())
                            }),
                            &[],
                        )
                        .await?;
                    Err(TxError::aborted("outer fails"))
                }),
                &[],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(f.db.count("test1"), 0);
        assert_eq!(f.db.select_all("audit"), vec![json!({"id": "inner"})]);
    }

    // =============================================================================
    // ABNORMAL EXITS
    // =============================================================================

    #[tokio::test]
    async fn test_read_only_write_rejected_at_write() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let clients = Arc::clone(&f.clients);

        let result = f
            .transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    let client = clients.current_client(&scope)?;
                    assert_eq!(client.count("test1")?, 0);
                    client.insert("test1", json!({"id": "1"}))?;
                    Ok(())
                }),
                &[TxOption::read_only()],
            )
            .await;

        assert!(matches!(
            result,
            Err(TxError::Backend(BackendError::ReadOnlyViolation(_)))
        ));
        assert_eq!(f.db.count("test1"), 0);
    }

    #[tokio::test]
    async fn test_panic_rolls_back_and_resumes() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let transactor = Arc::clone(&f.transactor);
        let clients = Arc::clone(&f.clients);

        let joined = tokio::spawn(async move {
            transactor
                .required(
                    &Scope::new(),
                    unit_of_work(move |scope: Scope| async move {
                        clients
                            .current_client(&scope)?
                            .insert("test1", json!({"id": "1"}))?;
                        if scope.is_empty() {
                            return Ok(());
                        }
                        panic!("unrecoverable");
                    }),
                    &[],
                )
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(f.db.count("test1"), 0);
        assert_eq!(f.db.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_timeout_releases_handle() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let clients = Arc::clone(&f.clients);

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            f.transactor.required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "1"}))?;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }),
                &[],
            ),
        )
        .await;
        assert!(result.is_err());

        for _ in 0..20 {
            if f.db.open_transactions() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(f.db.open_transactions(), 0);
        assert_eq!(f.db.count("test1"), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_skips_body() {
        init_test_telemetry();
        let f = SqlFixture::new();
        f.db.fail_next_begin();

        let result = f
            .transactor
            .required(
                &Scope::new(),
                unit_of_work(|_| async { panic!("body must not run") }),
                &[],
            )
            .await;

        assert!(matches!(result, Err(TxError::Begin { .. })));
    }

    #[tokio::test]
    async fn test_commit_failure_reported() {
        init_test_telemetry();
        let f = SqlFixture::new();
        let clients = Arc::clone(&f.clients);
        f.db.fail_next_commit();

        let result = f
            .transactor
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    clients
                        .current_client(&scope)?
                        .insert("test1", json!({"id": "1"}))?;
                    Ok(())
                }),
                &[],
            )
            .await;

        assert!(matches!(result, Err(TxError::Commit { .. })));
        assert_eq!(f.db.count("test1"), 0);
        // The follow-up rollback finds the handle already finished.
        assert_eq!(f.db.open_transactions(), 0);
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_metrics_exported_after_commit() {
        init_test_telemetry();
        let f = SqlFixture::new();

        f.transactor
            .required(&Scope::new(), unit_of_work(|_| async { Ok(()) }), &[])
            .await
            .unwrap();

        let exported = tx_telemetry::encode_metrics().unwrap();
        assert!(exported.contains("tx_begun_total"));
        assert!(exported.contains("tx_committed_total"));
    }
}
