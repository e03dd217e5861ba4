//! # Composite Flows
//!
//! One unit of work spanning several backends. The first listed transactor
//! is innermost: it begins last and commits first.

#[cfg(test)]
mod tests {
    use super::super::{init_test_telemetry, KvFixture, SqlFixture};
    use serde_json::json;
    use std::sync::Arc;
    use tx_backends::distsql::Mutation;
    use tx_backends::{DistClientProvider, DistDatabase};
    use tx_core::{
        unit_of_work, BackendTransactor, CompositeTransactor, ConnectionProvider,
        DefaultConnectionProvider, Scope, Transactor, TxError, TxIdentity, TxOption,
    };

    struct DistFixture {
        db: Arc<DistDatabase>,
        transactor: Arc<BackendTransactor<DistDatabase>>,
        clients: Arc<DistClientProvider>,
    }

    fn dist_fixture() -> DistFixture {
        let db = Arc::new(DistDatabase::new("distsql"));
        let connections: Arc<dyn ConnectionProvider<DistDatabase>> =
            Arc::new(DefaultConnectionProvider::new(Arc::clone(&db)));
        DistFixture {
            db,
            transactor: Arc::new(BackendTransactor::new(
                TxIdentity::fixed("distsql"),
                Arc::clone(&connections),
            )),
            clients: Arc::new(DistClientProvider::new(TxIdentity::fixed("distsql"), connections)),
        }
    }

    /// Body writing one record to each backend, then returning `outcome`.
    fn write_everywhere(
        sql: &SqlFixture,
        kv: &KvFixture,
        dist: &DistFixture,
        outcome: Result<(), TxError>,
    ) -> tx_core::UnitOfWork {
        let sql_clients = Arc::clone(&sql.clients);
        let kv_clients = Arc::clone(&kv.clients);
        let dist_clients = Arc::clone(&dist.clients);
        unit_of_work(move |scope: Scope| async move {
            sql_clients
                .current_client(&scope)?
                .insert("orders", json!({"id": "o1"}))?;

            let (_, writer) = kv_clients.current_client(&scope)?;
            assert!(writer.is_pipelined());
            writer.set("order:o1", "pending")?;

            dist_clients
                .current_client(&scope)?
                .apply_or_buffer_write(vec![Mutation::insert_or_update(
                    "ledger",
                    "o1",
                    json!({"amount": 10}),
                )])?;
            outcome
        })
    }

    fn composite(sql: &SqlFixture, kv: &KvFixture, dist: &DistFixture) -> CompositeTransactor {
        CompositeTransactor::new(vec![
            Arc::clone(&kv.transactor) as Arc<dyn Transactor>,
            Arc::clone(&dist.transactor) as Arc<dyn Transactor>,
        ])
        .with(Arc::clone(&sql.transactor) as Arc<dyn Transactor>)
    }

    // =============================================================================
    // ALL-OR-NOTHING ON BODY OUTCOME
    // =============================================================================

    #[tokio::test]
    async fn test_composite_commits_every_backend() {
        init_test_telemetry();
        let (sql, kv, dist) = (SqlFixture::new(), KvFixture::new(), dist_fixture());
        let tx = composite(&sql, &kv, &dist);
        assert_eq!(tx.len(), 3);

        tx.required(&Scope::new(), write_everywhere(&sql, &kv, &dist, Ok(())), &[])
            .await
            .unwrap();

        assert_eq!(sql.db.count("orders"), 1);
        assert_eq!(kv.store.get("order:o1").as_deref(), Some("pending"));
        assert_eq!(dist.db.read_row("ledger", "o1"), Some(json!({"amount": 10})));
    }

    #[tokio::test]
    async fn test_composite_body_failure_leaves_nothing() {
        init_test_telemetry();
        let (sql, kv, dist) = (SqlFixture::new(), KvFixture::new(), dist_fixture());
        let tx = composite(&sql, &kv, &dist);

        let result = tx
            .required(
                &Scope::new(),
                write_everywhere(&sql, &kv, &dist, Err(TxError::aborted("validation"))),
                &[],
            )
            .await;

        assert!(matches!(result, Err(TxError::Aborted(_))));
        assert_eq!(sql.db.count("orders"), 0);
        assert!(kv.store.is_empty());
        assert!(dist.db.read_all("ledger").is_empty());
        assert_eq!(sql.db.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_composite_rollback_only_reaches_every_backend() {
        init_test_telemetry();
        let (sql, kv, dist) = (SqlFixture::new(), KvFixture::new(), dist_fixture());
        let tx = composite(&sql, &kv, &dist);

        tx.required(
            &Scope::new(),
            write_everywhere(&sql, &kv, &dist, Ok(())),
            &[TxOption::rollback_only()],
        )
        .await
        .unwrap();

        assert_eq!(sql.db.count("orders"), 0);
        assert!(kv.store.is_empty());
        assert!(dist.db.read_all("ledger").is_empty());
    }

    // =============================================================================
    // COMMIT FAILURES (NOT ATOMIC ACROSS BACKENDS)
    // =============================================================================

    #[tokio::test]
    async fn test_outer_commit_failure_leaves_inner_committed() {
        init_test_telemetry();
        let (sql, kv, dist) = (SqlFixture::new(), KvFixture::new(), dist_fixture());
        let tx = composite(&sql, &kv, &dist);
        // rdbms is outermost and commits last.
        sql.db.fail_next_commit();

        let result = tx
            .required(&Scope::new(), write_everywhere(&sql, &kv, &dist, Ok(())), &[])
            .await;

        assert!(matches!(result, Err(TxError::Commit { .. })));
        assert_eq!(sql.db.count("orders"), 0);
        assert_eq!(kv.store.get("order:o1").as_deref(), Some("pending"));
        assert_eq!(dist.db.read_row("ledger", "o1"), Some(json!({"amount": 10})));
    }

    #[tokio::test]
    async fn test_inner_commit_failure_rolls_back_outer() {
        init_test_telemetry();
        let (sql, kv, dist) = (SqlFixture::new(), KvFixture::new(), dist_fixture());
        let tx = composite(&sql, &kv, &dist);
        // kv is innermost and commits first.
        kv.store.fail_next_exec();

        let result = tx
            .required(&Scope::new(), write_everywhere(&sql, &kv, &dist, Ok(())), &[])
            .await;

        assert!(matches!(result, Err(TxError::Commit { .. })));
        assert!(kv.store.is_empty());
        assert!(dist.db.read_all("ledger").is_empty());
        assert_eq!(sql.db.count("orders"), 0);
    }

    // =============================================================================
    // NESTING
    // =============================================================================

    #[tokio::test]
    async fn test_nested_composite_joins_outer_handles() {
        init_test_telemetry();
        let sql = SqlFixture::new();
        let kv = KvFixture::new();
        let tx = Arc::new(CompositeTransactor::new(vec![
            Arc::clone(&sql.transactor) as Arc<dyn Transactor>,
            Arc::clone(&kv.transactor) as Arc<dyn Transactor>,
        ]));
        let inner_tx = Arc::clone(&tx);
        let sql_clients = Arc::clone(&sql.clients);
        let kv_clients = Arc::clone(&kv.clients);

        let result = tx
            .required(
                &Scope::new(),
                unit_of_work(move |scope: Scope| async move {
                    inner_tx
                        .required(
                            &scope,
                            unit_of_work(move |scope: Scope| async move {
                                sql_clients
                                    .current_client(&scope)?
                                    .insert("orders", json!({"id": "o1"}))?;
                                let (_, writer) = kv_clients.current_client(&scope)?;
                                writer.set("order:o1", "pending")?;
                                Ok(())
                            }),
                            &[],
                        )
                        .await?;
                    // Joined writes are discarded with the outer transaction.
                    Err(TxError::aborted("outer fails"))
                }),
                &[],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(sql.db.count("orders"), 0);
        assert!(kv.store.is_empty());
    }
}
