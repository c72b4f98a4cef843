//! End-to-end tests against a live SQL Server.
//!
//! Ignored by default. Run with:
//!
//! ```text
//! MSSQL_ADMIN_TEST_CONNECTION="Server=tcp:localhost,1433;User Id=sa;Password=...;TrustServerCertificate=true" \
//!     cargo test -p mssql-admin --test end_to_end -- --ignored --test-threads=1
//! ```

use mssql_admin::mapping::{tracking_key, EntityState};
use mssql_admin::{
    AdminError, BackendKind, ConnectionString, OperationContext, ProviderRouter, SqlValue,
};

const ENV_CONNECTION: &str = "MSSQL_ADMIN_TEST_CONNECTION";

fn base() -> Option<ConnectionString> {
    let text = std::env::var(ENV_CONNECTION).ok()?;
    Some(ConnectionString::parse(&text).unwrap())
}

async fn reset(router: &ProviderRouter, base: &ConnectionString, db: &str) {
    router.admin().drop_database(base, db).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_admin_lifecycle() {
    let Some(base) = base() else {
        eprintln!("{} not set, skipping", ENV_CONNECTION);
        return;
    };
    let router = ProviderRouter::default();
    let db = "MssqlAdminE2e1";
    reset(&router, &base, db).await;

    let admin = router.admin();
    assert!(admin.create_database(&base, db).await.unwrap());
    assert!(!admin.create_database(&base, db).await.unwrap());

    assert!(admin.create_table(&base, db, "T1").await.unwrap());
    assert!(!admin.create_table(&base, db, "T1").await.unwrap());

    assert!(admin
        .create_column(&base, db, "T1", "Name", "nvarchar(50)")
        .await
        .unwrap());
    assert!(!admin
        .create_column(&base, db, "T1", "Name", "nvarchar(50)")
        .await
        .unwrap());

    for mode in [BackendKind::Raw, BackendKind::Mapped] {
        let ctx = OperationContext::new(mode, "end_to_end");

        let dbs = router.list_databases(&ctx, &base).await.unwrap();
        assert_eq!(dbs.provider, mode.label());
        assert!(dbs.data.iter().any(|d| d == db));
        assert!(!dbs.data.iter().any(|d| d == "master"));

        let tables = router.list_tables(&ctx, &base, db).await.unwrap();
        assert_eq!(tables.data, vec!["T1".to_string()]);

        let types = router.get_column_types(&ctx, &base, db, "T1").await.unwrap();
        assert_eq!(types.data.get("Id"), Some("int"));
        assert_eq!(types.data.get("Name"), Some("nvarchar(50)"));

        let pk = router.get_primary_key_columns(&ctx, &base, db, "T1").await.unwrap();
        assert!(pk.data.contains("Id"));
        assert_eq!(pk.data.len(), 1);

        let fk = router.get_foreign_key_columns(&ctx, &base, db, "T1").await.unwrap();
        assert!(fk.data.is_empty());

        let rows = router.fetch_rows(&ctx, &base, db, "T1", 100).await.unwrap();
        assert!(rows.data.is_empty());
        assert_eq!(rows.data.columns.len(), 2);
    }

    assert!(admin.drop_column(&base, db, "T1", "Name").await.unwrap());
    assert!(!admin.drop_column(&base, db, "T1", "Name").await.unwrap());

    assert!(admin.drop_table(&base, db, "T1").await.unwrap());
    assert!(!admin.drop_table(&base, db, "T1").await.unwrap());

    assert!(admin.drop_database(&base, db).await.unwrap());
    assert!(!admin.drop_database(&base, db).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_row_tracking() {
    let Some(base) = base() else {
        eprintln!("{} not set, skipping", ENV_CONNECTION);
        return;
    };
    let router = ProviderRouter::default();
    let db = "MssqlAdminE2e2";
    reset(&router, &base, db).await;

    let admin = router.admin();
    admin.create_database(&base, db).await.unwrap();
    admin.create_table(&base, db, "T1").await.unwrap();
    admin
        .create_column(&base, db, "T1", "Name", "nvarchar(50)")
        .await
        .unwrap();

    // Seed one row through a plain connection
    {
        let scope = mssql_admin::ConnectionScope::database(
            &base,
            &mssql_admin::validate_identifier(db).unwrap(),
        );
        let mut client = mssql_admin::drivers::mssql::connection::open(&scope)
            .await
            .unwrap();
        client
            .execute("INSERT INTO [dbo].[T1] ([Name]) VALUES (N'alpha')", &[])
            .await
            .unwrap();
        mssql_admin::drivers::mssql::connection::close(client).await;
    }

    let ctx = OperationContext::new(BackendKind::Mapped, "end_to_end");
    let sample = router.fetch_rows(&ctx, &base, db, "T1", 1).await.unwrap();
    assert_eq!(sample.provider, "ORM");
    let pk = router.get_primary_key_columns(&ctx, &base, db, "T1").await.unwrap();
    let key_column = tracking_key(&pk.data).unwrap();
    let key = sample.data.value(0, &key_column).cloned().unwrap();

    let tracking = router.tracking();
    let mut session = tracking
        .start_tracking(&base, db, "T1", &key_column, key.clone(), &sample.data.field_specs())
        .await
        .unwrap();
    assert_eq!(session.state(), EntityState::Unchanged);
    assert_eq!(session.get("Name"), Some(&SqlValue::from("alpha")));

    session.set_value("Name", SqlValue::from("beta")).unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, EntityState::Modified);
    assert_eq!(snapshot.modified_columns, vec!["Name".to_string()]);
    assert_eq!(
        snapshot.state_text(),
        "Tracking State: Modified (Modified: Name)"
    );

    session.revert();
    assert_eq!(session.state(), EntityState::Unchanged);
    session.dispose().await;

    // Second session on the same shape reuses the compiled model
    let compiled = tracking.model_cache().compilations();
    let session = tracking
        .start_tracking(&base, db, "T1", &key_column, key, &sample.data.field_specs())
        .await
        .unwrap();
    assert_eq!(tracking.model_cache().compilations(), compiled);
    session.dispose().await;

    let err = tracking
        .start_tracking(
            &base,
            db,
            "T1",
            &key_column,
            SqlValue::Int(999_999),
            &sample.data.field_specs(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::NotFound(_)));

    admin.drop_database(&base, db).await.unwrap();
}
