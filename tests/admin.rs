use anyhow::Result;
use serial_test::serial;
use std::time::Duration;
use sumstore::backend::Sqlite;
use sumstore::transitive::{self, Transitive};
use sumstore::{ClientConfig, Error, Location, StoreClient};

const SECRET: &[u8] = b"admin-secret";

fn config() -> ClientConfig {
    ClientConfig {
        admin_secret: SECRET.to_vec(),
        ..ClientConfig::default()
    }
}

async fn client() -> Result<Transitive<StoreClient>> {
    Ok(transitive::store_client::<_, Sqlite>(Location::InMemory, config()).await?)
}

/// A throwaway on-disk path under the system temp directory.
fn temp_path(name: &str) -> String {
    let path = std::env::temp_dir().join(format!("sumstore_{name}_{}", std::process::id()));
    path.to_string_lossy().into_owned()
}

#[tokio::test]
#[serial]
async fn wrong_secret_is_rejected_for_every_command() -> Result<()> {
    let mut client = client().await?;
    client.set_admin_secret(b"wrong");

    match client.admin_status().await {
        Err(Error::AuthFailure { .. }) => {}
        other => panic!("expected AuthFailure, got {other:?}"),
    }
    match client.admin_sync().await {
        Err(Error::AuthFailure { .. }) => {}
        other => panic!("expected AuthFailure, got {other:?}"),
    }
    match client.admin_gc().await {
        Err(Error::AuthFailure { .. }) => {}
        other => panic!("expected AuthFailure, got {other:?}"),
    }
    match client.admin_stop().await {
        Err(Error::AuthFailure { .. }) => {}
        other => panic!("expected AuthFailure, got {other:?}"),
    }

    // The store must still be reachable: nothing above was dispatched.
    client.set_admin_secret(SECRET);
    client.ping().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn status_reports_decodable_statistics() -> Result<()> {
    let mut client = client().await?;
    let _set = client.set("k1", "v").await?;
    let _set = client.set("k2", "v").await?;
    let _set = client.set("k2", "w").await?;

    let status = client.admin_status().await?;
    assert_eq!(status.key_count, 2);
    assert_eq!(status.max_version, 3);
    assert!(status.db_size > 0);

    Ok(())
}

#[tokio::test]
#[serial]
async fn sync_and_gc_are_fire_and_forget() -> Result<()> {
    let mut client = client().await?;
    let _set = client.set("k", "v").await?;

    client.admin_sync().await?;
    client.admin_gc().await?;

    let get = client.get("k").await?;
    assert_eq!(get.data, b"v");
    Ok(())
}

#[tokio::test]
#[serial]
async fn backup_and_restore_move_data_between_stores() -> Result<()> {
    let backup_path = temp_path("admin_backup.db");
    let _res = std::fs::remove_file(&backup_path);

    let mut source = client().await?;
    let _set = source.set("k", "payload").await?;

    let outcome = source.admin_backup(&backup_path, 0).await?;
    assert_eq!(outcome.target, backup_path);
    assert_eq!(outcome.since, "0");

    let mut target = client().await?;
    let outcome = target.admin_restore(&backup_path).await?;
    assert_eq!(outcome.target, "ok");

    let get = target.get("k").await?;
    assert_eq!(get.data, b"payload");

    let _res = std::fs::remove_file(&backup_path);
    Ok(())
}

#[tokio::test]
#[serial]
async fn stop_shuts_the_server_down() -> Result<()> {
    let mut client = client().await?;
    client.ping().await?;

    client.admin_stop().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(client.ping().await.is_err());
    Ok(())
}
