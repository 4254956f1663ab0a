use grill_stats::config::DatabaseConfig;
use grill_stats::database::models::{
    AlertFilter, AlertKind, DeviceFilter, DeviceUpdate, NewDevice, NewGrillingSession,
    NewTemperatureAlert, NewUser, SessionFilter, UserFilter, UserUpdate,
};
use grill_stats::{Database, Managers, ModelError};
use proptest::prelude::*;
use rstest::rstest;

async fn managers() -> Managers {
    let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
    db.create_schema().await.unwrap();
    db.managers()
}

async fn row_counts(managers: &Managers) -> [usize; 4] {
    [
        managers.users().list(UserFilter::default()).await.unwrap().len(),
        managers.devices().list(DeviceFilter::default()).await.unwrap().len(),
        managers.alerts().list(AlertFilter::default()).await.unwrap().len(),
        managers.sessions().list(SessionFilter::default()).await.unwrap().len(),
    ]
}

#[tokio::test]
async fn test_deleting_user_cascades_to_devices_and_alerts() {
    let managers = managers().await;
    let user = managers
        .users()
        .create(NewUser::new("a@example.com", "hash"))
        .await
        .unwrap();
    let device = managers
        .devices()
        .create(NewDevice::new(user.id, "TW-1000", "Offset smoker"))
        .await
        .unwrap();
    let alert = managers
        .alerts()
        .create(NewTemperatureAlert::new(device.id, "Pit high", AlertKind::Above, 200.0))
        .await
        .unwrap();
    let session = managers
        .sessions()
        .create(NewGrillingSession::new(device.id, "Brisket"))
        .await
        .unwrap();

    managers.users().delete(user.id).await.unwrap();

    assert_eq!(managers.users().get(user.id).await.unwrap(), None);
    assert_eq!(managers.devices().get(device.id).await.unwrap(), None);
    assert_eq!(managers.alerts().get(alert.id).await.unwrap(), None);
    assert_eq!(managers.sessions().get(session.id).await.unwrap(), None);
    assert_eq!(row_counts(&managers).await, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_deleting_device_keeps_owner() {
    let managers = managers().await;
    let user = managers
        .users()
        .create(NewUser::new("keep@example.com", "hash"))
        .await
        .unwrap();
    let device = managers
        .devices()
        .create(NewDevice::new(user.id, "TW-1001", "Kettle"))
        .await
        .unwrap();
    managers
        .alerts()
        .create(NewTemperatureAlert::new(device.id, "Low", AlertKind::Below, 225.0))
        .await
        .unwrap();

    managers.devices().delete(device.id).await.unwrap();
    assert_eq!(row_counts(&managers).await, [1, 0, 0, 0]);
}

#[tokio::test]
async fn test_duplicate_unique_field_creates_no_row() {
    let managers = managers().await;
    let user = managers
        .users()
        .create(NewUser::new("dup@example.com", "hash"))
        .await
        .unwrap();
    managers
        .devices()
        .create(NewDevice::new(user.id, "TW-2000", "One"))
        .await
        .unwrap();

    let err = managers
        .users()
        .create(NewUser::new("DUP@example.com", "other"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::UniquenessViolation { entity: "User", .. }));

    let err = managers
        .devices()
        .create(NewDevice::new(user.id, "TW-2000", "Two"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::UniquenessViolation { entity: "Device", .. }));

    assert_eq!(row_counts(&managers).await, [1, 1, 0, 0]);
}

#[rstest]
#[case::user("User")]
#[case::device("Device")]
#[case::alert("TemperatureAlert")]
#[case::session("GrillingSession")]
#[tokio::test]
async fn test_missing_id_is_not_found_and_changes_nothing(#[case] entity: &str) {
    let managers = managers().await;
    let user = managers
        .users()
        .create(NewUser::new("nf@example.com", "hash"))
        .await
        .unwrap();
    let before = row_counts(&managers).await;
    let missing = 4242;

    let (get_is_none, update, delete) = match entity {
        "User" => (
            managers.users().get(missing).await.unwrap().is_none(),
            managers
                .users()
                .update(missing, UserUpdate { is_active: Some(false), ..Default::default() })
                .await
                .map(|_| ()),
            managers.users().delete(missing).await,
        ),
        "Device" => (
            managers.devices().get(missing).await.unwrap().is_none(),
            managers
                .devices()
                .update(missing, DeviceUpdate { user_id: Some(user.id), ..Default::default() })
                .await
                .map(|_| ()),
            managers.devices().delete(missing).await,
        ),
        "TemperatureAlert" => (
            managers.alerts().get(missing).await.unwrap().is_none(),
            managers
                .alerts()
                .update(missing, Default::default())
                .await
                .map(|_| ()),
            managers.alerts().delete(missing).await,
        ),
        _ => (
            managers.sessions().get(missing).await.unwrap().is_none(),
            managers
                .sessions()
                .update(missing, Default::default())
                .await
                .map(|_| ()),
            managers.sessions().delete(missing).await,
        ),
    };

    assert!(get_is_none);
    assert!(matches!(update, Err(ModelError::NotFound { id: 4242, .. })));
    assert!(matches!(delete, Err(ModelError::NotFound { id: 4242, .. })));
    assert_eq!(row_counts(&managers).await, before);
}

#[tokio::test]
async fn test_device_requires_existing_user() {
    let managers = managers().await;
    let err = managers
        .devices()
        .create(NewDevice::new(77, "TW-3000", "Orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::ForeignKeyViolation { entity: "Device" }));
    assert_eq!(row_counts(&managers).await, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_update_reflects_field_and_keeps_the_rest() {
    let managers = managers().await;
    let user = managers
        .users()
        .create(NewUser::new("rt@example.com", "hash").with_display_name("Pitmaster"))
        .await
        .unwrap();
    let device = managers
        .devices()
        .create(
            NewDevice::new(user.id, "TW-4000", "Weber")
                .with_metadata(serde_json::json!({"probes": 4})),
        )
        .await
        .unwrap();

    managers
        .devices()
        .update(
            device.id,
            DeviceUpdate {
                name: Some("Weber Kettle 22".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fetched = managers.devices().get(device.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Weber Kettle 22");
    assert_eq!(fetched.user_id, device.user_id);
    assert_eq!(fetched.device_id, device.device_id);
    assert_eq!(fetched.device_type, device.device_type);
    assert_eq!(fetched.metadata, device.metadata);
    assert_eq!(fetched.is_active, device.is_active);
    assert_eq!(fetched.created_at, device.created_at);
    assert!(fetched.updated_at >= device.updated_at);

    let unchanged = managers.users().get(user.id).await.unwrap().unwrap();
    assert_eq!(unchanged, user);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_create_then_get_returns_created_alert(
        threshold in -100.0f64..=1000.0,
        above in any::<bool>(),
        name in "[A-Za-z][A-Za-z ]{0,30}",
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let managers = managers().await;
            let user = managers
                .users()
                .create(NewUser::new("prop@example.com", "hash"))
                .await
                .unwrap();
            let device = managers
                .devices()
                .create(NewDevice::new(user.id, "TW-PROP", "Prop"))
                .await
                .unwrap();
            let kind = if above { AlertKind::Above } else { AlertKind::Below };

            let created = managers
                .alerts()
                .create(NewTemperatureAlert::new(device.id, name.clone(), kind, threshold))
                .await
                .unwrap();
            let fetched = managers.alerts().get(created.id).await.unwrap();
            prop_assert_eq!(fetched, Some(created));
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_closed_pool_fails_manager_calls_as_storage_unavailable() {
    let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
    db.create_schema().await.unwrap();
    let managers = db.managers();
    db.close().await;

    let err = managers
        .users()
        .create(NewUser::new("late@example.com", "hash"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::StorageUnavailable(_)), "{err:?}");
    assert!(err.is_transient());

    let err = managers
        .devices()
        .list(DeviceFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::StorageUnavailable(_)), "{err:?}");
}
