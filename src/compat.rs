//! Legacy entity names.
//!
//! Older call sites construct what look like entity types (`User::new(db)`)
//! and call CRUD methods on them. These aliases point those names at the
//! managers. New code should use [`crate::database::managers`] directly;
//! this module can be removed once no caller imports it.

pub use crate::database::managers::{
    DeviceManager as Device, GrillingSessionManager as GrillingSession,
    TemperatureAlertManager as TemperatureAlert, UserManager as User,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::managers::test_support;
    use crate::database::models::{NewDevice, NewUser};

    #[tokio::test]
    async fn test_legacy_names_behave_as_managers() {
        let db = test_support::database().await;

        let user = User::new(db.clone())
            .create(NewUser::new("legacy@example.com", "hash"))
            .await
            .unwrap();
        let device = Device::new(db.clone())
            .create(NewDevice::new(user.id, "TW-LEGACY", "Old smoker"))
            .await
            .unwrap();

        let fetched = crate::database::managers::DeviceManager::new(db)
            .get(device.id)
            .await
            .unwrap();
        assert_eq!(fetched, Some(device));
    }
}
