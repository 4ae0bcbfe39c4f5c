// ABOUTME: Profile management CLI commands
// ABOUTME: List, save, activate and remove named connection settings in the config file

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, ConnectionSettings};
use crate::ApiResponse;

/// A saved profile without its password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePublic {
    pub name: String,
    pub driver: String,
    pub server: String,
    pub database: String,
    pub user: String,
    pub trust_certificate: bool,
    pub is_active: bool,
}

impl ProfilePublic {
    fn new(name: &str, settings: &ConnectionSettings, config: &AppConfig) -> Self {
        Self {
            name: name.to_string(),
            driver: settings.driver.clone(),
            server: settings.server.clone(),
            database: settings.database.clone(),
            user: settings.user.clone(),
            trust_certificate: settings.trust_certificate,
            is_active: config.active_profile == name,
        }
    }
}

/// Get all profiles, sorted by name (without passwords)
pub fn get_profiles(path: &Path) -> ApiResponse<Vec<ProfilePublic>> {
    let config = match AppConfig::load_or_default(path) {
        Ok(c) => c,
        Err(e) => return ApiResponse::error(format!("Failed to load config: {}", e)),
    };

    let mut profiles: Vec<ProfilePublic> = config
        .profiles
        .iter()
        .map(|(name, settings)| ProfilePublic::new(name, settings, &config))
        .collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    ApiResponse::success(profiles)
}

/// Add or update a profile; the first profile saved becomes active
pub fn save_profile(
    path: &Path,
    name: &str,
    settings: ConnectionSettings,
    activate: bool,
) -> ApiResponse<ProfilePublic> {
    if let Err(e) = settings.validate() {
        return ApiResponse::error(format!("Invalid settings: {}", e));
    }

    let mut config = match AppConfig::load_or_default(path) {
        Ok(c) => c,
        Err(e) => return ApiResponse::error(format!("Failed to load config: {}", e)),
    };

    if activate || config.profiles.is_empty() {
        config.active_profile = name.to_string();
    }
    config.set_profile(name.to_string(), settings.clone());

    match config.save_to(path) {
        Ok(()) => ApiResponse::success(ProfilePublic::new(name, &settings, &config))
            .with_info(format!("Saved profile {}", name)),
        Err(e) => ApiResponse::error(format!("Failed to save config: {}", e)),
    }
}

/// Make an existing profile the active one
pub fn set_active_profile(path: &Path, name: &str) -> ApiResponse<()> {
    let mut config = match AppConfig::load_from(path) {
        Ok(c) => c,
        Err(e) => return ApiResponse::error(format!("Failed to load config: {}", e)),
    };

    if let Err(e) = config.profile(name) {
        return ApiResponse::error(format!("Failed to set active profile: {}", e));
    }
    config.active_profile = name.to_string();

    match config.save_to(path) {
        Ok(()) => ApiResponse::success(()),
        Err(e) => ApiResponse::error(format!("Failed to save config: {}", e)),
    }
}

/// Delete a profile; the last remaining profile cannot be deleted
pub fn delete_profile(path: &Path, name: &str) -> ApiResponse<()> {
    let mut config = match AppConfig::load_from(path) {
        Ok(c) => c,
        Err(e) => return ApiResponse::error(format!("Failed to load config: {}", e)),
    };

    if let Err(e) = config.remove_profile(name) {
        return ApiResponse::error(format!("Failed to delete profile: {}", e));
    }

    match config.save_to(path) {
        Ok(()) => ApiResponse::success(()),
        Err(e) => ApiResponse::error(format!("Failed to save config: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &str) -> ConnectionSettings {
        ConnectionSettings {
            driver: "ODBC Driver 18 for SQL Server".to_string(),
            server: server.to_string(),
            database: "Analytics".to_string(),
            user: "analyst".to_string(),
            password: "secret".to_string(),
            trust_certificate: true,
        }
    }

    #[test]
    fn test_first_saved_profile_becomes_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let response = save_profile(&path, "prod", settings("db.prod"), false);
        assert!(response.success);
        assert!(response.data.unwrap().is_active);

        let response = save_profile(&path, "dev", settings("localhost"), false);
        assert!(!response.data.unwrap().is_active);

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.active_profile, "prod");
        assert_eq!(config.profile("dev").unwrap().server, "localhost");
    }

    #[test]
    fn test_listing_hides_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_profile(&path, "b", settings("host-b"), false);
        save_profile(&path, "a", settings("host-a"), true);

        let profiles = get_profiles(&path).data.unwrap();
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(profiles[0].is_active);

        let json = serde_json::to_string(&profiles).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_switch_and_delete_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_profile(&path, "prod", settings("db.prod"), false);
        save_profile(&path, "dev", settings("localhost"), false);

        assert!(set_active_profile(&path, "dev").success);
        assert!(!set_active_profile(&path, "missing").success);
        assert_eq!(AppConfig::load_from(&path).unwrap().active_profile, "dev");

        assert!(delete_profile(&path, "dev").success);
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.active_profile, "prod");
        assert!(config.profile("dev").is_err());

        let response = delete_profile(&path, "prod");
        assert!(!response.success);
        assert!(AppConfig::load_from(&path).unwrap().profile("prod").is_ok());
    }

    #[test]
    fn test_save_rejects_incomplete_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut incomplete = settings("localhost");
        incomplete.password.clear();

        assert!(!save_profile(&path, "broken", incomplete, false).success);
        assert!(!path.exists());
    }
}
