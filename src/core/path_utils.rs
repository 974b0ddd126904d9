/*
 * Utility for resolving the application's local data directory, used by the
 * run-log sink. The directory is created on first use if it does not exist.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/*
 * Retrieves the application's local (non-roaming) data directory, creating
 * it if necessary. The path is derived without an organization qualifier,
 * placing it directly under the user's local application data structure.
 * Returns `None` if the directory could not be determined or created.
 */
pub fn get_base_app_data_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving base app data local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let data_path = proj_dirs.data_local_dir();
        if !data_path.exists() {
            if let Err(e) = fs::create_dir_all(data_path) {
                log::error!("PathUtils: Failed to create app data directory {data_path:?}: {e}");
                return None;
            }
            log::debug!("PathUtils: Created app data directory: {data_path:?}");
        }
        Some(data_path.to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_get_base_app_data_local_dir_creates_and_reuses() {
        // Unique app name so the test cannot collide with real user data.
        let unique_app_name = format!("TestApp_BorradoSeguro_{}", rand::random::<u128>());

        let first = get_base_app_data_local_dir(&unique_app_name)
            .expect("should resolve a data dir for a fresh app name");
        assert!(first.exists());
        assert!(first.is_dir());

        let second = get_base_app_data_local_dir(&unique_app_name)
            .expect("should resolve the same dir again");
        assert_eq!(first, second);

        // Cleanup
        if let Err(e) = fs::remove_dir_all(&first) {
            eprintln!("Test cleanup failed for {first:?}: {e}");
        }
    }
}
