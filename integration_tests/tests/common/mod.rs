use std::path::PathBuf;
use std::sync::{Arc, Once};

use multiblock_core::{load_registry_config_from_env, RegistryConfig};

static INIT: Once = Once::new();

pub fn ensure_test_config() -> Arc<RegistryConfig> {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_registry_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test registry config at {}",
            config_path.display()
        );

        std::env::set_var("MULTIBLOCK_CONFIG_PATH", &config_path);
    });
    load_registry_config_from_env()
}
