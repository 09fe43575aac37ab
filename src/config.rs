use std::path::PathBuf;

use serde::Deserialize;

/// Application settings, read from the same figment as Rocket's own
/// (`Rocket.toml`, `ROCKET_*` environment variables).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// SQLite file holding every table.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Create the default category tree when the category table is empty.
    #[serde(default = "default_seed_categories")]
    pub seed_categories: bool,
}

fn default_database() -> PathBuf {
    PathBuf::from("data").join("bookkeeper.sqlite")
}

fn default_seed_categories() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            seed_categories: default_seed_categories(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config: AppConfig = Figment::new().extract().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn values_come_from_the_figment() {
        let config: AppConfig = Figment::new()
            .merge(("database", "/tmp/books.sqlite"))
            .merge(("seed_categories", false))
            .extract()
            .unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/books.sqlite"));
        assert!(!config.seed_categories);
    }
}
