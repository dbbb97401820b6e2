//! Configuration for a patch run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tile store configuration
    pub store: StoreConfig,

    /// Patch raster configuration
    pub patch: PatchConfig,
}

/// Backing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the tile database file
    pub database: String,
}

/// Patch raster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Path to the patch raster (ESRI ASCII grid)
    pub path: String,

    /// Category tag the affected tiles must carry
    #[serde(default = "default_category")]
    pub category: String,

    /// Numeric CRS identifier shared by the patch and the mosaic
    #[serde(default = "default_srid")]
    pub srid: i32,

    /// Value in the patch file to treat as no-data, overriding the file's
    /// own nodata header. Either way the patch is normalized to the -99
    /// sentinel before merging.
    #[serde(default)]
    pub source_no_data: Option<f64>,
}

fn default_category() -> String {
    "rice".to_string()
}

fn default_srid() -> i32 {
    4326
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.database.is_empty() {
            anyhow::bail!("store.database must not be empty");
        }
        if self.patch.path.is_empty() {
            anyhow::bail!("patch.path must not be empty");
        }
        if self.patch.category.is_empty() {
            anyhow::bail!("patch.category must not be empty");
        }
        if self.patch.srid <= 0 {
            anyhow::bail!("patch.srid must be a positive EPSG code");
        }
        Ok(())
    }
}

/// Commented sample configuration, written by `generate-config`.
pub const SAMPLE_CONFIG: &str = r#"# mosaic-patch configuration

# === STORE: the tile database holding the mosaic ===
store:
  # Path to the tile database file
  database: "mosaic.db"

# === PATCH: the new raster whose values override the mosaic ===
patch:
  # Path to the patch raster (ESRI ASCII grid; cellsize or dx/dy headers)
  path: "planting_dates.asc"

  # Only tiles carrying this category tag are patched
  category: "rice"

  # EPSG code shared by the patch and every affected tile
  srid: 4326

  # Optional: a value in the file to treat as no-data, overriding the
  # file's nodata_value header. The patch is normalized to the -99
  # sentinel either way.
  # source_no_data: 0
"#;
