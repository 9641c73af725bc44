use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

// CONFIGURATION STRUCTS

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoinAsset {
    pub name: String,    // file key, e.g. "bitcoin"
    pub coin_id: String, // CoinGecko id
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub initial_lookback_days: u32, // first download
    pub update_padding_days: u32,   // extra days requested on top of the gap
    pub coins: Vec<CoinAsset>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeckoTerminalConfig {
    pub base_url: String,
    pub network: String,
    pub pool_address: String,
    pub timeframe: String, // "day", "hour", "minute"
    pub name: String,      // file key, e.g. "qflow"
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub charts_dir: PathBuf,
    pub coingecko: CoinGeckoConfig,
    pub geckoterminal: GeckoTerminalConfig,
    // file key -> label shown in tables and charts
    pub display_names: BTreeMap<String, String>,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        let coin = |id: &str| CoinAsset {
            name: id.to_string(),
            coin_id: id.to_string(),
        };
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            initial_lookback_days: 120,
            update_padding_days: 2,
            coins: vec![coin("bitcoin"), coin("ethereum"), coin("solana")],
        }
    }
}

impl Default for GeckoTerminalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geckoterminal.com/api/v2".to_string(),
            network: "solana".to_string(),
            pool_address: "2utzyuC6hzPXyzMAW9dNhr3oB11H2GLkrfCsdMfKMp6r".to_string(),
            timeframe: "day".to_string(),
            name: "qflow".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("price_data"),
            charts_dir: PathBuf::from("."),
            coingecko: CoinGeckoConfig::default(),
            geckoterminal: GeckoTerminalConfig::default(),
            display_names: BTreeMap::from([("qflow".to_string(), "Quantum Flow".to_string())]),
        }
    }
}

impl AppConfig {
    /// Loads `storage/config.json` next to the binary, writing the defaults on first run.
    pub async fn load() -> anyhow::Result<Self> {
        let storage = AsyncStorageManager::new_relative("storage").await?;
        storage.load_or_init("config").await
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the storage directory (e.g. ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Storage directory resolved relative to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// Storage directory at an explicit location; created if missing.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// Serializes `data` as pretty JSON. Writes a `.tmp` sibling first and renames
    /// it over the target, so a crash mid-write leaves the old file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Like [`load`](Self::load), but a missing file is created from `T::default()`.
    pub async fn load_or_init<T>(&self, filename: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        match fs::read(self.path_for(filename)).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let data = T::default();
                self.save(filename, &data).await?;
                info!(path = %self.path_for(filename).display(), "wrote default configuration");
                Ok(data)
            }
            Err(e) => Err(e.into()),
        }
    }
}
