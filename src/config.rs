//! Configuração da estação carregada a partir de `pressure.toml`.
//!
//! A struct [`PressureConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults documentados.
//! A variável de ambiente `PRESSURE_STATION` tem precedência sobre o arquivo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PressureError;
use crate::grid::{MAX_COLUMNS, PositionMapper, normalize_code};
use crate::session::{InputMode, RetryConfig};

/// Nome padrão do arquivo de configuração no diretório atual.
pub const CONFIG_FILE: &str = "pressure.toml";

/// Variável de ambiente que sobrescreve o identificador da estação.
pub const STATION_ENV: &str = "PRESSURE_STATION";

/// Configuração de nível superior carregada de `pressure.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureConfig {
    /// Colunas da grade; cada letra tem `2 * columns` posições.
    #[serde(default = "default_columns")]
    pub columns: u32,

    /// Duração padrão de cada contagem, em segundos.
    #[serde(default = "default_duration_seconds")]
    pub default_duration_seconds: u32,

    /// Durações por código (`"A-01" = 1800`), sobrescrevem o padrão.
    #[serde(default)]
    pub custom_durations: BTreeMap<String, u32>,

    /// Modo de entrada ativo ao iniciar a sessão.
    #[serde(default)]
    pub default_input_mode: InputMode,

    /// Identificador desta estação. Obrigatório.
    #[serde(default)]
    pub station: String,

    /// Estação anterior; quando ausente, vem da tabela de estações do armazenamento.
    #[serde(default)]
    pub previous_station: Option<String>,

    #[serde(default)]
    pub store: StoreConfig,

    /// Retentativas ao gravar um registro (0 = falha e avisa o operador).
    #[serde(default)]
    pub persist_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial das retentativas.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// Parâmetros de conexão com o armazenamento de registros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// Valor padrão para colunas: 13 (26 posições por letra).
fn default_columns() -> u32 {
    13
}

// Valor padrão para a duração: 3600s = 1 hora.
fn default_duration_seconds() -> u32 {
    3600
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pressure.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            default_duration_seconds: default_duration_seconds(),
            custom_durations: BTreeMap::new(),
            default_input_mode: InputMode::default(),
            station: String::new(),
            previous_station: None,
            store: StoreConfig::default(),
            persist_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl PressureConfig {
    /// Carrega a configuração de `path`, ou de `pressure.toml` no diretório atual.
    /// Usa valores padrão se o arquivo padrão não existir.
    pub fn load(path: Option<&Path>) -> Result<Self, PressureError> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::from_toml_str(&std::fs::read_to_string(path)?)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo para a estação.
        if let Some(station) = std::env::var(STATION_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            config.station = station.trim().to_string();
        }

        Ok(config)
    }

    /// Interpreta um documento TOML, normalizando os códigos das durações.
    pub fn from_toml_str(contents: &str) -> Result<Self, PressureError> {
        let mut config: PressureConfig = toml::from_str(contents)?;
        config.custom_durations = std::mem::take(&mut config.custom_durations)
            .into_iter()
            .map(|(code, secs)| (normalize_code(&code), secs))
            .collect();
        Ok(config)
    }

    /// Rejeita configurações com as quais a estação não pode operar.
    pub fn validate(&self) -> Result<(), PressureError> {
        if self.station.trim().is_empty() {
            return Err(PressureError::ConfigurationInvalid(
                "no station id configured (set `station` or PRESSURE_STATION)".into(),
            ));
        }
        self.validate_grid()?;
        if self.default_duration_seconds == 0 {
            return Err(PressureError::ConfigurationInvalid(
                "`default_duration_seconds` must be positive".into(),
            ));
        }

        let mapper = PositionMapper::new(self.columns);
        for (code, secs) in &self.custom_durations {
            if !mapper.is_valid_code(code) {
                return Err(PressureError::ConfigurationInvalid(format!(
                    "custom duration for unknown timer code {code}"
                )));
            }
            if *secs == 0 {
                return Err(PressureError::ConfigurationInvalid(format!(
                    "custom duration for {code} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Só a geometria da grade; o comando `grid` não exige estação.
    pub fn validate_grid(&self) -> Result<(), PressureError> {
        if !(1..=MAX_COLUMNS).contains(&self.columns) {
            return Err(PressureError::ConfigurationInvalid(format!(
                "`columns` must be between 1 and {MAX_COLUMNS}, got {}",
                self.columns
            )));
        }
        Ok(())
    }

    /// Duração para um código: o valor personalizado, se houver, senão o padrão.
    pub fn duration_for(&self, code: &str) -> u32 {
        self.custom_durations
            .get(&normalize_code(code))
            .copied()
            .unwrap_or(self.default_duration_seconds)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.persist_retries,
            base_delay_ms: self.retry_base_delay_ms,
        }
    }
}
