//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, stations,
//! station, check, grid) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::session::InputMode;

/// Grade de timers de pressão com verificação de sequência entre estações.
#[derive(Debug, Parser)]
#[command(name = "pressure-timer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./pressure.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Modo de entrada aceito pela CLI, mapeado para [`InputMode`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Apenas o código da posição.
    General,
    /// Código de barras e um código de posição.
    Double,
    /// Código de barras e dois códigos de posição.
    Triple,
}

impl From<ModeArg> for InputMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::General => InputMode::General,
            ModeArg::Double => InputMode::DoubleInput,
            ModeArg::Triple => InputMode::TripleInput,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Abre a sessão interativa da estação.
    Run {
        /// Modo de entrada inicial; sobrescreve `default_input_mode`.
        #[arg(long, short)]
        mode: Option<ModeArg>,
    },

    /// Lista as estações cadastradas e suas predecessoras.
    Stations,

    /// Gerencia o cadastro de estações.
    Station {
        #[command(subcommand)]
        action: StationAction,
    },

    /// Verifica se um código de barras pode iniciar nesta estação.
    Check {
        barcode: String,
    },

    /// Mostra todas as posições válidas da grade.
    Grid,
}

#[derive(Debug, Subcommand)]
pub enum StationAction {
    /// Cadastra ou atualiza uma estação.
    Add {
        name: String,

        /// Estação que precede esta na linha.
        #[arg(long)]
        previous: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}
