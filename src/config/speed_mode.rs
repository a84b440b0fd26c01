//! config/speed_mode.rs
//! Modos de velocidad: cada uno agrupa los tiempos de espera (en segundos).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    /// Conservador
    Safe,
    /// Balanceado
    Fast,
    /// Agresivo
    Turbo,
}

/// Tiempos asociados a un modo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelayProfile {
    /// Espera tras abrir el deep link, antes de buscar la caja de texto.
    pub open_delay: f64,
    /// Espera tras disparar el envío para que el mensaje entre a la cola.
    pub settle_delay: f64,
    /// Espera extra después de un intento fallido.
    pub fail_delay: f64,
    /// Rango aleatorio entre destinatarios.
    pub min_between: f64,
    pub max_between: f64,
}

impl SpeedMode {
    pub fn profile(self) -> DelayProfile {
        match self {
            SpeedMode::Safe => DelayProfile {
                open_delay: 8.0,
                settle_delay: 4.0,
                fail_delay: 7.0,
                min_between: 15.0,
                max_between: 45.0,
            },
            SpeedMode::Fast => DelayProfile {
                open_delay: 5.0,
                settle_delay: 2.0,
                fail_delay: 4.0,
                min_between: 8.0,
                max_between: 15.0,
            },
            SpeedMode::Turbo => DelayProfile {
                open_delay: 3.0,
                settle_delay: 1.0,
                fail_delay: 2.0,
                min_between: 5.0,
                max_between: 8.0,
            },
        }
    }
}

impl Default for SpeedMode {
    fn default() -> Self {
        SpeedMode::Fast
    }
}

impl FromStr for SpeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" | "conservative" => Ok(SpeedMode::Safe),
            "fast" | "balanced" => Ok(SpeedMode::Fast),
            "turbo" | "aggressive" => Ok(SpeedMode::Turbo),
            other => Err(format!("Modo de velocidad desconocido: {}", other)),
        }
    }
}

impl fmt::Display for SpeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpeedMode::Safe => "safe",
            SpeedMode::Fast => "fast",
            SpeedMode::Turbo => "turbo",
        };
        f.write_str(s)
    }
}
