//! Inference backend implementations.

mod scripted;
#[cfg(feature = "backend-tract")]
mod tract;

pub use scripted::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use anyhow::Result;

use crate::config::WatchConfig;
use crate::Fault;

use super::backend::InferenceBackend;

/// Build the backend named in the configuration.
///
/// "scripted" runs with no model and never detects anything; it exists for
/// stub sources and bench runs. Real deployments select "tract".
pub fn select_backend(cfg: &WatchConfig) -> Result<Box<dyn InferenceBackend>> {
    match cfg.backend.as_str() {
        "scripted" => Ok(Box::new(ScriptedBackend::quiet())),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                let resolution = cfg.resolution.ok_or_else(|| {
                    Fault::Configuration(
                        "the tract backend requires an explicit resolution".to_string(),
                    )
                })?;
                Ok(Box::new(TractBackend::load(
                    &cfg.model_path,
                    resolution.width,
                    resolution.height,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(Fault::Configuration(
                    "the tract backend requires the backend-tract feature".to_string(),
                )
                .into())
            }
        }
        other => {
            Err(Fault::Configuration(format!("unknown inference backend '{}'", other)).into())
        }
    }
}
