use std::fmt;
use std::str::FromStr;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::SessionBuilder;
use serde::{Deserialize, Serialize};

/// Numeric execution backend for the detection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Platform preference, falling back to CPU.
    #[default]
    Auto,
    Cpu,
    CoreMl,
    DirectMl,
}

impl Backend {
    pub const ALL: &[Backend] = &[Backend::Auto, Backend::Cpu, Backend::CoreMl, Backend::DirectMl];

    /// Execution providers to register for this backend, in priority order.
    ///
    /// ONNX Runtime always keeps the CPU provider as the final fallback, so
    /// `Cpu` registers nothing.
    pub fn execution_providers(self) -> Result<Vec<ExecutionProviderDispatch>, String> {
        match self {
            Backend::Auto => Ok(preferred_execution_providers()),
            Backend::Cpu => Ok(vec![]),
            Backend::CoreMl => coreml_provider(),
            Backend::DirectMl => directml_provider(),
        }
    }

    /// Initialize the runtime with this backend's providers and return a
    /// session builder ready to load a model.
    pub fn ready(self) -> Result<SessionBuilder, Box<dyn std::error::Error>> {
        let providers = self.execution_providers()?;
        log::info!("Initializing ONNX Runtime backend: {self} ({} providers)", providers.len());
        let builder = ort::session::Session::builder()?;
        if providers.is_empty() {
            return Ok(builder);
        }
        Ok(builder.with_execution_providers(providers)?)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Auto => write!(f, "auto"),
            Backend::Cpu => write!(f, "cpu"),
            Backend::CoreMl => write!(f, "coreml"),
            Backend::DirectMl => write!(f, "directml"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "cpu" => Ok(Backend::Cpu),
            "coreml" => Ok(Backend::CoreMl),
            "directml" => Ok(Backend::DirectMl),
            other => Err(format!(
                "Backend must be one of: auto, cpu, coreml, directml, got '{other}'"
            )),
        }
    }
}

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

fn coreml_provider() -> Result<Vec<ExecutionProviderDispatch>, String> {
    #[cfg(target_os = "macos")]
    {
        Ok(vec![
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
        ])
    }
    #[cfg(not(target_os = "macos"))]
    {
        Err("CoreML backend is only available on macOS".into())
    }
}

fn directml_provider() -> Result<Vec<ExecutionProviderDispatch>, String> {
    #[cfg(target_os = "windows")]
    {
        Ok(vec![
            ort::execution_providers::DirectMLExecutionProvider::default().build(),
        ])
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err("DirectML backend is only available on Windows".into())
    }
}
