//! Renderer errors (backend-agnostic where possible).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    Surface(String),
    #[error("No suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("Failed to create device: {0}")]
    Device(String),
    #[error("Shader program '{label}' failed to build: {message}")]
    Shader { label: String, message: String },
    #[error("Failed to create {what} '{label}': {message}")]
    Resource {
        what: &'static str,
        label: String,
        message: String,
    },
    #[error("Surface texture unavailable: {0}")]
    Frame(#[from] wgpu::SurfaceError),
}

impl RenderError {
    pub(crate) fn resource(what: &'static str, label: &str, message: impl ToString) -> Self {
        Self::Resource {
            what,
            label: label.to_owned(),
            message: message.to_string(),
        }
    }

    /// Lost or outdated surfaces are fixed by reconfiguring; everything else is not.
    pub fn is_surface_lost(&self) -> bool {
        matches!(
            self,
            Self::Frame(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
