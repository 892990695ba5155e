use playback::PlaybackError;

/// Failures of the effect pipeline, from start-up through per-frame work.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no compatible graphics backend: {0}")]
    UnsupportedPlatform(String),
    #[error("failed to acquire a GPU device: {0}")]
    DeviceAcquisition(String),
    #[error("failed to build the effect pipeline: {0}")]
    PipelineBuild(String),
    #[error("failed to acquire source: {0}")]
    SourceAcquisition(#[from] PlaybackError),
    #[error("failed to rebuild the source texture at {width}x{height}: {reason}")]
    TextureRebuild {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error(transparent)]
    Validation(#[from] params::ValidationError),
    #[error("presentation surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl PipelineError {
    /// Start-up failures and broken GPU resources stop the frame loop; the rest are reported and skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::UnsupportedPlatform(_)
            | PipelineError::DeviceAcquisition(_)
            | PipelineError::PipelineBuild(_)
            | PipelineError::TextureRebuild { .. } => true,
            PipelineError::Surface(err) => matches!(err, wgpu::SurfaceError::OutOfMemory),
            PipelineError::SourceAcquisition(_) | PipelineError::Validation(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_errors() {
        let rebuild = PipelineError::TextureRebuild {
            width: 8,
            height: 8,
            reason: "out of memory".into(),
        };
        assert!(rebuild.is_fatal());
        assert!(PipelineError::Surface(wgpu::SurfaceError::OutOfMemory).is_fatal());
        assert!(!PipelineError::Surface(wgpu::SurfaceError::Timeout).is_fatal());
        assert!(!PipelineError::Validation(params::ValidationError::UnsupportedTileSize(3.0)).is_fatal());
    }
}
