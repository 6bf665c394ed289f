//! Configuration for the reconstruction pipeline.

/// Pipeline configuration.
///
/// All options default to off; callers opt in per run. Configuration is
/// always passed in explicitly, never read from the environment.
#[derive(Debug, Clone, Default)]
pub struct ReflowConfig {
    /// Deliberately fragment input spans whenever a glyph's y position
    /// changes. This stresses the downstream span joiner.
    pub autosplit: bool,

    /// Insert extra empty paragraphs into the emitted content.
    pub spacing: bool,

    /// Emit rotated text inside anchored text boxes. When off, rotation is
    /// discarded and text is emitted unrotated.
    pub rotation: bool,
}

impl ReflowConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable span autosplitting.
    pub fn with_autosplit(mut self, enable: bool) -> Self {
        self.autosplit = enable;
        self
    }

    /// Enable extra inter-paragraph spacing.
    pub fn with_spacing(mut self, enable: bool) -> Self {
        self.spacing = enable;
        self
    }

    /// Enable rotated text boxes.
    pub fn with_rotation(mut self, enable: bool) -> Self {
        self.rotation = enable;
        self
    }
}
