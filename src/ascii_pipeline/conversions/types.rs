//! Conversion configuration types

use std::path::PathBuf;

/// Configuration for an image-to-glyph conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Whether to reject inputs the glyph grid cannot cover before any
    /// backend work starts
    pub validate_inputs: bool,
    /// Directory to dump each synthesized feature image into as BMP,
    /// for debugging. None disables the dump.
    pub dump_features: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            validate_inputs: true,
            dump_features: None,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    validate_inputs: Option<bool>,
    dump_features: Option<Option<PathBuf>>,
}

impl ConversionConfigBuilder {
    pub fn validate_inputs(mut self, validate: bool) -> Self {
        self.validate_inputs = Some(validate);
        self
    }

    pub fn dump_features(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_features = Some(dir);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        ConversionConfig {
            validate_inputs: self.validate_inputs.unwrap_or(default.validate_inputs),
            dump_features: self.dump_features.unwrap_or(default.dump_features),
        }
    }
}
