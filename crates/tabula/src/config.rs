//! List controller configuration.
//!
//! [`ListConfig`] controls how transitions are presented and where they are
//! prepared. It can be built in code or loaded from TOML:
//!
//! ```
//! use tabula::ListConfig;
//!
//! let config = ListConfig::from_toml_str(r#"
//!     animated = true
//!     prepare_off_main = true
//!
//!     [viewport]
//!     width = 400.0
//!     height = 600.0
//! "#).unwrap();
//!
//! assert!(config.animated);
//! assert!(config.make_first_fast);
//! assert_eq!(config.viewport.height, 600.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::entry::RowContext;

/// Errors raised while loading a [`ListConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("Failed to parse list config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The viewport has a non-positive or non-finite extent.
    #[error("Invalid viewport {width}x{height}: extents must be finite and positive")]
    InvalidViewport { width: f32, height: f32 },
}

/// Presentation and scheduling options of a list controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Animate row changes.
    pub animated: bool,
    /// Group row changes into one visual update.
    pub grouping: bool,
    /// Animate rows outside the viewport too.
    pub animate_everything: bool,
    /// Split the initial load into a viewport-sized head and a tail.
    pub make_first_fast: bool,
    /// Diff the first generation on the prepare queue too.
    pub prepare_off_main: bool,
    /// Layout constraints handed to row factories.
    pub viewport: RowContext,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            animated: false,
            grouping: true,
            animate_everything: false,
            make_first_fast: true,
            prepare_off_main: false,
            viewport: RowContext::default(),
        }
    }
}

impl ListConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> ListConfigBuilder {
        ListConfigBuilder::default()
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the viewport extents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let RowContext { width, height } = self.viewport;
        let valid = |extent: f32| extent.is_finite() && extent > 0.0;
        if valid(width) && valid(height) {
            Ok(())
        } else {
            Err(ConfigError::InvalidViewport { width, height })
        }
    }

    /// Whether only visible rows animate.
    pub fn animate_visible_only(&self) -> bool {
        !self.animate_everything
    }
}

/// Builder for [`ListConfig`].
#[derive(Debug, Default)]
pub struct ListConfigBuilder {
    config: ListConfig,
}

impl ListConfigBuilder {
    /// Set whether row changes animate.
    pub fn animated(mut self, animated: bool) -> Self {
        self.config.animated = animated;
        self
    }

    /// Set whether row changes are grouped.
    pub fn grouping(mut self, grouping: bool) -> Self {
        self.config.grouping = grouping;
        self
    }

    /// Set whether rows outside the viewport animate.
    pub fn animate_everything(mut self, everything: bool) -> Self {
        self.config.animate_everything = everything;
        self
    }

    /// Set whether the initial load is split.
    pub fn make_first_fast(mut self, first_fast: bool) -> Self {
        self.config.make_first_fast = first_fast;
        self
    }

    /// Set whether the first generation is prepared off the main thread.
    pub fn prepare_off_main(mut self, off_main: bool) -> Self {
        self.config.prepare_off_main = off_main;
        self
    }

    /// Set the viewport.
    pub fn viewport(mut self, width: f32, height: f32) -> Self {
        self.config.viewport = RowContext::new(width, height);
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ListConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
