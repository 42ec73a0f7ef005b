// Memory layout configuration
//
// The target machine keeps its two pointer registers and the scratch pool in
// fixed data cells below the global data segment. Every cell is one word.

use crate::compiler::activation::DECLARED_LIMIT;
use crate::compiler::error::CompilerError;
use serde::Deserialize;
use std::path::Path;

/// Size of a machine word in bytes
pub const WORD_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Cell holding the frame pointer (CF)
    pub frame_pointer: u32,
    /// Cell holding the stack pointer (SP)
    pub stack_pointer: u32,
    /// First scratch ("conversion") cell
    pub scratch_base: u32,
    /// Number of scratch cells available to a single action
    pub scratch_slots: u32,
    /// First address of the global data segment
    pub data_base: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            frame_pointer: 200,
            stack_pointer: 204,
            scratch_base: 208,
            scratch_slots: 4,
            data_base: 224,
        }
    }
}

impl CompilerConfig {
    /// Parse a layout from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, CompilerError> {
        let config: CompilerConfig =
            toml::from_str(text).map_err(|e| CompilerError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CompilerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompilerError::IOError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// End (exclusive) of the scratch pool
    pub fn scratch_end(&self) -> u32 {
        self.scratch_slots
            .saturating_mul(WORD_SIZE)
            .saturating_add(self.scratch_base)
    }

    pub fn validate(&self) -> Result<(), CompilerError> {
        let cells = [
            ("frame_pointer", self.frame_pointer),
            ("stack_pointer", self.stack_pointer),
            ("scratch_base", self.scratch_base),
            ("data_base", self.data_base),
        ];
        for (name, addr) in cells {
            if addr % WORD_SIZE != 0 {
                return Err(CompilerError::ConfigError(format!(
                    "{} ({}) is not word aligned",
                    name, addr
                )));
            }
        }
        if self.scratch_slots == 0 {
            return Err(CompilerError::ConfigError(
                "scratch_slots must be at least 1".to_string(),
            ));
        }
        if self.frame_pointer == self.stack_pointer {
            return Err(CompilerError::ConfigError(
                "frame_pointer and stack_pointer share a cell".to_string(),
            ));
        }
        let scratch = self.scratch_base..self.scratch_end();
        for (name, addr) in [
            ("frame_pointer", self.frame_pointer),
            ("stack_pointer", self.stack_pointer),
        ] {
            if scratch.contains(&addr) || addr >= self.data_base {
                return Err(CompilerError::ConfigError(format!(
                    "{} ({}) overlaps the scratch pool or the data segment",
                    name, addr
                )));
            }
        }
        if self.data_base >= DECLARED_LIMIT {
            return Err(CompilerError::ConfigError(format!(
                "data_base ({}) leaves no room for the data segment",
                self.data_base
            )));
        }
        if self.scratch_end() > self.data_base {
            return Err(CompilerError::ConfigError(format!(
                "scratch pool [{}, {}) overlaps the data segment at {}",
                self.scratch_base,
                self.scratch_end(),
                self.data_base
            )));
        }
        Ok(())
    }
}
