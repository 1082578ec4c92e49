use std::{ffi::CString, path::Path};

use anyhow::Context;
use ash::util::read_spv;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const SPIRV_HEADER_WORDS: usize = 5;

/// Compiled compute shader: SPIR-V words and the entry point to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderCode {
    words: Vec<u32>,
    entry_point: String,
}

impl ShaderCode {
    pub fn from_words(words: Vec<u32>) -> anyhow::Result<Self> {
        match words.first() {
            Some(&SPIRV_MAGIC) => {}
            Some(word) => anyhow::bail!("not a SPIR-V module (magic {word:#010x})"),
            None => anyhow::bail!("empty SPIR-V module"),
        }
        Ok(Self {
            words,
            entry_point: "main".to_string(),
        })
    }

    pub fn from_bytes(spirv: &[u8]) -> anyhow::Result<Self> {
        let words = read_spv(&mut std::io::Cursor::new(spirv)).context("failed to read spirv")?;
        Self::from_words(words)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// False for a module that ends at or before the header and so declares nothing.
    pub fn has_instructions(&self) -> bool {
        self.words.len() > SPIRV_HEADER_WORDS
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub(crate) fn entry_point_cstring(&self) -> anyhow::Result<CString> {
        CString::new(self.entry_point.as_str())
            .with_context(|| format!("entry point {:?} contains a nul byte", self.entry_point))
    }
}
