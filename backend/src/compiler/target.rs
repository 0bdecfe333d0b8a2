use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use serde_with::{DeserializeAs, SerializeAs, serde_as};

use crate::{
    compiler::{
        Word,
        error::CompileError,
        symbols::{DEFAULT_VARIABLE_BASE, SLOT_SIZE},
    },
    utils::core::parse_word,
};

/// Addresses in a profile may be JSON numbers or `"0x…"` strings.
/// They are written back as hex strings.
pub struct HexOrInt;

impl SerializeAs<Word> for HexOrInt {
    fn serialize_as<S: Serializer>(source: &Word, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{source:#06x}"))
    }
}

impl<'de> DeserializeAs<'de, Word> for HexOrInt {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Word, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(Word),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(word) => Ok(word),
            Raw::Text(text) => {
                parse_word(&text).map_err(|e| D::Error::custom(format!("`{text}`: {e}")))
            }
        }
    }
}

/// Memory layout of the machine a chain is built for.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetProfile {
    pub name: String,
    /// First variable slot.
    #[serde_as(as = "HexOrInt")]
    pub variable_base: Word,
    /// RAM the generator may use to spill intermediates.
    #[serde_as(as = "HexOrInt")]
    pub scratch_base: Word,
    pub scratch_slots: usize,
    /// Character cell of line 1, column 0.
    #[serde_as(as = "HexOrInt")]
    pub vram_base: Word,
    /// Width of one chain word in the serialized payload.
    pub word_bytes: u8,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            name: "nx-u8".into(),
            variable_base: DEFAULT_VARIABLE_BASE,
            scratch_base: 0x2800,
            scratch_slots: 16,
            vram_base: 0xD000,
            word_bytes: 2,
        }
    }
}

impl TargetProfile {
    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let text = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config_error = |message: String| CompileError::Config {
            path: path.to_path_buf(),
            message,
        };

        let profile: TargetProfile =
            serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;
        if !(1..=4).contains(&profile.word_bytes) {
            return Err(config_error(format!(
                "`word_bytes` must be between 1 and 4, got {}",
                profile.word_bytes
            )));
        }
        Ok(profile)
    }

    /// Address of scratch slot `index`.
    pub fn scratch_slot(&self, index: usize) -> Result<Word, CompileError> {
        let exhausted = || CompileError::ScratchExhausted {
            slots: self.scratch_slots,
            span: None,
        };
        if index >= self.scratch_slots {
            return Err(exhausted());
        }
        Word::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(SLOT_SIZE))
            .and_then(|offset| self.scratch_base.checked_add(offset))
            .ok_or_else(exhausted)
    }
}
