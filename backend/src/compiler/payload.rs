use std::fmt;

use serde::Serialize;

use crate::compiler::{Word, error::CompileError, gadgets::GadgetId};

/// One word of the chain, remembering why it is there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Gadget { identity: GadgetId, address: Word },
    /// A literal some gadget pops.
    Operand { value: Word },
    /// Junk word for a pop whose result is never used.
    Filler,
}

impl Entry {
    pub fn word(&self) -> Word {
        match *self {
            Entry::Gadget { address, .. } => address,
            Entry::Operand { value } => value,
            Entry::Filler => 0,
        }
    }
}

/// The finished chain. The first entry is the entry point and the last one
/// is the trap gadget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    entries: Vec<Entry>,
}

impl Payload {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn words(&self) -> Vec<Word> {
        self.entries.iter().map(Entry::word).collect()
    }

    pub fn entry_point(&self) -> Option<Word> {
        self.entries.first().map(Entry::word)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every word, checked to fit in `width` bytes.
    fn words_of(&self, width: u8) -> Result<Vec<Word>, CompileError> {
        let bits = u32::from(width) * 8;
        let words = self.words();
        match words.iter().find(|&&word| bits < Word::BITS && word >> bits != 0) {
            Some(&word) => Err(CompileError::WordOverflow { word, width }),
            None => Ok(words),
        }
    }

    /// Little-endian, `width` bytes per word.
    pub fn to_bytes(&self, width: u8) -> Result<Vec<u8>, CompileError> {
        Ok(self
            .words_of(width)?
            .iter()
            .flat_map(|word| word.to_le_bytes().into_iter().take(usize::from(width)))
            .collect())
    }

    pub fn to_hex_words(&self, width: u8) -> Result<String, CompileError> {
        let digits = usize::from(width) * 2;
        Ok(self
            .words_of(width)?
            .iter()
            .map(|word| format!("{word:0digits$X}\n"))
            .collect())
    }

    pub fn to_hexdump(&self, width: u8) -> Result<String, CompileError> {
        Ok(hex::encode(self.to_bytes(width)?))
    }

    /// One line per entry: byte offset, word, and what the word is.
    pub fn to_listing(&self, width: u8) -> String {
        self.listing(width).to_string()
    }

    pub fn listing(&self, width: u8) -> Listing<'_> {
        Listing {
            payload: self,
            width,
        }
    }

    pub fn to_json(&self) -> Result<String, CompileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The annotated listing of a [`Payload`], written as it is formatted.
pub struct Listing<'p> {
    payload: &'p Payload,
    width: u8,
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = usize::from(self.width) * 2;
        for (index, entry) in self.payload.entries.iter().enumerate() {
            let offset = index * usize::from(self.width);
            let word = entry.word();
            write!(f, "{offset:04x}:  {word:0digits$X}  ")?;
            match entry {
                Entry::Gadget { identity, .. } => writeln!(f, "{identity}")?,
                Entry::Operand { .. } => writeln!(f, "  .word")?,
                Entry::Filler => writeln!(f, "  .fill")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Payload {
        Payload::new(vec![
            Entry::Gadget {
                identity: GadgetId::PopEr0Rt,
                address: 0x1A2B,
            },
            Entry::Operand { value: 5 },
            Entry::Gadget {
                identity: GadgetId::StoreEr4Er0PopEr0,
                address: 0x0C00,
            },
            Entry::Filler,
            Entry::Gadget {
                identity: GadgetId::Break,
                address: 0x00FF,
            },
        ])
    }

    #[test]
    fn words_and_entry_point() {
        let payload = sample();
        assert_eq!(payload.words(), vec![0x1A2B, 5, 0x0C00, 0, 0x00FF]);
        assert_eq!(payload.entry_point(), Some(0x1A2B));
        assert_eq!(payload.len(), 5);
        assert_eq!(Payload::new(vec![]).entry_point(), None);
    }

    #[test]
    fn bytes_are_little_endian() {
        let bytes = sample().to_bytes(2).unwrap();
        assert_eq!(&bytes[..4], &[0x2B, 0x1A, 0x05, 0x00]);
        assert_eq!(bytes.len(), 10);
        assert_eq!(sample().to_hexdump(2).unwrap(), "2b1a0500000c0000ff00");
    }

    #[test]
    fn words_that_do_not_fit_are_rejected() {
        let err = sample().to_bytes(1).unwrap_err();
        assert!(matches!(
            err,
            CompileError::WordOverflow {
                word: 0x1A2B,
                width: 1
            }
        ));
        assert_eq!(sample().to_bytes(4).unwrap().len(), 20);

        let wide = Payload::new(vec![Entry::Operand { value: 70000 }]);
        assert!(matches!(
            wide.to_hex_words(2),
            Err(CompileError::WordOverflow { word: 70000, width: 2 })
        ));
        assert!(matches!(wide.to_hexdump(2), Err(CompileError::WordOverflow { .. })));
        assert_eq!(wide.to_hex_words(4).unwrap(), "00011170\n");
    }

    #[test]
    fn text_renderings() {
        assert_eq!(
            sample().to_hex_words(2).unwrap(),
            "1A2B\n0005\n0C00\n0000\n00FF\n"
        );

        let listing = sample().to_listing(2);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "0000:  1A2B  pop er0,rt");
        assert_eq!(lines[1], "0002:  0005    .word");
        assert_eq!(lines[3], "0006:  0000    .fill");
        assert_eq!(lines[4], "0008:  00FF  break");
    }

    #[test]
    fn listing_passes_writer_errors_on() {
        struct Full;
        impl fmt::Write for Full {
            fn write_str(&mut self, _: &str) -> fmt::Result {
                Err(fmt::Error)
            }
        }

        let payload = sample();
        assert!(fmt::Write::write_fmt(&mut Full, format_args!("{}", payload.listing(2))).is_err());
        assert_eq!(payload.listing(2).to_string(), payload.to_listing(2));
    }

    #[test]
    fn json_tags_each_entry() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json[0]["kind"], "gadget");
        assert_eq!(json[0]["identity"], "PopEr0Rt");
        assert_eq!(json[0]["address"], 0x1A2B);
        assert_eq!(json[1]["kind"], "operand");
        assert_eq!(json[1]["value"], 5);
        assert_eq!(json[3]["kind"], "filler");
    }
}
