use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::{
    compiler::{Word, error::CompileError, gadgets::GadgetId},
    utils::core::Loc,
};

static LISTING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:0[xX])?([0-9A-Fa-f]+)[hH]?\s+(.+?)\s*$").expect("listing regex is valid")
});

/// Firmware addresses for the gadgets in the identity table.
///
/// Built once from a listing and read-only afterwards. Identities that never
/// appeared in the listing stay unresolved; asking for one is an error only
/// when the generator actually needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GadgetCatalog {
    addresses: BTreeMap<GadgetId, Word>,
}

impl GadgetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a listing of `<hex address> <description>` lines.
    ///
    /// Blank lines and `#` or `//` comments are skipped. Lines whose
    /// description matches nothing in the table, or whose address does not
    /// parse, are logged and ignored. A later line for the same identity
    /// replaces an earlier one.
    pub fn load(origin: &str, listing: impl BufRead) -> Result<Self, CompileError> {
        let mut catalog = Self::new();

        for (index, line) in listing.lines().enumerate() {
            let line = line.map_err(|source| CompileError::Io {
                path: origin.into(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }

            let loc = Loc {
                input_path: origin,
                line_number: index + 1,
                line_offset: 1,
            };

            let Some(caps) = LISTING_LINE.captures(trimmed) else {
                warn!("{loc}: ignoring malformed listing line `{trimmed}`");
                continue;
            };
            let Ok(address) = Word::from_str_radix(&caps[1], 16) else {
                warn!("{loc}: address `{}` does not fit a word", &caps[1]);
                continue;
            };
            let Some(identity) = GadgetId::from_description(&caps[2]) else {
                warn!("{loc}: no gadget is described as `{}`", &caps[2]);
                continue;
            };

            if let Some(previous) = catalog.insert(identity, address) {
                warn!("{loc}: `{identity}` moves from {previous:#06x} to {address:#06x}");
            }
        }

        info!(
            "{origin}: resolved {} of {} gadgets",
            catalog.len(),
            GadgetId::all().count()
        );
        Ok(catalog)
    }

    pub fn load_file(path: &Path) -> Result<Self, CompileError> {
        let file = File::open(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&path.display().to_string(), BufReader::new(file))
    }

    /// Bind `identity` to `address`, returning the address it replaces.
    pub fn insert(&mut self, identity: GadgetId, address: Word) -> Option<Word> {
        self.addresses.insert(identity, address)
    }

    pub fn resolve(&self, identity: GadgetId) -> Result<Word, CompileError> {
        self.get(identity).ok_or(CompileError::GadgetNotFound {
            identity,
            span: None,
        })
    }

    pub fn get(&self, identity: GadgetId) -> Option<Word> {
        self.addresses.get(&identity).copied()
    }

    pub fn contains(&self, identity: GadgetId) -> bool {
        self.addresses.contains_key(&identity)
    }

    /// First identity bound to `address`, in table order.
    pub fn identity_at(&self, address: Word) -> Option<GadgetId> {
        self.iter()
            .find_map(|(identity, at)| (at == address).then_some(identity))
    }

    pub fn iter(&self) -> impl Iterator<Item = (GadgetId, Word)> + '_ {
        self.addresses.iter().map(|(&id, &address)| (id, address))
    }

    pub fn missing(&self) -> Vec<GadgetId> {
        GadgetId::all().filter(|&id| !self.contains(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl FromIterator<(GadgetId, Word)> for GadgetCatalog {
    fn from_iter<T: IntoIterator<Item = (GadgetId, Word)>>(iter: T) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(listing: &str) -> GadgetCatalog {
        GadgetCatalog::load("test.gadgets", listing.as_bytes()).expect("listing should load")
    }

    #[test]
    fn parses_addresses_and_descriptions() {
        let catalog = load(
            "# firmware 1.2\n\
             0x0A1C pop er0,rt\n\
             \n\
             1b42   er0=[er2],r2 = 9,rt\n\
             // trap\n\
             3f00h break\n",
        );
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(GadgetId::PopEr0Rt), Some(0x0A1C));
        assert_eq!(catalog.get(GadgetId::LoadEr0Er2), Some(0x1B42));
        assert_eq!(catalog.get(GadgetId::Break), Some(0x3F00));
    }

    #[test]
    fn unmatched_lines_are_tolerated() {
        let catalog = load(
            "0x1000 pop er0,rt\n\
             0x1002 nop,rt\n\
             garbage\n\
             0xFFFFFFFFFF pop er2\n\
             0x1004 pop er4,rt\n",
        );
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(GadgetId::PopEr4Rt));
        assert!(!catalog.contains(GadgetId::PopEr2));
    }

    #[test]
    fn firmware_descriptions_match_verbatim() {
        let catalog = load(
            "0x0B2E4 pop er2\n\
             0x0C0D8 er8 = er0\n\
             0x0C11A er0 = er4,pop er4\n\
             0x0D3A6 er0-=er2,rt\n\
             0x0D3B0 er0 -= er2,rt\n",
        );
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.get(GadgetId::PopEr2), Some(0x0B2E4));
        assert_eq!(catalog.get(GadgetId::MovEr8Er0), Some(0x0C0D8));
        assert_eq!(catalog.get(GadgetId::MovEr0Er4PopEr4), Some(0x0C11A));
        assert_eq!(catalog.get(GadgetId::SubEr0Er2), Some(0x0D3A6));
    }

    #[test]
    fn last_duplicate_wins() {
        let catalog = load("0x1000 pop er0,rt\n0x2000 pop er0,rt\n");
        assert_eq!(catalog.resolve(GadgetId::PopEr0Rt).unwrap(), 0x2000);
        assert_eq!(catalog.identity_at(0x2000), Some(GadgetId::PopEr0Rt));
        assert_eq!(catalog.identity_at(0x1000), None);
    }

    #[test]
    fn unresolved_identity_is_gadget_not_found() {
        let catalog = load("0x1000 pop er0,rt\n");
        let err = catalog.resolve(GadgetId::Break).unwrap_err();
        assert!(matches!(
            err,
            CompileError::GadgetNotFound {
                identity: GadgetId::Break,
                span: None
            }
        ));
        assert!(catalog.missing().contains(&GadgetId::Break));
        assert!(!catalog.missing().contains(&GadgetId::PopEr0Rt));
        assert_eq!(catalog.missing().len(), GadgetId::all().count() - 1);
    }

    #[test]
    fn missing_listing_file_is_an_io_error() {
        let err = GadgetCatalog::load_file(Path::new("/nonexistent/listing.gadgets")).unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/listing.gadgets"));
    }

    #[test]
    fn iterates_in_table_order() {
        let catalog: GadgetCatalog = [(GadgetId::Break, 3), (GadgetId::PopEr0Rt, 1)]
            .into_iter()
            .collect();
        let ids: Vec<_> = catalog.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![GadgetId::PopEr0Rt, GadgetId::Break]);
    }
}
