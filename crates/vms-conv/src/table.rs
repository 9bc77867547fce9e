//! SPN table - descriptor lookup by PGN and PID
//!
//! The table is built once (built-in catalog, optionally overlaid with YAML
//! definition files) and then shared read-only between decoders.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::descriptor::ScalingDescriptor;
use crate::error::{parse_id, ConvError, ConvResult};

/// Largest J1939 payload a single frame carries
pub const J1939_MAX_PAYLOAD: usize = 8;

/// Largest J1708 parameter payload (21-byte frame less MID and PID)
pub const J1708_MAX_PAYLOAD: usize = 19;

/// One parameter carried by a PGN or PID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpnEntry {
    /// Parameter-store key
    pub parameter: u16,
    /// Semantic name (e.g., "coolant_temp")
    pub name: String,
    #[serde(flatten)]
    pub descriptor: ScalingDescriptor,
}

impl SpnEntry {
    pub fn new(parameter: u16, name: impl Into<String>, descriptor: ScalingDescriptor) -> Self {
        Self {
            parameter,
            name: name.into(),
            descriptor,
        }
    }
}

/// Metadata about the table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// YAML file structure
#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    meta: Option<TableMeta>,
    #[serde(default)]
    j1939: Option<HashMap<String, Vec<SpnEntry>>>,
    #[serde(default)]
    j1708: Option<HashMap<String, Vec<SpnEntry>>>,
}

/// Immutable descriptor table
#[derive(Debug, Clone, Default)]
pub struct SpnTable {
    j1939: HashMap<u32, Vec<SpnEntry>>,
    j1708: HashMap<u16, Vec<SpnEntry>>,
    meta: TableMeta,
}

impl SpnTable {
    pub fn builder() -> SpnTableBuilder {
        SpnTableBuilder::default()
    }

    /// Table holding only the built-in catalog
    pub fn standard() -> Self {
        SpnTableBuilder::standard().build()
    }

    /// Table holding only the entries of a YAML definition file
    pub fn from_yaml(yaml: &str) -> ConvResult<Self> {
        let mut builder = SpnTableBuilder::default();
        builder.load_yaml(yaml)?;
        Ok(builder.build())
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConvResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parameters carried by a PGN; empty when the PGN is unknown
    pub fn for_pgn(&self, pgn: u32) -> &[SpnEntry] {
        self.j1939.get(&pgn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parameters carried by a J1708 PID; empty when the PID is unknown
    pub fn for_pid(&self, pid: u16) -> &[SpnEntry] {
        self.j1708.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a J1939 entry by name
    pub fn find_j1939(&self, name: &str) -> Option<(u32, &SpnEntry)> {
        self.j1939.iter().find_map(|(pgn, entries)| {
            entries.iter().find(|e| e.name == name).map(|e| (*pgn, e))
        })
    }

    /// Find a J1708 entry by name
    pub fn find_j1708(&self, name: &str) -> Option<(u16, &SpnEntry)> {
        self.j1708.iter().find_map(|(pid, entries)| {
            entries.iter().find(|e| e.name == name).map(|e| (*pid, e))
        })
    }

    /// Known PGNs, sorted
    pub fn pgns(&self) -> Vec<u32> {
        let mut keys: Vec<_> = self.j1939.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Known PIDs, sorted
    pub fn pids(&self) -> Vec<u16> {
        let mut keys: Vec<_> = self.j1708.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Total number of entries across both protocols
    pub fn len(&self) -> usize {
        self.j1939.values().map(Vec::len).sum::<usize>()
            + self.j1708.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }
}

/// Builder for [`SpnTable`]
///
/// Registering a parameter that already exists under the same PGN/PID
/// replaces it, so YAML files can override built-in calibrations.
#[derive(Debug, Default)]
pub struct SpnTableBuilder {
    table: SpnTable,
}

impl SpnTableBuilder {
    /// Builder pre-loaded with the built-in catalog
    pub fn standard() -> Self {
        let mut builder = Self::default();
        for (pgn, rows) in catalog::j1939() {
            for row in rows {
                builder.insert_j1939(pgn, SpnEntry::new(row.parameter, row.name, row.descriptor));
            }
        }
        for (pid, rows) in catalog::j1708() {
            for row in rows {
                builder.insert_j1708(pid, SpnEntry::new(row.parameter, row.name, row.descriptor));
            }
        }
        builder.table.meta = TableMeta {
            name: Some("standard".to_string()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            description: None,
        };
        builder
    }

    /// Register a J1939 parameter
    pub fn register_j1939(&mut self, pgn: u32, entry: SpnEntry) -> ConvResult<()> {
        if pgn > 0x3FFFF {
            return Err(ConvError::InvalidIdFormat(format!("PGN {} exceeds 18 bits", pgn)));
        }
        entry.descriptor.validate(J1939_MAX_PAYLOAD)?;
        self.insert_j1939(pgn, entry);
        Ok(())
    }

    /// Register a J1708 parameter
    pub fn register_j1708(&mut self, pid: u16, entry: SpnEntry) -> ConvResult<()> {
        if pid > 0x1FF {
            return Err(ConvError::InvalidIdFormat(format!("PID {} out of range", pid)));
        }
        entry.descriptor.validate(J1708_MAX_PAYLOAD)?;
        self.insert_j1708(pid, entry);
        Ok(())
    }

    /// Chainable form of [`register_j1939`](Self::register_j1939)
    pub fn j1939(mut self, pgn: u32, entry: SpnEntry) -> ConvResult<Self> {
        self.register_j1939(pgn, entry)?;
        Ok(self)
    }

    /// Chainable form of [`register_j1708`](Self::register_j1708)
    pub fn j1708(mut self, pid: u16, entry: SpnEntry) -> ConvResult<Self> {
        self.register_j1708(pid, entry)?;
        Ok(self)
    }

    /// Merge entries from a YAML definition file
    pub fn load_yaml(&mut self, yaml: &str) -> ConvResult<()> {
        let file: DefinitionFile = serde_yaml::from_str(yaml)?;

        if let Some(meta) = file.meta {
            self.table.meta = meta;
        }

        for (pgn_str, entries) in file.j1939.unwrap_or_default() {
            let pgn = parse_id(&pgn_str)?;
            for entry in entries {
                self.register_j1939(pgn, entry)?;
            }
        }

        for (pid_str, entries) in file.j1708.unwrap_or_default() {
            let pid = parse_id(&pid_str)?;
            let pid = u16::try_from(pid).map_err(|_| ConvError::InvalidIdFormat(pid_str.clone()))?;
            for entry in entries {
                self.register_j1708(pid, entry)?;
            }
        }

        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConvResult<()> {
        let content = std::fs::read_to_string(path)?;
        self.load_yaml(&content)
    }

    pub fn build(self) -> SpnTable {
        self.table
    }

    fn insert_j1939(&mut self, pgn: u32, entry: SpnEntry) {
        upsert(self.table.j1939.entry(pgn).or_default(), entry);
    }

    fn insert_j1708(&mut self, pid: u16, entry: SpnEntry) {
        upsert(self.table.j1708.entry(pid).or_default(), entry);
    }
}

fn upsert(entries: &mut Vec<SpnEntry>, entry: SpnEntry) {
    match entries.iter().position(|e| e.parameter == entry.parameter) {
        Some(pos) => entries[pos] = entry,
        None => entries.push(entry),
    }
}
