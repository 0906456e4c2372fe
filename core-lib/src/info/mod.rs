//! Opcode metadata: mnemonics and cycle timings, loaded from JSON
//! resources embedded at build time (`resources/<id>.json`).
//!
//! The metadata is descriptive, not executable: dispatch tables are built
//! in code, and consult these tables for cycle charges and trace text.
//!
//! # Resource format
//!
//! ```json
//! {
//!   "cpu": "8080",
//!   "timing": { "default": [4, 0, 0, 0], "groupDefault": [8, 0, 0, 0] },
//!   "misc": { "irq": [11], "nmi": [11] },
//!   "opcodes": [ "NOP", "LXI B,{i16};10", { "at": "0x76" }, "HLT;7" ],
//!   "groups": { "grp1": [ "RLC B;8" ] }
//! }
//! ```
//!
//! Each opcode entry is `"TEXT"` or `"TEXT;base[,mem[,t3[,t4]]]"`; an
//! entry without timing gets the table default. An `{"at": N}` object
//! jumps the fill index so sparse tables stay readable; unfilled slots
//! become `DB` placeholders with default timing. A `{grpN}` placeholder
//! in an opcode's text marks it as a prefix dispatching into group N.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bad opcode metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table '{0}' overflows 256 entries")]
    TableOverflow(String),

    #[error("bad table index {0:?}")]
    BadIndex(String),

    #[error("bad timing in entry '{0}'")]
    BadTiming(String),

    #[error("bad group reference in entry '{0}'")]
    BadGroup(String),
}

/// Cycle charges for one opcode: `[base, mem, t3, t4]`.
///
/// `base` is the unconditional cost. `mem` replaces `base` when the
/// operand form is memory (8086). `t3`/`t4` are opcode-specific extras:
/// taken-branch penalty, per-iteration string-op cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    pub base: u8,
    pub mem: u8,
    pub t3: u8,
    pub t4: u8,
}

impl Timing {
    const fn from_slice(parts: &[u8]) -> Self {
        Self {
            base: if parts.is_empty() { 0 } else { parts[0] },
            mem: if parts.len() < 2 { 0 } else { parts[1] },
            t3: if parts.len() < 3 { 0 } else { parts[2] },
            t4: if parts.len() < 4 { 0 } else { parts[3] },
        }
    }
}

/// Metadata for one opcode slot.
#[derive(Debug, Clone)]
pub struct OpcodeDescriptor {
    /// Trace text, with `{..}` operand placeholders.
    pub text: String,
    pub timing: Timing,
    /// Index of the sub-opcode group this prefix dispatches into.
    pub group: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Def(String),
    Jump {
        at: serde_json::Value,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawTimingDefaults {
    #[serde(default)]
    default: Vec<u8>,
    #[serde(default, rename = "groupDefault")]
    group_default: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cpu: String,
    #[serde(default)]
    timing: RawTimingDefaults,
    #[serde(default)]
    misc: BTreeMap<String, Vec<u8>>,
    opcodes: Vec<RawEntry>,
    #[serde(default)]
    groups: BTreeMap<String, Vec<RawEntry>>,
    /// Per-group timing defaults, overriding `timing.groupDefault`.
    #[serde(default, rename = "groupDefaults")]
    group_defaults: BTreeMap<String, Vec<u8>>,
}

/// Parsed metadata for one architecture.
pub struct CpuInfo {
    id: String,
    opcodes: Vec<OpcodeDescriptor>,
    groups: Vec<Vec<OpcodeDescriptor>>,
    misc: BTreeMap<String, Timing>,
}

impl CpuInfo {
    pub fn load(source: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(source)?;

        let default = Timing::from_slice(&raw.timing.default);
        let group_default = if raw.timing.group_default.is_empty() {
            default
        } else {
            Timing::from_slice(&raw.timing.group_default)
        };

        // Group names are "grp1".. in table order.
        let group_count = raw.groups.len();
        let group_index = |name: &str| -> Option<usize> {
            let n: usize = name.strip_prefix("grp")?.parse().ok()?;
            (1..=group_count).contains(&n).then(|| n - 1)
        };

        let opcodes = build_table("opcodes", &raw.opcodes, default, |text| {
            // "{grpN}" in the text marks a prefix opcode.
            find_group_ref(text).map_or(Ok(None), |name| {
                group_index(&name)
                    .map(Some)
                    .ok_or_else(|| ConfigError::BadGroup(text.into()))
            })
        })?;

        let mut groups = vec![Vec::new(); group_count];
        for (name, entries) in &raw.groups {
            let idx = group_index(name).ok_or_else(|| ConfigError::BadGroup(name.clone()))?;
            let dflt = raw
                .group_defaults
                .get(name)
                .map_or(group_default, |v| Timing::from_slice(v));
            groups[idx] = build_table(name, entries, dflt, |_| Ok(None))?;
        }

        let misc = raw
            .misc
            .into_iter()
            .map(|(k, v)| (k, Timing::from_slice(&v)))
            .collect();

        Ok(Self {
            id: raw.cpu,
            opcodes,
            groups,
            misc,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn opcode(&self, op: u8) -> &OpcodeDescriptor {
        &self.opcodes[op as usize]
    }

    #[must_use]
    pub fn timing(&self, op: u8) -> Timing {
        self.opcodes[op as usize].timing
    }

    /// Timing of sub-opcode `op2` in group `group`. An out-of-range group
    /// index yields the default timing, which indicates a metadata bug.
    #[must_use]
    pub fn group_timing(&self, group: usize, op2: u8) -> Timing {
        self.groups
            .get(group)
            .map_or_else(Timing::default, |g| g[op2 as usize].timing)
    }

    /// Trace text for a prefixed opcode: the parent's text with its
    /// `{grpN}` placeholder replaced by the sub-opcode's text. Falls back
    /// to the parent text for non-prefix opcodes.
    #[must_use]
    pub fn sub_opcode(&self, op: u8, op2: u8) -> String {
        let parent = &self.opcodes[op as usize];
        match parent.group {
            Some(g) => {
                let sub = &self.groups[g][op2 as usize].text;
                match find_group_ref(&parent.text) {
                    Some(name) => parent.text.replace(&format!("{{{name}}}"), sub),
                    None => sub.clone(),
                }
            }
            None => parent.text.clone(),
        }
    }

    /// Named miscellaneous timing ("irq", "nmi", "trap", "ea.base", ...).
    /// Missing keys read as all-zero.
    #[must_use]
    pub fn misc(&self, key: &str) -> Timing {
        self.misc.get(key).copied().unwrap_or_default()
    }
}

fn find_group_ref(text: &str) -> Option<String> {
    let start = text.find("{grp")?;
    let end = text[start..].find('}')? + start;
    Some(text[start + 1..end].to_string())
}

fn parse_index(v: &serde_json::Value) -> Result<usize, ConfigError> {
    let bad = || ConfigError::BadIndex(v.to_string());
    let idx = match v {
        serde_json::Value::Number(n) => n.as_u64().ok_or_else(bad)? as usize,
        serde_json::Value::String(s) => {
            let s = s.trim();
            let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => (hex, 16),
                None => (s, 10),
            };
            usize::from_str_radix(digits, radix).map_err(|_| bad())?
        }
        _ => return Err(bad()),
    };
    if idx > 0xFF {
        return Err(bad());
    }
    Ok(idx)
}

fn parse_entry(text: &str, default: Timing) -> Result<OpcodeDescriptor, ConfigError> {
    let (mnemonic, timing) = match text.rsplit_once(';') {
        Some((m, t)) => {
            let mut parts = [0u8; 4];
            let mut n = 0;
            for piece in t.split(',') {
                if n >= 4 {
                    return Err(ConfigError::BadTiming(text.into()));
                }
                parts[n] = piece
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::BadTiming(text.into()))?;
                n += 1;
            }
            (m, Timing::from_slice(&parts[..n]))
        }
        None => (text, default),
    };
    Ok(OpcodeDescriptor {
        text: mnemonic.to_string(),
        timing,
        group: None,
    })
}

fn build_table(
    name: &str,
    entries: &[RawEntry],
    default: Timing,
    mut resolve_group: impl FnMut(&str) -> Result<Option<usize>, ConfigError>,
) -> Result<Vec<OpcodeDescriptor>, ConfigError> {
    let hole = |i: usize| OpcodeDescriptor {
        text: format!("DB {i:#04X}"),
        timing: default,
        group: None,
    };
    let mut table: Vec<OpcodeDescriptor> = (0..256).map(hole).collect();
    let mut cursor = 0usize;
    for entry in entries {
        match entry {
            RawEntry::Jump { at } => cursor = parse_index(at)?,
            RawEntry::Def(text) => {
                if cursor > 0xFF {
                    return Err(ConfigError::TableOverflow(name.into()));
                }
                let mut d = parse_entry(text, default)?;
                d.group = resolve_group(&d.text)?;
                table[cursor] = d;
                cursor += 1;
            }
        }
    }
    Ok(table)
}

macro_rules! embedded_info {
    ($fn_name:ident, $file:literal) => {
        pub fn $fn_name() -> &'static CpuInfo {
            static INFO: once_cell::sync::Lazy<CpuInfo> = once_cell::sync::Lazy::new(|| {
                match CpuInfo::load(include_str!(concat!("../../resources/", $file))) {
                    Ok(info) => info,
                    Err(e) => panic!(concat!("embedded resource ", $file, " is invalid: {}"), e),
                }
            });
            &INFO
        }
    };
}

embedded_info!(mos6502, "6502.json");
embedded_info!(i8080, "8080.json");
embedded_info!(z80, "z80.json");
embedded_info!(i8086, "8086.json");
embedded_info!(m6809, "6809.json");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "cpu": "test",
        "timing": { "default": [4], "groupDefault": [8] },
        "misc": { "irq": [11] },
        "opcodes": [
            "NOP",
            "LXI B,{i16};10",
            { "at": "0x76" },
            "HLT;7",
            { "at": 203 },
            "BITS {grp1};4"
        ],
        "groups": { "grp1": [ "RLC B", "RLC C;8,15" ] }
    }"#;

    #[test]
    fn parses_entries_and_jumps() {
        let info = CpuInfo::load(SAMPLE).unwrap();
        assert_eq!(info.id(), "test");
        assert_eq!(info.opcode(0x00).text, "NOP");
        assert_eq!(info.timing(0x00).base, 4);
        assert_eq!(info.timing(0x01).base, 10);
        assert_eq!(info.opcode(0x76).text, "HLT");
        assert_eq!(info.timing(0x76).base, 7);
    }

    #[test]
    fn holes_become_db_placeholders() {
        let info = CpuInfo::load(SAMPLE).unwrap();
        assert_eq!(info.opcode(0x02).text, "DB 0x02");
        assert_eq!(info.timing(0x02).base, 4);
    }

    #[test]
    fn groups_and_sub_opcodes() {
        let info = CpuInfo::load(SAMPLE).unwrap();
        assert_eq!(info.opcode(0xCB).group, Some(0));
        assert_eq!(info.group_timing(0, 0x00).base, 8);
        assert_eq!(info.group_timing(0, 0x01).base, 8);
        assert_eq!(info.group_timing(0, 0x01).mem, 15);
        assert_eq!(info.sub_opcode(0xCB, 0x00), "RLC B");
    }

    #[test]
    fn misc_timing_lookup() {
        let info = CpuInfo::load(SAMPLE).unwrap();
        assert_eq!(info.misc("irq").base, 11);
        assert_eq!(info.misc("absent").base, 0);
    }

    #[test]
    fn bad_group_reference_is_an_error() {
        let src = r#"{ "cpu": "t", "opcodes": [ "X {grp9}" ] }"#;
        assert!(matches!(
            CpuInfo::load(src),
            Err(ConfigError::BadGroup(_))
        ));
    }

    #[test]
    fn embedded_resources_parse() {
        assert_eq!(super::mos6502().id(), "6502");
        assert_eq!(super::i8080().id(), "8080");
        assert_eq!(super::z80().id(), "z80");
        assert_eq!(super::i8086().id(), "8086");
        assert_eq!(super::m6809().id(), "6809");
    }
}
