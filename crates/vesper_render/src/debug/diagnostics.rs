//! GPU Diagnostic Log Entries
//!
//! Shaders append fixed-layout records to a structured buffer so individual
//! pixel values can be inspected on the CPU. Each record is eight 32-bit
//! little-endian floats:
//!
//! | Word | Field | Interpretation |
//! |------|-------|----------------|
//! | 0 | `x` | pixel x, truncated to integer |
//! | 1 | `y` | pixel y, truncated to integer |
//! | 2 | `z` | depth or any scalar |
//! | 3 | `component_count` | 1..=4, truncated to integer |
//! | 4..8 | `values` | up to four components |
//!
//! The record size is fixed regardless of `component_count`.

use std::fmt;

/// Size in bytes of one diagnostic record.
pub const DIAGNOSTIC_ENTRY_SIZE: usize = 8 * std::mem::size_of::<f32>();

/// One decoded diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticLogEntry {
    pub x: u32,
    pub y: u32,
    pub z: f32,
    pub component_count: u32,
    pub values: [f32; 4],
}

impl DiagnosticLogEntry {
    /// Decodes one record from its wire bytes.
    #[must_use]
    pub fn decode(bytes: &[u8; DIAGNOSTIC_ENTRY_SIZE]) -> Self {
        let words: [u32; 8] = bytemuck::pod_read_unaligned(bytes);
        let f = words.map(|w| f32::from_bits(u32::from_le(w)));
        Self {
            x: f[0] as u32,
            y: f[1] as u32,
            z: f[2],
            component_count: f[3] as u32,
            values: [f[4], f[5], f[6], f[7]],
        }
    }

    /// Encodes the record the way a shader writes it.
    #[must_use]
    pub fn encode(&self) -> [u8; DIAGNOSTIC_ENTRY_SIZE] {
        let words = [
            self.x as f32,
            self.y as f32,
            self.z,
            self.component_count as f32,
            self.values[0],
            self.values[1],
            self.values[2],
            self.values[3],
        ]
        .map(|v| v.to_bits().to_le());
        bytemuck::cast(words)
    }
}

impl fmt::Display for DiagnosticLogEntry {
    /// `pos <x> <y> <z> || <values>`.
    ///
    /// Integer columns are left-aligned in width 4. A whole-number `z` below
    /// 1e15 in magnitude prints as an integer; otherwise in width 8 with 4 decimals. Values
    /// use width 7 with 4 decimals, except the fourth which is unpadded. An
    /// out-of-range component count prints no values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, z) = (self.x, self.y, self.z);
        if z.floor() == z && z.abs() < 1e15 {
            write!(f, "pos {x:<4} {y:<4} {:<4} || ", z as i64)?;
        } else {
            write!(f, "pos {x:<4} {y:<4} {z:<8.4} || ")?;
        }

        let [a, b, c, d] = self.values;
        match self.component_count {
            1 => write!(f, "{a:<7.4}"),
            2 => write!(f, "{a:<7.4} {b:<7.4}"),
            3 => write!(f, "{a:<7.4} {b:<7.4} {c:<7.4}"),
            4 => write!(f, "{a:<7.4} {b:<7.4} {c:<7.4} {d:.4}"),
            _ => Ok(()),
        }
    }
}

/// Decodes up to `max_entries` whole records from `bytes`.
#[must_use]
pub fn decode_entries(bytes: &[u8], max_entries: usize) -> Vec<DiagnosticLogEntry> {
    bytes
        .chunks_exact(DIAGNOSTIC_ENTRY_SIZE)
        .take(max_entries)
        .filter_map(|chunk| <&[u8; DIAGNOSTIC_ENTRY_SIZE]>::try_from(chunk).ok())
        .map(DiagnosticLogEntry::decode)
        .collect()
}

/// Formats entries one per line, each terminated by `\n`.
#[must_use]
pub fn format_entries(entries: &[DiagnosticLogEntry]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(entries.len() * 64);
    for entry in entries {
        let _ = writeln!(out, "{entry}");
    }
    out
}
