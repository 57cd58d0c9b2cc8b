//! The FME tone table (spec.md §3, §10): digits 0..9 plus the two
//! special indices, long-zero (10) and repetition (11).

pub const LONG_ZERO_INDEX: usize = 10;
pub const REPETITION_INDEX: usize = 11;
pub const TONE_COUNT: usize = 12;

/// One entry of the frequency -> tone-index map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneTableEntry {
    pub tone_index: usize,
    pub frequency: f64,
}

/// The widely-published TR-BOS FME frequency table, shipped as the
/// built-in default (`search_freqs[]` overrides it per spec.md §6;
/// `original_source`'s reviewed headers do not hardcode these values,
/// see SPEC_FULL.md §"Supplemented features").
pub fn default_table() -> Vec<ToneTableEntry> {
    const HZ: [f64; TONE_COUNT] = [
        2400.0, 1060.0, 1160.0, 1270.0, 1400.0, 1530.0, 1670.0, 1830.0, 2000.0, 2200.0, 2800.0,
        810.0,
    ];
    HZ.iter()
        .enumerate()
        .map(|(tone_index, &frequency)| ToneTableEntry { tone_index, frequency })
        .collect()
}

/// Match a raw peak frequency against the table within `tolerance_hz`,
/// returning the nearest entry's index if any entry is within range.
/// Used by the supervisor to turn C6's raw peak vectors into
/// `ToneEvent`s before C7 sees them (spec.md §4.7).
pub fn match_tone(freq: f64, table: &[ToneTableEntry], tolerance_hz: f64) -> Option<usize> {
    table
        .iter()
        .map(|e| (e.tone_index, (e.frequency - freq).abs()))
        .filter(|&(_, d)| d <= tolerance_hz)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_nearest_within_tolerance() {
        let table = default_table();
        assert_eq!(match_tone(1062.0, &table, 5.0), Some(1));
        assert_eq!(match_tone(1062.0, &table, 1.0), None);
    }

    #[test]
    fn special_indices_are_present() {
        let table = default_table();
        assert!(table.iter().any(|e| e.tone_index == LONG_ZERO_INDEX));
        assert!(table.iter().any(|e| e.tone_index == REPETITION_INDEX));
    }
}
