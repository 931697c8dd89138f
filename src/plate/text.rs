//! Plate text validation, confusion correction and the OCR reading protocol.
//!
//! Plates follow a seven character `L L D D L L L` layout. OCR engines often
//! swap visually similar glyphs, so each position also accepts the characters
//! that are commonly confused with its class and [`format_license`] rewrites
//! them back. The table is ambiguous for genuinely mixed plates and is kept as-is.

/// Number of characters in a plate.
pub const PLATE_LEN: usize = 7;

/// Minimum OCR confidence for the unformatted fallback reading.
const FALLBACK_MIN_SCORE: f32 = 0.3;
/// Minimum alphanumeric length for the unformatted fallback reading.
const FALLBACK_MIN_LEN: usize = 4;

/// Letters that OCR confuses with digits, and the digit each stands for.
const CHAR_TO_INT: [(char, char); 6] = [
    ('O', '0'),
    ('I', '1'),
    ('J', '3'),
    ('A', '4'),
    ('G', '6'),
    ('S', '5'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Letter,
    Digit,
}

const LAYOUT: [Slot; PLATE_LEN] = [
    Slot::Letter,
    Slot::Letter,
    Slot::Digit,
    Slot::Digit,
    Slot::Letter,
    Slot::Letter,
    Slot::Letter,
];

fn char_to_int(c: char) -> Option<char> {
    CHAR_TO_INT.iter().find(|(l, _)| *l == c).map(|(_, d)| *d)
}

fn int_to_char(c: char) -> Option<char> {
    CHAR_TO_INT.iter().find(|(_, d)| *d == c).map(|(l, _)| *l)
}

impl Slot {
    fn accepts(self, c: char) -> bool {
        match self {
            Slot::Letter => c.is_ascii_uppercase() || int_to_char(c).is_some(),
            Slot::Digit => c.is_ascii_digit() || char_to_int(c).is_some(),
        }
    }

    fn canonical(self, c: char) -> char {
        let mapped = match self {
            Slot::Letter => int_to_char(c),
            Slot::Digit => char_to_int(c),
        };
        mapped.unwrap_or(c)
    }
}

/// One OCR candidate for a plate crop.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrCandidate {
    pub text: String,
    pub confidence: f32,
}

impl OcrCandidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Text read from a plate crop together with the OCR confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    pub text: String,
    pub confidence: f32,
}

/// Check that `text` fits the plate layout, allowing confusable characters.
pub fn license_complies_format(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.len() == PLATE_LEN && LAYOUT.iter().zip(&chars).all(|(slot, &c)| slot.accepts(c))
}

/// Rewrite confusable characters to the class their position expects.
///
/// Returns `None` unless `text` has exactly seven characters. Characters that
/// are already canonical, or have no counterpart in the table, are kept.
pub fn format_license(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() != PLATE_LEN {
        return None;
    }
    Some(
        LAYOUT
            .iter()
            .zip(chars)
            .map(|(slot, c)| slot.canonical(c))
            .collect(),
    )
}

/// Pick the plate text out of the OCR engine's candidates.
///
/// The first candidate that fits the layout wins and is returned formatted.
/// Failing that, the first candidate with enough alphanumeric characters and
/// confidence is returned as-is. `None` means nothing readable was found.
pub fn read_license_plate(candidates: &[OcrCandidate]) -> Option<PlateReading> {
    let normalized: Vec<(String, f32)> = candidates
        .iter()
        .map(|c| (c.text.to_uppercase().replace(' ', ""), c.confidence))
        .collect();

    let strict = normalized.iter().find_map(|(text, confidence)| {
        if license_complies_format(text) {
            format_license(text).map(|text| PlateReading {
                text,
                confidence: *confidence,
            })
        } else {
            None
        }
    });
    if strict.is_some() {
        return strict;
    }

    normalized.into_iter().find_map(|(text, confidence)| {
        let text: String = text.chars().filter(|c| c.is_alphanumeric()).collect();
        if text.chars().count() >= FALLBACK_MIN_LEN && confidence > FALLBACK_MIN_SCORE {
            Some(PlateReading { text, confidence })
        } else {
            None
        }
    })
}
