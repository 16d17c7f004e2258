//! Label text normalisation.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics from `input`.
///
/// Decomposes to NFD, drops combining marks, and maps the Vietnamese
/// stroked d (`đ`, `Đ`), which has no decomposition, to its base letter.
/// Case and all other characters are preserved.
pub fn strip_diacritics(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vietnamese_tones() {
        assert_eq!(strip_diacritics("Nguyễn Văn Đức"), "Nguyen Van Duc");
        assert_eq!(strip_diacritics("Trường Đại học"), "Truong Dai hoc");
    }

    #[test]
    fn strips_latin_accents() {
        assert_eq!(strip_diacritics("Café Müller"), "Cafe Muller");
    }

    #[test]
    fn ascii_is_unchanged() {
        assert_eq!(strip_diacritics("Issued by CertX 2026"), "Issued by CertX 2026");
    }

    #[test]
    fn non_latin_scripts_survive() {
        assert_eq!(strip_diacritics("証明書"), "証明書");
    }
}
