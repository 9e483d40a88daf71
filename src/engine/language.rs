//! Locale to language-key normalization.

/// Reduce a locale to the key factories are grouped by.
///
/// `zh_CN.UTF-8` → `zh_CN`, `en_US@euro` → `en`, `ja` → `ja`. Chinese keeps
/// its region since simplified and traditional engines differ.
pub fn normalize_language(locale: &str) -> String {
    let base = locale
        .split(|c: char| c == '.' || c == '@')
        .next()
        .unwrap_or_default()
        .trim()
        .replace('-', "_");
    match base.split_once('_') {
        Some((lang, region)) if lang.eq_ignore_ascii_case("zh") && !region.is_empty() => {
            format!("zh_{}", region.to_ascii_uppercase())
        }
        Some((lang, _)) => lang.to_ascii_lowercase(),
        None => base.to_ascii_lowercase(),
    }
}

/// Two-letter (or shorter) language code of a normalized key.
pub fn language_code(language: &str) -> &str {
    let lang = language.split('_').next().unwrap_or_default();
    match lang.char_indices().nth(2) {
        Some((end, _)) => &lang[..end],
        None => lang,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("zh_CN.UTF-8"), "zh_CN");
        assert_eq!(normalize_language("zh_tw"), "zh_TW");
        assert_eq!(normalize_language("en_US@euro"), "en");
        assert_eq!(normalize_language("ja_JP.eucJP"), "ja");
        assert_eq!(normalize_language("ko"), "ko");
        assert_eq!(normalize_language("pt-BR"), "pt");
        assert_eq!(normalize_language(""), "");
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code("zh_CN"), "zh");
        assert_eq!(language_code("en"), "en");
        assert_eq!(language_code("fil"), "fi");
        assert_eq!(language_code(""), "");
    }
}
