//! Culture names, LCIDs and ANSI code pages

/// `(culture, LCID, code page)`
const CULTURES: &[(&str, u32, u32)] = &[
    ("en-US", 1033, 1252),
    ("en-GB", 2057, 1252),
    ("fr-FR", 1036, 1252),
    ("de-DE", 1031, 1252),
    ("es-ES", 3082, 1252),
    ("it-IT", 1040, 1252),
    ("pt-BR", 1046, 1252),
    ("pt-PT", 2070, 1252),
    ("nl-NL", 1043, 1252),
    ("pl-PL", 1045, 1250),
    ("ru-RU", 1049, 1251),
    ("uk-UA", 1058, 1251),
    ("ja-JP", 1041, 932),
    ("zh-CN", 2052, 936),
    ("zh-TW", 1028, 950),
    ("ko-KR", 1042, 949),
    ("ar-SA", 1025, 1256),
    ("he-IL", 1037, 1255),
    ("sv-SE", 1053, 1252),
    ("nb-NO", 1044, 1252),
    ("da-DK", 1030, 1252),
    ("fi-FI", 1035, 1252),
    ("cs-CZ", 1029, 1250),
    ("hu-HU", 1038, 1250),
    ("tr-TR", 1055, 1254),
    ("el-GR", 1032, 1253),
    ("th-TH", 1054, 874),
    ("vi-VN", 1066, 1258),
    ("id-ID", 1057, 1252),
];

fn lookup(culture: &str) -> Option<&'static (&'static str, u32, u32)> {
    let culture = culture.trim();
    CULTURES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(culture))
}

/// LCID of a culture such as `de-DE`. Numeric input is passed through.
pub fn lcid(culture: &str) -> Option<u32> {
    if let Ok(number) = culture.trim().parse::<u32>() {
        return Some(number);
    }
    lookup(culture).map(|(_, lcid, _)| *lcid)
}

/// ANSI code page of a culture
pub fn codepage(culture: &str) -> Option<u32> {
    lookup(culture).map(|(_, _, codepage)| *codepage)
}

/// Cultures of a `"en-US,de-DE"` list
pub fn split_cultures(languages: &str) -> Vec<&str> {
    languages
        .split([',', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcid() {
        assert_eq!(lcid("en-US"), Some(1033));
        assert_eq!(lcid("DE-de"), Some(1031));
        assert_eq!(lcid("1049"), Some(1049));
        assert_eq!(lcid("xx-XX"), None);
    }

    #[test]
    fn test_codepage() {
        assert_eq!(codepage("ja-JP"), Some(932));
        assert_eq!(codepage("ru-RU"), Some(1251));
    }

    #[test]
    fn test_split_cultures() {
        assert_eq!(split_cultures("en-US, de-DE;;"), vec!["en-US", "de-DE"]);
    }
}
