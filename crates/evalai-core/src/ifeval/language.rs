//! Lightweight response-language identification.
//!
//! Non-Latin scripts are identified by their Unicode block, with a few
//! letter and word markers to separate languages sharing a script. Latin
//! text is scored against short stop-word lists plus distinctive diacritics.
//! Codes are ISO 639-1, except Chinese which is reported as `zh-cn`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Thai,
    Hangul,
    Kana,
    Han,
}

fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x41..=0x5A | 0x61..=0x7A | 0xC0..=0x24F | 0x1E00..=0x1EFF => Script::Latin,
        0x370..=0x3FF | 0x1F00..=0x1FFF => Script::Greek,
        0x400..=0x4FF => Script::Cyrillic,
        0x590..=0x5FF => Script::Hebrew,
        0x600..=0x6FF | 0x750..=0x77F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => Script::Arabic,
        0x900..=0x97F => Script::Devanagari,
        0x980..=0x9FF => Script::Bengali,
        0xA00..=0xA7F => Script::Gurmukhi,
        0xA80..=0xAFF => Script::Gujarati,
        0xB80..=0xBFF => Script::Tamil,
        0xC00..=0xC7F => Script::Telugu,
        0xC80..=0xCFF => Script::Kannada,
        0xD00..=0xD7F => Script::Malayalam,
        0xE00..=0xE7F => Script::Thai,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
        0x3040..=0x30FF => Script::Kana,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF => Script::Han,
        _ => return None,
    };
    c.is_alphabetic().then_some(script)
}

const STOP_WORDS: &[(&str, &[&str])] = &[
    ("en", &[
        "the", "and", "is", "are", "of", "to", "in", "that", "it", "with", "for", "this", "was",
        "you", "be", "on", "not", "have", "as", "but", "they", "what", "at", "by", "from",
    ]),
    ("de", &[
        "der", "die", "das", "und", "ist", "nicht", "ich", "zu", "den", "mit", "ein", "eine",
        "sich", "auf", "für", "von", "dem", "des", "auch", "es", "wir", "sie",
    ]),
    ("fr", &[
        "le", "la", "les", "et", "est", "des", "une", "un", "du", "que", "qui", "dans", "pour",
        "pas", "sur", "avec", "il", "elle", "nous", "vous", "ce", "sont", "au",
    ]),
    ("es", &[
        "el", "la", "los", "las", "y", "es", "de", "que", "en", "un", "una", "por", "con",
        "para", "no", "se", "del", "lo", "su", "como", "está", "pero", "muy",
    ]),
    ("it", &[
        "il", "lo", "la", "gli", "le", "e", "è", "di", "che", "non", "un", "una", "per", "con",
        "sono", "del", "della", "nel", "anche", "come", "questo", "ma",
    ]),
    ("pt", &[
        "o", "a", "os", "as", "e", "é", "de", "que", "não", "um", "uma", "para", "com", "do",
        "da", "em", "no", "na", "se", "mais", "como", "são", "por",
    ]),
    ("nl", &[
        "de", "het", "een", "en", "is", "van", "niet", "dat", "die", "ik", "je", "op", "te",
        "met", "zijn", "voor", "er", "maar", "ook", "wat",
    ]),
    ("sv", &[
        "och", "det", "att", "är", "en", "ett", "som", "på", "för", "med", "inte", "jag", "har",
        "av", "till", "den", "de", "om", "var", "men",
    ]),
    ("fi", &[
        "ja", "on", "ei", "se", "että", "oli", "hän", "mutta", "kun", "tämä", "ovat", "myös",
        "niin", "mitä", "ole", "olen", "joka",
    ]),
    ("pl", &[
        "i", "w", "nie", "się", "na", "to", "jest", "że", "z", "do", "jak", "co", "ale", "o",
        "tak", "są", "od", "po", "jego", "przez",
    ]),
    ("tr", &[
        "ve", "bir", "bu", "da", "de", "için", "ile", "ne", "çok", "daha", "gibi", "ama", "olan",
        "var", "değil", "ben", "sen",
    ]),
    ("vi", &[
        "và", "của", "là", "có", "không", "được", "những", "một", "các", "cho", "này", "trong",
        "với", "người", "đã", "để",
    ]),
    ("id", &[
        "dan", "yang", "di", "ini", "itu", "dengan", "untuk", "tidak", "dari", "dalam", "akan",
        "ada", "saya", "kami", "juga", "adalah", "pada",
    ]),
    ("sw", &[
        "na", "ya", "wa", "kwa", "ni", "katika", "za", "hii", "kuwa", "lakini", "sana", "watu",
        "hiyo", "kama",
    ]),
    ("ro", &[
        "și", "este", "în", "nu", "pe", "cu", "că", "la", "sunt", "din", "mai", "pentru",
        "care", "ce", "să",
    ]),
];

/// Letters that strongly suggest one Latin-script language.
const MARKERS: &[(char, &str)] = &[
    ('ñ', "es"),
    ('ß', "de"),
    ('ã', "pt"),
    ('õ', "pt"),
    ('å', "sv"),
    ('ğ', "tr"),
    ('ş', "tr"),
    ('ı', "tr"),
    ('ą', "pl"),
    ('ę', "pl"),
    ('ł', "pl"),
    ('ż', "pl"),
    ('ă', "ro"),
    ('ț', "ro"),
    ('ș', "ro"),
    ('ơ', "vi"),
    ('ư', "vi"),
    ('đ', "vi"),
];

fn latin_language(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    let mut scores: Vec<usize> = vec![0; STOP_WORDS.len()];

    for word in lowered.split(|c: char| !c.is_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        for (i, (_, words)) in STOP_WORDS.iter().enumerate() {
            if words.contains(&word) {
                scores[i] += 1;
            }
        }
    }
    for c in lowered.chars() {
        if let Some((_, lang)) = MARKERS.iter().find(|(marker, _)| *marker == c) {
            if let Some(i) = STOP_WORDS.iter().position(|(code, _)| code == lang) {
                scores[i] += 2;
            }
        }
    }

    // Ties resolve to the earlier entry.
    let (best, score) = scores
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc });
    (score > 0).then(|| STOP_WORDS[best].0)
}

fn cyrillic_language(text: &str) -> &'static str {
    if text.chars().any(|c| matches!(c, 'і' | 'ї' | 'є' | 'ґ' | 'І' | 'Ї' | 'Є' | 'Ґ')) {
        "uk"
    } else if text.contains('ъ') && !text.contains('ы') && !text.contains('э') {
        "bg"
    } else {
        "ru"
    }
}

fn arabic_language(text: &str) -> &'static str {
    if text.chars().any(|c| matches!(c, 'ے' | 'ں' | 'ٹ' | 'ڈ' | 'ڑ' | 'ھ')) {
        "ur"
    } else if text.chars().any(|c| matches!(c, 'پ' | 'چ' | 'ژ' | 'گ' | 'ک' | 'ی')) {
        "fa"
    } else {
        "ar"
    }
}

fn devanagari_language(text: &str) -> &'static str {
    let has_any = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if has_any(&["आहे", "आणि", "च्या", "नाही"]) {
        "mr"
    } else if has_any(&["छ", "हुन्छ", "पनि", "गर्न"]) {
        "ne"
    } else {
        "hi"
    }
}

/// Best-guess language of `text`, or `None` when there is nothing to judge.
pub fn detect(text: &str) -> Option<&'static str> {
    let mut counts: HashMap<Script, usize> = HashMap::new();
    for c in text.chars() {
        if let Some(script) = script_of(c) {
            *counts.entry(script).or_default() += 1;
        }
    }
    if counts.contains_key(&Script::Kana) {
        return Some("ja");
    }
    let (script, _) = counts
        .iter()
        .max_by_key(|(script, count)| (**count, std::cmp::Reverse(**script)))?;

    match script {
        Script::Latin => latin_language(text),
        Script::Cyrillic => Some(cyrillic_language(text)),
        Script::Greek => Some("el"),
        Script::Arabic => Some(arabic_language(text)),
        Script::Hebrew => Some("he"),
        Script::Devanagari => Some(devanagari_language(text)),
        Script::Bengali => Some("bn"),
        Script::Gurmukhi => Some("pa"),
        Script::Gujarati => Some("gu"),
        Script::Tamil => Some("ta"),
        Script::Telugu => Some("te"),
        Script::Kannada => Some("kn"),
        Script::Malayalam => Some("ml"),
        Script::Thai => Some("th"),
        Script::Hangul => Some("ko"),
        Script::Kana => Some("ja"),
        Script::Han => Some("zh-cn"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_languages() {
        assert_eq!(detect("The weather is nice and the sun is out."), Some("en"));
        assert_eq!(detect("Der Hund ist nicht mit dem Ball gekommen."), Some("de"));
        assert_eq!(detect("Nous sommes dans la maison avec les enfants."), Some("fr"));
        assert_eq!(detect("El niño está en la casa con su madre."), Some("es"));
    }

    #[test]
    fn test_other_scripts() {
        assert_eq!(detect("Привет, как дела?"), Some("ru"));
        assert_eq!(detect("Привіт, як справи? Її немає."), Some("uk"));
        assert_eq!(detect("Γεια σου κόσμε"), Some("el"));
        assert_eq!(detect("안녕하세요 세계"), Some("ko"));
        assert_eq!(detect("今日は良い天気ですね"), Some("ja"));
        assert_eq!(detect("今天天气很好"), Some("zh-cn"));
        assert_eq!(detect("नमस्ते, आप कैसे हैं?"), Some("hi"));
    }

    #[test]
    fn test_nothing_to_judge() {
        assert_eq!(detect("12345 !!!"), None);
        assert_eq!(detect(""), None);
        assert_eq!(detect("xyzzy qwrtp"), None);
    }
}
