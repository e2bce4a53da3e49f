//! Verifiable instructions and their predicates.
//!
//! Each [`Instruction`] is one constraint on a response ("use no commas",
//! "write at least 300 words", ...). `check_following` is the bare predicate;
//! [`Instruction::is_followed_by`] additionally requires a non-empty response.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::language;
use crate::text::strip_code_fences;

/// Comparison used by count-based instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `count < n`
    LessThan,
    /// `count >= n`
    AtLeast,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::LessThan => "less than",
            Relation::AtLeast => "at least",
        }
    }

    pub fn holds(&self, count: usize, n: usize) -> bool {
        match self {
            Relation::LessThan => count < n,
            Relation::AtLeast => count >= n,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "less than" => Ok(Relation::LessThan),
            "at least" => Ok(Relation::AtLeast),
            other => Err(format!(
                "unknown relation '{other}', expected 'less than' or 'at least'"
            )),
        }
    }
}

/// One verifiable instruction with its arguments bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    KeywordExistence {
        keywords: Vec<String>,
    },
    KeywordFrequency {
        keyword: String,
        frequency: usize,
        relation: Relation,
    },
    ForbiddenWords {
        forbidden_words: Vec<String>,
    },
    LetterFrequency {
        letter: char,
        frequency: usize,
        relation: Relation,
    },
    ResponseLanguage {
        language: String,
    },
    NumberSentences {
        num_sentences: usize,
        relation: Relation,
    },
    NumberParagraphs {
        num_paragraphs: usize,
    },
    NumberWords {
        num_words: usize,
        relation: Relation,
    },
    NthParagraphFirstWord {
        num_paragraphs: usize,
        nth_paragraph: usize,
        first_word: String,
    },
    NumberPlaceholders {
        num_placeholders: usize,
    },
    Postscript {
        marker: String,
    },
    NumberBulletLists {
        num_bullets: usize,
    },
    ConstrainedResponse,
    NumberHighlightedSections {
        num_highlights: usize,
    },
    MultipleSections {
        section_splitter: String,
        num_sections: usize,
    },
    JsonFormat,
    Title,
    TwoResponses,
    RepeatPrompt {
        prompt_to_repeat: String,
    },
    EndChecker {
        end_phrase: String,
    },
    CapitalWordFrequency {
        capital_frequency: usize,
        capital_relation: Relation,
    },
    EnglishCapital,
    EnglishLowercase,
    NoComma,
    Quotation,
}

const CONSTRAINED_OPTIONS: [&str; 3] = [
    "My answer is yes.",
    "My answer is no.",
    "My answer is maybe.",
];

struct Patterns {
    word: Regex,
    sentence_end: Regex,
    paragraph_break: Regex,
    placeholder: Regex,
    star_bullet: Regex,
    dash_bullet: Regex,
    highlight: Regex,
    bold_highlight: Regex,
    title: Regex,
    pps: Regex,
    ps: Regex,
}

fn patterns() -> &'static Patterns {
    static RE: OnceLock<Patterns> = OnceLock::new();
    RE.get_or_init(|| Patterns {
        word: Regex::new(r"\w+").expect("static regex"),
        sentence_end: Regex::new(r"[.!?]+(?:\s+|$)").expect("static regex"),
        paragraph_break: Regex::new(r"\s?\*\*\*\s?").expect("static regex"),
        placeholder: Regex::new(r"\[.*?\]").expect("static regex"),
        star_bullet: Regex::new(r"(?m)^\s*\*[^\*].*$").expect("static regex"),
        dash_bullet: Regex::new(r"(?m)^\s*-.*$").expect("static regex"),
        highlight: Regex::new(r"\*[^\n\*]*\*").expect("static regex"),
        bold_highlight: Regex::new(r"\*\*[^\n\*]*\*\*").expect("static regex"),
        title: Regex::new(r"<<[^\n]+>>").expect("static regex"),
        pps: Regex::new(r"(?m)\s*p\.\s?p\.\s?s.*$").expect("static regex"),
        ps: Regex::new(r"(?m)\s*p\.\s?s\..*$").expect("static regex"),
    })
}

fn count_words(text: &str) -> usize {
    patterns().word.find_iter(text).count()
}

fn count_sentences(text: &str) -> usize {
    patterns()
        .sentence_end
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Cased-text test: at least one cased character and none lowercase.
fn is_upper(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

/// Cased-text test: at least one cased character and none uppercase.
fn is_lower(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            return false;
        }
        cased |= c.is_lowercase();
    }
    cased
}

fn is_english_or_unknown(text: &str) -> bool {
    language::detect(text).map_or(true, |lang| lang == "en")
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("(?i){pattern}")).ok()
}

impl Instruction {
    /// The instruction holds for `response`, and `response` is not blank.
    pub fn is_followed_by(&self, response: &str) -> bool {
        !response.trim().is_empty() && self.check_following(response)
    }

    /// The bare predicate.
    pub fn check_following(&self, response: &str) -> bool {
        let re = patterns();
        match self {
            Instruction::KeywordExistence { keywords } => keywords.iter().all(|keyword| {
                case_insensitive(&regex::escape(keyword)).is_some_and(|re| re.is_match(response))
            }),
            Instruction::KeywordFrequency {
                keyword,
                frequency,
                relation,
            } => case_insensitive(&regex::escape(keyword))
                .is_some_and(|re| relation.holds(re.find_iter(response).count(), *frequency)),
            Instruction::ForbiddenWords { forbidden_words } => {
                forbidden_words.iter().all(|word| {
                    case_insensitive(&format!(r"\b{}\b", regex::escape(word)))
                        .is_some_and(|re| !re.is_match(response))
                })
            }
            Instruction::LetterFrequency {
                letter,
                frequency,
                relation,
            } => {
                let target: Vec<char> = letter.to_lowercase().collect();
                let count = response
                    .to_lowercase()
                    .chars()
                    .filter(|c| target.first() == Some(c))
                    .count();
                relation.holds(count, *frequency)
            }
            Instruction::ResponseLanguage { language } => {
                language::detect(response).map_or(true, |detected| detected == language.as_str())
            }
            Instruction::NumberSentences {
                num_sentences,
                relation,
            } => relation.holds(count_sentences(response), *num_sentences),
            Instruction::NumberParagraphs { num_paragraphs } => {
                let paragraphs: Vec<&str> = re.paragraph_break.split(response).collect();
                let last = paragraphs.len() - 1;
                let mut count = paragraphs.len();
                for (i, paragraph) in paragraphs.iter().enumerate() {
                    if paragraph.trim().is_empty() {
                        if i == 0 || i == last {
                            count -= 1;
                        } else {
                            return false;
                        }
                    }
                }
                count == *num_paragraphs
            }
            Instruction::NumberWords {
                num_words,
                relation,
            } => relation.holds(count_words(response), *num_words),
            Instruction::NthParagraphFirstWord {
                num_paragraphs,
                nth_paragraph,
                first_word,
            } => {
                let paragraphs: Vec<&str> = response.split("\n\n").collect();
                let count = paragraphs.iter().filter(|p| !p.trim().is_empty()).count();
                if *nth_paragraph == 0 || *nth_paragraph > count {
                    return false;
                }
                let Some(paragraph) = paragraphs.get(nth_paragraph - 1).map(|p| p.trim()) else {
                    return false;
                };
                let Some(word) = paragraph.split_whitespace().next() else {
                    return false;
                };
                let word = word.trim_start_matches('\'').trim_start_matches('"');
                let found: String = word
                    .chars()
                    .take_while(|c| !matches!(c, '.' | ',' | '?' | '!' | '\'' | '"'))
                    .flat_map(char::to_lowercase)
                    .collect();
                count == *num_paragraphs && found == first_word.to_lowercase()
            }
            Instruction::NumberPlaceholders { num_placeholders } => {
                re.placeholder.find_iter(response).count() >= *num_placeholders
            }
            Instruction::Postscript { marker } => {
                let lowered = response.to_lowercase();
                match marker.as_str() {
                    "P.P.S" => re.pps.is_match(&lowered),
                    "P.S." => re.ps.is_match(&lowered),
                    other => Regex::new(&format!(
                        r"(?m)\s*{}.*$",
                        regex::escape(&other.to_lowercase())
                    ))
                    .is_ok_and(|re| re.is_match(&lowered)),
                }
            }
            Instruction::NumberBulletLists { num_bullets } => {
                let count = re.star_bullet.find_iter(response).count()
                    + re.dash_bullet.find_iter(response).count();
                count == *num_bullets
            }
            Instruction::ConstrainedResponse => {
                let trimmed = response.trim();
                CONSTRAINED_OPTIONS.iter().any(|option| trimmed.contains(option))
            }
            Instruction::NumberHighlightedSections { num_highlights } => {
                let single = re
                    .highlight
                    .find_iter(response)
                    .filter(|m| !m.as_str().trim_matches('*').trim().is_empty())
                    .count();
                let double = re
                    .bold_highlight
                    .find_iter(response)
                    .filter(|m| {
                        let inner = m.as_str();
                        !inner[2..inner.len() - 2].trim().is_empty()
                    })
                    .count();
                single + double >= *num_highlights
            }
            Instruction::MultipleSections {
                section_splitter,
                num_sections,
            } => Regex::new(&format!(r"\s?{}\s?\d+\s?", regex::escape(section_splitter)))
                .is_ok_and(|re| re.split(response).count() - 1 >= *num_sections),
            Instruction::JsonFormat => {
                serde_json::from_str::<serde_json::Value>(strip_code_fences(response)).is_ok()
            }
            Instruction::Title => re.title.find_iter(response).any(|m| {
                !m.as_str()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .trim()
                    .is_empty()
            }),
            Instruction::TwoResponses => {
                let parts: Vec<&str> = response.split("******").collect();
                let last = parts.len() - 1;
                let mut valid = Vec::new();
                for (i, part) in parts.iter().enumerate() {
                    if part.trim().is_empty() {
                        if i != 0 && i != last {
                            return false;
                        }
                    } else {
                        valid.push(part.trim());
                    }
                }
                valid.len() == 2 && valid[0] != valid[1]
            }
            Instruction::RepeatPrompt { prompt_to_repeat } => response
                .trim()
                .to_lowercase()
                .starts_with(&prompt_to_repeat.trim().to_lowercase()),
            Instruction::EndChecker { end_phrase } => response
                .trim()
                .trim_matches('"')
                .to_lowercase()
                .ends_with(&end_phrase.trim().to_lowercase()),
            Instruction::CapitalWordFrequency {
                capital_frequency,
                capital_relation,
            } => {
                let capitals = re
                    .word
                    .find_iter(response)
                    .filter(|m| is_upper(m.as_str()))
                    .count();
                capital_relation.holds(capitals, *capital_frequency)
            }
            Instruction::EnglishCapital => is_upper(response) && is_english_or_unknown(response),
            Instruction::EnglishLowercase => {
                is_lower(response) && is_english_or_unknown(response)
            }
            Instruction::NoComma => !response.contains(','),
            Instruction::Quotation => {
                let trimmed = response.trim();
                trimmed.chars().count() > 1 && trimmed.starts_with('"') && trimmed.ends_with('"')
            }
        }
    }
}
