//! Instruction id to checker construction.

use serde_json::{Map, Value};
use thiserror::Error;

use super::checkers::{Instruction, Relation};

/// Every supported instruction id with the argument names it reads.
pub const INSTRUCTION_IDS: [(&str, &[&str]); 25] = [
    ("keywords:existence", &["keywords"]),
    ("keywords:frequency", &["keyword", "frequency", "relation"]),
    ("keywords:forbidden_words", &["forbidden_words"]),
    ("keywords:letter_frequency", &["letter", "let_frequency", "let_relation"]),
    ("language:response_language", &["language"]),
    ("length_constraints:number_sentences", &["num_sentences", "relation"]),
    ("length_constraints:number_paragraphs", &["num_paragraphs"]),
    ("length_constraints:number_words", &["num_words", "relation"]),
    (
        "length_constraints:nth_paragraph_first_word",
        &["num_paragraphs", "nth_paragraph", "first_word"],
    ),
    ("detectable_content:number_placeholders", &["num_placeholders"]),
    ("detectable_content:postscript", &["postscript_marker"]),
    ("detectable_format:number_bullet_lists", &["num_bullets"]),
    ("detectable_format:constrained_response", &[]),
    ("detectable_format:number_highlighted_sections", &["num_highlights"]),
    ("detectable_format:multiple_sections", &["section_splitter", "num_sections"]),
    ("detectable_format:json_format", &[]),
    ("detectable_format:title", &[]),
    ("combination:two_responses", &[]),
    ("combination:repeat_prompt", &["prompt_to_repeat"]),
    ("startend:end_checker", &["end_phrase"]),
    ("change_case:capital_word_frequency", &["capital_frequency", "capital_relation"]),
    ("change_case:english_capital", &[]),
    ("change_case:english_lowercase", &[]),
    ("punctuation:no_comma", &[]),
    ("startend:quotation", &[]),
];

/// Argument names accepted under an older spelling.
const LEGACY_ARGUMENTS: [(&str, &str); 1] = [("section_spliter", "section_splitter")];

#[derive(Debug, Error, PartialEq)]
pub enum InstructionError {
    #[error("unknown instruction id: {0}")]
    Unknown(String),

    #[error("{id}: missing argument '{argument}'")]
    MissingArgument { id: String, argument: String },

    #[error("{id}: invalid argument '{argument}': {reason}")]
    InvalidArgument {
        id: String,
        argument: String,
        reason: String,
    },
}

pub fn is_known(id: &str) -> bool {
    INSTRUCTION_IDS.iter().any(|(known, _)| *known == id)
}

/// Argument names read by `id`.
pub fn argument_names(id: &str) -> Option<&'static [&'static str]> {
    INSTRUCTION_IDS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, names)| *names)
}

/// Clean up one instruction's keyword arguments before construction.
///
/// Legacy argument names are renamed, `null` values dropped, and a `prompt`
/// argument is blanked so checkers never match against the prompt itself.
pub fn normalize_kwargs(kwargs: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in kwargs {
        if value.is_null() {
            continue;
        }
        let key = LEGACY_ARGUMENTS
            .iter()
            .find(|(legacy, _)| *legacy == key.as_str())
            .map_or(key.as_str(), |(_, current)| *current);
        out.insert(key.to_string(), value.clone());
    }
    if out.contains_key("prompt") {
        out.insert("prompt".to_string(), Value::String(String::new()));
    }
    out
}

struct Args<'a> {
    id: &'a str,
    kwargs: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn get(&self, name: &str) -> Result<&'a Value, InstructionError> {
        self.kwargs
            .get(name)
            .ok_or_else(|| InstructionError::MissingArgument {
                id: self.id.to_string(),
                argument: name.to_string(),
            })
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> InstructionError {
        InstructionError::InvalidArgument {
            id: self.id.to_string(),
            argument: name.to_string(),
            reason: reason.into(),
        }
    }

    fn count(&self, name: &str) -> Result<usize, InstructionError> {
        let value = self.get(name)?;
        let n = match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        n.map(|n| n as usize)
            .ok_or_else(|| self.invalid(name, format!("expected a non-negative integer, got {value}")))
    }

    fn text(&self, name: &str) -> Result<String, InstructionError> {
        match self.get(name)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.invalid(name, format!("expected a string, got {other}"))),
        }
    }

    fn words(&self, name: &str) -> Result<Vec<String>, InstructionError> {
        match self.get(name)? {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(name, format!("expected strings, got {item}")))
                })
                .collect(),
            other => Err(self.invalid(name, format!("expected a list of strings, got {other}"))),
        }
    }

    fn relation(&self, name: &str) -> Result<Relation, InstructionError> {
        self.text(name)?
            .parse()
            .map_err(|reason: String| self.invalid(name, reason))
    }

    fn letter(&self, name: &str) -> Result<char, InstructionError> {
        let text = self.text(name)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => Ok(c),
            _ => Err(self.invalid(name, format!("expected a single letter, got '{text}'"))),
        }
    }
}

/// Build the checker for `id` from already normalized keyword arguments.
/// Arguments the instruction does not read are ignored.
pub fn build_instruction(
    id: &str,
    kwargs: &Map<String, Value>,
) -> Result<Instruction, InstructionError> {
    let a = Args { id, kwargs };
    let instruction = match id {
        "keywords:existence" => Instruction::KeywordExistence {
            keywords: a.words("keywords")?,
        },
        "keywords:frequency" => Instruction::KeywordFrequency {
            keyword: a.text("keyword")?,
            frequency: a.count("frequency")?,
            relation: a.relation("relation")?,
        },
        "keywords:forbidden_words" => Instruction::ForbiddenWords {
            forbidden_words: a.words("forbidden_words")?,
        },
        "keywords:letter_frequency" => Instruction::LetterFrequency {
            letter: a.letter("letter")?,
            frequency: a.count("let_frequency")?,
            relation: a.relation("let_relation")?,
        },
        "language:response_language" => Instruction::ResponseLanguage {
            language: a.text("language")?,
        },
        "length_constraints:number_sentences" => Instruction::NumberSentences {
            num_sentences: a.count("num_sentences")?,
            relation: a.relation("relation")?,
        },
        "length_constraints:number_paragraphs" => Instruction::NumberParagraphs {
            num_paragraphs: a.count("num_paragraphs")?,
        },
        "length_constraints:number_words" => Instruction::NumberWords {
            num_words: a.count("num_words")?,
            relation: a.relation("relation")?,
        },
        "length_constraints:nth_paragraph_first_word" => Instruction::NthParagraphFirstWord {
            num_paragraphs: a.count("num_paragraphs")?,
            nth_paragraph: a.count("nth_paragraph")?,
            first_word: a.text("first_word")?,
        },
        "detectable_content:number_placeholders" => Instruction::NumberPlaceholders {
            num_placeholders: a.count("num_placeholders")?,
        },
        "detectable_content:postscript" => Instruction::Postscript {
            marker: a.text("postscript_marker")?,
        },
        "detectable_format:number_bullet_lists" => Instruction::NumberBulletLists {
            num_bullets: a.count("num_bullets")?,
        },
        "detectable_format:constrained_response" => Instruction::ConstrainedResponse,
        "detectable_format:number_highlighted_sections" => {
            Instruction::NumberHighlightedSections {
                num_highlights: a.count("num_highlights")?,
            }
        }
        "detectable_format:multiple_sections" => Instruction::MultipleSections {
            section_splitter: a.text("section_splitter")?,
            num_sections: a.count("num_sections")?,
        },
        "detectable_format:json_format" => Instruction::JsonFormat,
        "detectable_format:title" => Instruction::Title,
        "combination:two_responses" => Instruction::TwoResponses,
        "combination:repeat_prompt" => Instruction::RepeatPrompt {
            prompt_to_repeat: a.text("prompt_to_repeat")?,
        },
        "startend:end_checker" => Instruction::EndChecker {
            end_phrase: a.text("end_phrase")?,
        },
        "change_case:capital_word_frequency" => Instruction::CapitalWordFrequency {
            capital_frequency: a.count("capital_frequency")?,
            capital_relation: a.relation("capital_relation")?,
        },
        "change_case:english_capital" => Instruction::EnglishCapital,
        "change_case:english_lowercase" => Instruction::EnglishLowercase,
        "punctuation:no_comma" => Instruction::NoComma,
        "startend:quotation" => Instruction::Quotation,
        other => return Err(InstructionError::Unknown(other.to_string())),
    };
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_every_id_has_a_builder() {
        for (id, names) in INSTRUCTION_IDS {
            let mut args = Map::new();
            for name in names {
                let value = match *name {
                    "relation" | "let_relation" | "capital_relation" => json!("at least"),
                    "keywords" | "forbidden_words" => json!(["rust"]),
                    "letter" => json!("r"),
                    n if n.starts_with("num") || n.ends_with("frequency") || n == "nth_paragraph" => {
                        json!(2)
                    }
                    _ => json!("text"),
                };
                args.insert(name.to_string(), value);
            }
            assert!(build_instruction(id, &args).is_ok(), "failed to build {id}");
        }
    }

    #[test]
    fn test_legacy_section_splitter_is_renamed() {
        let normalized =
            normalize_kwargs(&kwargs(json!({"section_spliter": "SECTION", "num_sections": 3})));
        assert!(normalized.contains_key("section_splitter"));
        assert!(!normalized.contains_key("section_spliter"));

        let instruction =
            build_instruction("detectable_format:multiple_sections", &normalized).unwrap();
        assert_eq!(
            instruction,
            Instruction::MultipleSections {
                section_splitter: "SECTION".to_string(),
                num_sections: 3,
            }
        );
    }

    #[test]
    fn test_prompt_argument_is_blanked() {
        let normalized = normalize_kwargs(&kwargs(json!({"prompt": "Write an essay", "num_words": 5})));
        assert_eq!(normalized["prompt"], json!(""));
        assert_eq!(normalized["num_words"], json!(5));
    }

    #[test]
    fn test_nulls_are_dropped() {
        let normalized = normalize_kwargs(&kwargs(json!({"num_words": 300, "relation": "less than", "keyword": null})));
        assert_eq!(normalized.len(), 2);
        assert!(build_instruction("length_constraints:number_words", &normalized).is_ok());
    }

    #[test]
    fn test_float_counts_accepted() {
        let instruction = build_instruction(
            "length_constraints:number_paragraphs",
            &kwargs(json!({"num_paragraphs": 4.0})),
        )
        .unwrap();
        assert_eq!(instruction, Instruction::NumberParagraphs { num_paragraphs: 4 });
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            build_instruction("punctuation:no_semicolon", &Map::new()),
            Err(InstructionError::Unknown("punctuation:no_semicolon".to_string()))
        );
        assert!(matches!(
            build_instruction("length_constraints:number_words", &kwargs(json!({"num_words": 5}))),
            Err(InstructionError::MissingArgument { .. })
        ));
        assert!(matches!(
            build_instruction(
                "length_constraints:number_words",
                &kwargs(json!({"num_words": 5, "relation": "around"}))
            ),
            Err(InstructionError::InvalidArgument { .. })
        ));
    }
}
