use std::collections::{BTreeMap, HashSet};

use crate::models::quiz::Question;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "his", "how", "its", "may", "new", "now", "see", "two", "who",
    "did", "get", "him", "let", "she", "too", "use", "that", "with", "have", "this", "will",
    "your", "from", "they", "been", "were", "said", "each", "which", "their", "there", "would",
    "other", "into", "more", "some", "these", "than", "then", "them", "what", "when", "where",
    "also", "such", "only", "very", "most", "over", "about", "after", "before", "because",
    "while", "being", "both", "between", "through", "during", "under", "should", "could",
    "does", "done", "made", "many", "much", "must", "same", "well", "just", "like",
];

const MAX_KEY_CONCEPTS: usize = 30;
const MIN_SENTENCE_CHARS: usize = 30;
const MIN_SENTENCE_WORDS: usize = 5;
const MAX_HEADING_WORDS: usize = 8;

/// Terms and structure pulled from the source document.
#[derive(Debug, Clone, Default)]
pub struct DocumentProfile {
    pub key_concepts: Vec<String>,
    pub sentences: Vec<String>,
    /// Heading text with the sentences that follow it.
    pub sections: Vec<(String, Vec<String>)>,
}

impl DocumentProfile {
    pub fn from_text(text: &str) -> Self {
        let sentences = split_sentences(text);
        let sections = extract_sections(text);
        let key_concepts = extract_key_concepts(text, &sections);
        Self {
            key_concepts,
            sentences,
            sections,
        }
    }

    pub fn mentions_key_concept(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.key_concepts.iter().any(|c| lower.contains(c.as_str()))
    }
}

pub fn split_sentences(text: &str) -> Vec<String> {
    text.replace('\n', ". ")
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .filter(|s| s.split_whitespace().count() >= MIN_SENTENCE_WORDS)
        .collect()
}

fn looks_like_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.ends_with(['.', '?', '!', ',', ';']) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_HEADING_WORDS {
        return false;
    }
    let numbered = words[0]
        .trim_end_matches(['.', ')'])
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.');
    let capitalised = words
        .iter()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase() || !c.is_alphabetic()));
    line.starts_with('#') || numbered || capitalised
}

fn clean_heading(line: &str) -> String {
    let trimmed = line.trim().trim_start_matches('#').trim();
    let mut words = trimmed.split_whitespace().peekable();
    if let Some(first) = words.peek() {
        if first
            .trim_end_matches(['.', ')'])
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
        {
            words.next();
        }
    }
    words.collect::<Vec<_>>().join(" ")
}

fn push_section(heading: Option<String>, body: &str, out: &mut Vec<(String, Vec<String>)>) {
    if let Some(h) = heading {
        let sentences = split_sentences(body);
        if !h.is_empty() && !sentences.is_empty() {
            out.push((h, sentences));
        }
    }
}

fn extract_sections(text: &str) -> Vec<(String, Vec<String>)> {
    let mut sections = Vec::new();
    let mut body = String::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if looks_like_heading(line) {
            push_section(current.take(), &body, &mut sections);
            body.clear();
            current = Some(clean_heading(line));
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    push_section(current, &body, &mut sections);
    sections
}

fn normalise_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Frequent non-trivial words, with heading words ranked first.
fn extract_key_concepts(text: &str, sections: &[(String, Vec<String>)]) -> Vec<String> {
    let stop: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for raw in text.split_whitespace() {
        let word = normalise_word(raw);
        if word.chars().count() < 4 || stop.contains(word.as_str()) {
            continue;
        }
        if !word.chars().all(char::is_alphabetic) {
            continue;
        }
        *counts.entry(word).or_default() += 1;
    }

    let heading_words: HashSet<String> = sections
        .iter()
        .flat_map(|(h, _)| h.split_whitespace().map(normalise_word))
        .filter(|w| counts.contains_key(w))
        .collect();

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(w, c)| *c >= 2 || heading_words.contains(w))
        .collect();
    ranked.sort_by(|(wa, ca), (wb, cb)| {
        let ha = heading_words.contains(wa);
        let hb = heading_words.contains(wb);
        hb.cmp(&ha).then(cb.cmp(ca)).then(wa.cmp(wb))
    });
    ranked
        .into_iter()
        .take(MAX_KEY_CONCEPTS)
        .map(|(w, _)| w)
        .collect()
}

/// Tunable acceptance rules for generated questions.
#[derive(Debug, Clone)]
pub struct QualityPolicy {
    pub required_options: usize,
    pub min_question_chars: usize,
    pub min_option_chars: usize,
    pub min_explanation_chars: usize,
    pub max_option_length_ratio: f64,
    pub min_meaningful_options: usize,
    pub min_checks_passed: usize,
    pub generic_phrases: Vec<String>,
    pub catch_all_options: Vec<String>,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            required_options: 4,
            min_question_chars: 10,
            min_option_chars: 0,
            min_explanation_chars: 20,
            max_option_length_ratio: 4.0,
            min_meaningful_options: 3,
            min_checks_passed: 3,
            generic_phrases: [
                "which of the following is true",
                "what is the main idea",
                "based on the content",
                "according to the text",
                "key concept",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            catch_all_options: [
                "none of the above",
                "all of the above",
                "none of these",
                "all of these",
                "both a and b",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted { checks_passed: usize },
    Malformed(String),
    LowQuality { checks_passed: usize },
}

impl QualityPolicy {
    pub fn structural_problem(&self, q: &Question) -> Option<String> {
        if q.options.len() != self.required_options {
            return Some(format!(
                "expected {} options, got {}",
                self.required_options,
                q.options.len()
            ));
        }
        let correct = q.correct_count();
        if correct != 1 {
            return Some(format!("expected one correct option, got {}", correct));
        }
        if q.question.trim().chars().count() <= self.min_question_chars {
            return Some("question text too short".to_string());
        }
        if q
            .options
            .iter()
            .any(|o| o.text.trim().chars().count() <= self.min_option_chars)
        {
            return Some("option text too short".to_string());
        }
        None
    }

    fn has_explanation(&self, q: &Question) -> bool {
        q.explanation
            .as_deref()
            .is_some_and(|e| e.trim().chars().count() >= self.min_explanation_chars)
    }

    fn balanced_options(&self, q: &Question) -> bool {
        let lengths: Vec<usize> = q.options.iter().map(|o| o.text.trim().chars().count()).collect();
        let (Some(&min), Some(&max)) = (lengths.iter().min(), lengths.iter().max()) else {
            return false;
        };
        min > 0 && max as f64 / min as f64 <= self.max_option_length_ratio
    }

    fn avoids_generic_phrasing(&self, q: &Question) -> bool {
        let lower = q.question.to_lowercase();
        !self.generic_phrases.iter().any(|p| lower.contains(p.as_str()))
    }

    fn meaningful_options(&self, q: &Question) -> bool {
        let has_catch_all = q.options.iter().any(|o| {
            let lower = o.text.trim().to_lowercase();
            self.catch_all_options.iter().any(|c| lower == *c)
        });
        let meaningful = q
            .options
            .iter()
            .filter(|o| {
                o.text
                    .split_whitespace()
                    .any(|w| normalise_word(w).chars().filter(|c| c.is_alphabetic()).count() >= 3)
            })
            .count();
        !has_catch_all && meaningful >= self.min_meaningful_options
    }

    pub fn checks_passed(&self, q: &Question, profile: &DocumentProfile) -> usize {
        let concept_check = profile.key_concepts.is_empty() || profile.mentions_key_concept(&q.question);
        [
            self.has_explanation(q),
            concept_check,
            self.balanced_options(q),
            self.avoids_generic_phrasing(q),
            self.meaningful_options(q),
        ]
        .into_iter()
        .filter(|passed| *passed)
        .count()
    }

    /// The structural gate runs first and cannot be outscored by the checklist.
    pub fn evaluate(&self, q: &Question, profile: &DocumentProfile) -> Verdict {
        if let Some(problem) = self.structural_problem(q) {
            return Verdict::Malformed(problem);
        }
        let checks_passed = self.checks_passed(q, profile);
        if checks_passed >= self.min_checks_passed {
            Verdict::Accepted { checks_passed }
        } else {
            Verdict::LowQuality { checks_passed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::McqOption;

    const DOC: &str = "Photosynthesis Basics\n\
        Photosynthesis converts light energy into chemical energy inside the chloroplast.\n\
        The chloroplast contains chlorophyll which absorbs light for photosynthesis.\n\
        Cellular Respiration\n\
        Respiration releases energy from glucose in the mitochondria of every cell.\n";

    fn question(options: &[(&str, bool)], explanation: &str) -> Question {
        Question {
            question: "Where does photosynthesis take place in plant cells?".into(),
            options: options
                .iter()
                .map(|(t, c)| McqOption {
                    text: (*t).into(),
                    is_correct: *c,
                })
                .collect(),
            explanation: Some(explanation.into()),
        }
    }

    fn good() -> Question {
        question(
            &[
                ("Chloroplast", true),
                ("Mitochondria", false),
                ("Nucleus", false),
                ("Ribosome", false),
            ],
            "Photosynthesis happens in the chloroplast, which holds chlorophyll.",
        )
    }

    #[test]
    fn profile_finds_concepts_and_sections() {
        let profile = DocumentProfile::from_text(DOC);
        assert!(profile.key_concepts.contains(&"photosynthesis".to_string()));
        assert!(profile.key_concepts.contains(&"chloroplast".to_string()));
        assert_eq!(profile.sections.len(), 2);
        assert_eq!(profile.sections[1].0, "Cellular Respiration");
        assert!(!profile.sentences.is_empty());
    }

    #[test]
    fn well_formed_question_is_accepted() {
        let profile = DocumentProfile::from_text(DOC);
        let verdict = QualityPolicy::default().evaluate(&good(), &profile);
        assert_eq!(verdict, Verdict::Accepted { checks_passed: 5 });
    }

    #[test]
    fn two_correct_options_always_rejected() {
        let profile = DocumentProfile::from_text(DOC);
        let mut q = good();
        q.options[1].is_correct = true;
        let policy = QualityPolicy {
            min_checks_passed: 0,
            ..QualityPolicy::default()
        };
        assert!(matches!(policy.evaluate(&q, &profile), Verdict::Malformed(_)));
        assert_eq!(policy.checks_passed(&q, &profile), 5);
    }

    #[test]
    fn wrong_option_count_is_malformed() {
        let q = question(&[("Chloroplast", true), ("Nucleus", false)], "long enough explanation text");
        assert!(QualityPolicy::default().structural_problem(&q).is_some());
    }

    #[test]
    fn catch_all_and_generic_phrasing_cost_checks() {
        let profile = DocumentProfile::from_text(DOC);
        let mut q = question(
            &[
                ("Chloroplast", true),
                ("None of the above", false),
                ("All of the above", false),
                ("X", false),
            ],
            "",
        );
        q.question = "Which of the following is true about the key concept?".into();
        let verdict = QualityPolicy::default().evaluate(&q, &profile);
        assert!(matches!(verdict, Verdict::LowQuality { .. }));
    }

    #[test]
    fn missing_key_concepts_pass_the_concept_check() {
        let profile = DocumentProfile::default();
        let policy = QualityPolicy::default();
        assert_eq!(policy.checks_passed(&good(), &profile), 5);
    }
}
