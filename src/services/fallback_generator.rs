use std::collections::HashSet;

use crate::models::quiz::{McqOption, Question};
use crate::services::mcq_quality::DocumentProfile;

const BLANK: &str = "_____";
const OPTIONS_PER_QUESTION: usize = 4;
const MIN_SECTIONS_FOR_HEADING_QUESTIONS: usize = 4;

/// Rule-based question builder used whenever the model falls short.
pub struct FallbackGenerator<'a> {
    profile: &'a DocumentProfile,
}

impl<'a> FallbackGenerator<'a> {
    pub fn new(profile: &'a DocumentProfile) -> Self {
        Self { profile }
    }

    /// Always returns exactly `count` questions, padding with placeholders.
    pub fn generate(&self, count: usize) -> Vec<Question> {
        let mut out: Vec<Question> = Vec::with_capacity(count);
        let mut seen: HashSet<String> = HashSet::new();

        let candidates = self
            .profile
            .sentences
            .iter()
            .enumerate()
            .filter_map(|(i, s)| self.fill_in_blank(s, i))
            .chain(
                (0..self.profile.sections.len()).filter_map(|i| self.heading_question(i)),
            );

        for q in candidates {
            if out.len() >= count {
                break;
            }
            if seen.insert(q.question.to_lowercase()) {
                out.push(q);
            }
        }

        while out.len() < count {
            out.push(placeholder(out.len() + 1));
        }
        out
    }

    fn fill_in_blank(&self, sentence: &str, position: usize) -> Option<Question> {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.len() < 5 {
            return None;
        }

        let concept_at = words.iter().position(|w| {
            let n = clean_word(w).to_lowercase();
            !n.is_empty() && self.profile.key_concepts.contains(&n)
        });
        let blank_at = concept_at.unwrap_or(words.len() / 2);
        let answer = clean_word(words[blank_at]);
        if answer.chars().count() < 2 {
            return None;
        }

        let mut text_words: Vec<&str> = words.clone();
        text_words[blank_at] = BLANK;
        let question = format!("Fill in the blank: {}?", text_words.join(" "));

        let distractors = self.distractors_for(&answer, sentence);
        let explanation = format!("The correct answer is '{}' based on the context.", answer);
        Some(assemble(question, answer, distractors, explanation, position))
    }

    fn distractors_for(&self, answer: &str, sentence: &str) -> Vec<String> {
        let sentence_lower = sentence.to_lowercase();
        let mut taken: HashSet<String> = HashSet::from([answer.to_lowercase()]);
        let mut picked: Vec<String> = Vec::new();

        let mut offer = |candidate: String, picked: &mut Vec<String>| {
            if picked.len() < OPTIONS_PER_QUESTION - 1
                && !candidate.trim().is_empty()
                && taken.insert(candidate.to_lowercase())
            {
                picked.push(candidate);
            }
        };

        // concepts from elsewhere in the document read as plausible alternatives
        for concept in &self.profile.key_concepts {
            if !sentence_lower.contains(concept.as_str()) {
                offer(match_case(concept, answer), &mut picked);
            }
        }

        let toggled = match answer.strip_suffix('s') {
            Some(stem) if stem.chars().count() > 1 => stem.to_string(),
            _ => format!("{}s", answer),
        };
        offer(toggled, &mut picked);

        let target_len = answer.chars().count();
        for s in &self.profile.sentences {
            for w in s.split_whitespace() {
                let w = clean_word(w);
                let len = w.chars().count();
                if len >= 4 && len.abs_diff(target_len) <= 2 && w.chars().all(char::is_alphabetic) {
                    offer(w, &mut picked);
                }
            }
        }

        offer(format!("not {}", answer), &mut picked);
        offer(format!("non-{}", answer), &mut picked);
        picked
    }

    fn heading_question(&self, index: usize) -> Option<Question> {
        let sections = &self.profile.sections;
        if sections.len() < MIN_SECTIONS_FOR_HEADING_QUESTIONS {
            return None;
        }
        let (heading, body) = &sections[index];
        let answer = body.first()?.clone();

        let distractors: Vec<String> = (1..sections.len())
            .map(|step| &sections[(index + step) % sections.len()])
            .filter_map(|(_, b)| b.first().cloned())
            .filter(|s| !s.eq_ignore_ascii_case(&answer))
            .take(OPTIONS_PER_QUESTION - 1)
            .collect();
        if distractors.len() < OPTIONS_PER_QUESTION - 1 {
            return None;
        }

        let question = format!("Which statement belongs to the section \"{}\"?", heading);
        let explanation = format!("The section \"{}\" states: {}.", heading, answer);
        Some(assemble(question, answer, distractors, explanation, index))
    }
}

fn clean_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
}

fn match_case(candidate: &str, reference: &str) -> String {
    if reference.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = candidate.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        candidate.to_string()
    }
}

/// The correct option rotates through the four slots by `position`.
fn assemble(
    question: String,
    answer: String,
    distractors: Vec<String>,
    explanation: String,
    position: usize,
) -> Question {
    let mut options: Vec<McqOption> = distractors
        .into_iter()
        .map(|text| McqOption {
            text,
            is_correct: false,
        })
        .collect();
    let slot = position % (options.len() + 1);
    options.insert(
        slot,
        McqOption {
            text: answer,
            is_correct: true,
        },
    );
    Question {
        question,
        options,
        explanation: Some(explanation),
    }
}

fn placeholder(number: usize) -> Question {
    Question {
        question: format!("Question {}: Based on the content, what is a key concept?", number),
        options: ["Concept A", "Concept B", "Concept C", "Concept D"]
            .iter()
            .enumerate()
            .map(|(i, t)| McqOption {
                text: (*t).to_string(),
                is_correct: i == 0,
            })
            .collect(),
        explanation: Some("This is a general question based on the content.".to_string()),
    }
}
