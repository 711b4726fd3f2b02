
use std::ops::Range;

use serde::Serialize;

use crate::config::IntentConfig;

pub const DEFAULT_STUDENT_KEYWORDS: &[&str] = &[
    "điểm",
    "sinh viên",
    "lớp",
    "thời khóa biểu",
    "mã số sinh viên",
    "học kỳ",
];

pub const DEFAULT_ADMISSION_KEYWORDS: &[&str] = &[
    "tuyển sinh",
    "ngành",
    "điểm chuẩn",
    "xét tuyển",
    "khối",
    "học phí",
];

/// Tags attached to a question. Both may be set, or neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub is_student_query: bool,
    pub is_admission_query: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    Student,
    Admission,
    General,
}

impl Intent {
    /// Ambiguous or untagged questions use the general template.
    #[inline]
    pub fn template(self) -> PromptTemplate {
        match (self.is_student_query, self.is_admission_query) {
            (true, false) => PromptTemplate::Student,
            (false, true) => PromptTemplate::Admission,
            _ => PromptTemplate::General,
        }
    }
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Intent;
}

/// Case-insensitive substring matching against two keyword lists.
///
/// A keyword occurrence that lies inside a longer matched keyword does not
/// count, so "điểm chuẩn" tags a question as admission without also tagging
/// it as student through "điểm".
#[derive(Debug, Clone)]
pub struct KeywordIntentClassifier {
    student: Vec<String>,
    admission: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Student,
    Admission,
}

impl KeywordIntentClassifier {
    #[inline]
    pub fn new(config: &IntentConfig) -> Self {
        Self {
            student: normalize_keywords(&config.student_keywords),
            admission: normalize_keywords(&config.admission_keywords),
        }
    }

    fn matches(&self, text: &str) -> Vec<(Range<usize>, Tag)> {
        let tagged = self
            .student
            .iter()
            .map(|k| (k, Tag::Student))
            .chain(self.admission.iter().map(|k| (k, Tag::Admission)));

        let mut found = Vec::new();
        for (keyword, tag) in tagged {
            for (start, matched) in text.match_indices(keyword.as_str()) {
                found.push((start..start + matched.len(), tag));
            }
        }
        found
    }
}

impl Default for KeywordIntentClassifier {
    #[inline]
    fn default() -> Self {
        Self::new(&IntentConfig::default())
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    #[inline]
    fn classify(&self, question: &str) -> Intent {
        let lower = question.to_lowercase();
        let matches = self.matches(&lower);

        let mut intent = Intent::default();
        for (span, tag) in &matches {
            let covered = matches.iter().any(|(other, _)| {
                other.len() > span.len() && other.start <= span.start && span.end <= other.end
            });
            if covered {
                continue;
            }
            match tag {
                Tag::Student => intent.is_student_query = true,
                Tag::Admission => intent.is_admission_query = true,
            }
        }
        intent
    }
}

fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
