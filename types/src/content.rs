//! Content shapes handed back to callers.
//!
//! These mirror the wire format the models are asked to produce (camelCase
//! keys, `frontHTML`/`backHTML` on cards). An instance that reaches a caller
//! has already passed its validator; nothing here enforces shape on its own.

use serde::{Deserialize, Serialize};

/// The kinds of content the generation layer can produce. Used to key
/// per-kind behavior such as the outer-retry toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Module,
    Flashcards,
    Quiz,
    Nudges,
    Chat,
}

impl ContentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentKind::Module => "module",
            ContentKind::Flashcards => "flashcards",
            ContentKind::Quiz => "quiz",
            ContentKind::Nudges => "nudges",
            ContentKind::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    pub title: String,
    pub content: String,
}

/// A learning module: a titled sequence of prose sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleContent {
    pub title: String,
    pub sections: Vec<ModuleSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    #[serde(default)]
    pub id: u32,
    #[serde(rename = "frontHTML")]
    pub front_html: String,
    #[serde(rename = "backHTML")]
    pub back_html: String,
}

/// An ordered deck of flashcards. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashcardSet {
    pub cards: Vec<Flashcard>,
}

impl FlashcardSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub answers: Vec<String>,
    /// Indices into `answers`.
    pub correct_answers: Vec<usize>,
    pub explanation: String,
    pub question_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSet {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nudge {
    pub message: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Short motivational prompts shown between study sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NudgeSet {
    pub nudges: Vec<Nudge>,
}

#[cfg(test)]
mod tests {
    use super::{Flashcard, FlashcardSet, QuizQuestion};

    #[test]
    fn flashcard_uses_html_field_names_on_the_wire() {
        let card = Flashcard {
            id: 1,
            front_html: "<b>Q</b>".to_string(),
            back_html: "A".to_string(),
        };
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"frontHTML\""));
        assert!(json.contains("\"backHTML\""));
    }

    #[test]
    fn flashcard_set_is_a_bare_array() {
        let set: FlashcardSet =
            serde_json::from_str(r#"[{"id":1,"frontHTML":"Q","backHTML":"A"}]"#).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.cards[0].front_html, "Q");
    }

    #[test]
    fn quiz_question_round_trips_camel_case() {
        let q: QuizQuestion = serde_json::from_str(
            r#"{
                "question": "2 + 2?",
                "answers": ["3", "4", "5", "22"],
                "correctAnswers": [1],
                "explanation": "Basic arithmetic.",
                "questionType": "multiple-choice"
            }"#,
        )
        .unwrap();
        assert_eq!(q.correct_answers, vec![1]);
        assert_eq!(q.question_type, "multiple-choice");
    }
}
