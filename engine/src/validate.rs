//! Structural validation and deterministic fallback content.
//!
//! Validators check the minimum shape a caller can rely on; fallback
//! generators produce template content from the original request
//! parameters, fully offline. Every fallback satisfies its own validator
//! by construction, so callers with a fallback path never receive a
//! partially valid object.

use primer_types::{
    Flashcard, FlashcardSet, ModuleContent, ModuleSection, Nudge, NudgeSet, QuizQuestion, QuizSet,
};

/// Minimum prose length for a module section to count as real content.
const MIN_SECTION_CONTENT_LEN: usize = 50;

const QUIZ_ANSWER_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

#[must_use]
pub fn validate_module(module: &ModuleContent) -> bool {
    !module.title.trim().is_empty()
        && !module.sections.is_empty()
        && module.sections.iter().all(|section| {
            !section.title.trim().is_empty() && section.content.len() > MIN_SECTION_CONTENT_LEN
        })
}

#[must_use]
pub fn validate_flashcards(set: &FlashcardSet) -> bool {
    !set.is_empty()
        && set
            .cards
            .iter()
            .all(|card| !card.front_html.trim().is_empty() && !card.back_html.trim().is_empty())
}

#[must_use]
pub fn validate_quiz(quiz: &QuizSet) -> bool {
    !quiz.questions.is_empty()
        && quiz.questions.iter().all(|q| {
            !q.question.trim().is_empty()
                && q.answers.len() == QUIZ_ANSWER_COUNT
                && !q.correct_answers.is_empty()
                && q.correct_answers.iter().all(|&i| i < q.answers.len())
                && !q.explanation.trim().is_empty()
                && !q.question_type.trim().is_empty()
        })
}

#[must_use]
pub fn validate_nudges(set: &NudgeSet) -> bool {
    !set.nudges.is_empty() && set.nudges.iter().all(|n| !n.message.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Bring a deck to exactly `requested` cards: existing cards are kept
/// verbatim (first `requested` of them), short decks are padded with
/// placeholder cards, and ids are renumbered sequentially.
#[must_use]
pub fn normalize_flashcards(mut set: FlashcardSet, requested: usize, topic: &str) -> FlashcardSet {
    set.cards.truncate(requested);
    let have = set.cards.len();
    for i in have..requested {
        set.cards.push(placeholder_card(topic, i));
    }
    for (i, card) in set.cards.iter_mut().enumerate() {
        card.id = (i + 1) as u32;
    }
    set
}

fn placeholder_card(topic: &str, index: usize) -> Flashcard {
    Flashcard {
        id: (index + 1) as u32,
        front_html: format!("<p>Key point {} about {topic}</p>", index + 1),
        back_html: format!("<p>Review your notes on {topic} and fill in this card.</p>"),
    }
}

// ---------------------------------------------------------------------------
// Fallback generators
// ---------------------------------------------------------------------------

/// Template module used when generation fails outright.
#[must_use]
pub fn fallback_module(topic: &str) -> ModuleContent {
    let topic = display_topic(topic);
    ModuleContent {
        title: format!("Introduction to {topic}"),
        sections: vec![
            ModuleSection {
                title: format!("What is {topic}?"),
                content: format!(
                    "This module introduces {topic}. Automatic content generation was \
                     unavailable, so this is a starting outline: begin by writing down \
                     what you already know about {topic} and what you want to learn."
                ),
            },
            ModuleSection {
                title: "Key concepts".to_string(),
                content: format!(
                    "List the three most important ideas in {topic} and describe each \
                     one in your own words. Look for definitions, examples, and one \
                     common misconception for each idea."
                ),
            },
            ModuleSection {
                title: "Practice and review".to_string(),
                content: format!(
                    "Test yourself on {topic}: explain the main ideas without notes, \
                     then check what you missed. Revisit this module tomorrow to \
                     reinforce what you learned."
                ),
            },
        ],
    }
}

#[must_use]
pub fn fallback_flashcards(topic: &str, count: usize) -> FlashcardSet {
    let topic = display_topic(topic);
    let count = count.max(1);
    FlashcardSet {
        cards: (0..count).map(|i| placeholder_card(&topic, i)).collect(),
    }
}

#[must_use]
pub fn fallback_quiz(topic: &str, count: usize) -> QuizSet {
    let topic = display_topic(topic);
    let count = count.max(1);
    QuizSet {
        questions: (0..count)
            .map(|i| QuizQuestion {
                question: format!(
                    "Which study step best helps you master {topic}? (question {})",
                    i + 1
                ),
                answers: vec![
                    "Review the material and take notes".to_string(),
                    "Skip ahead without practicing".to_string(),
                    "Memorize without understanding".to_string(),
                    "Avoid testing yourself".to_string(),
                ],
                correct_answers: vec![0],
                explanation: format!(
                    "Active review with notes is the most reliable way to build \
                     understanding of {topic}."
                ),
                question_type: "multiple-choice".to_string(),
            })
            .collect(),
    }
}

#[must_use]
pub fn fallback_nudges(goal: &str) -> NudgeSet {
    let goal = display_topic(goal);
    NudgeSet {
        nudges: vec![
            Nudge {
                message: format!("A short session on {goal} today keeps your streak alive."),
                category: Some("streak".to_string()),
            },
            Nudge {
                message: format!("Five minutes of review on {goal} beats zero. Start small."),
                category: Some("momentum".to_string()),
            },
            Nudge {
                message: format!("You set out to learn {goal}. Future you says thanks."),
                category: Some("goal".to_string()),
            },
        ],
    }
}

fn display_topic(topic: &str) -> String {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        "your topic".to_string()
    } else {
        trimmed.to_string()
    }
}
