use crate::engine::content::ActiveWord;
use crate::engine::types::{EngineError, FINAL_PHASE};

/// Answer payload as submitted by the presentation layer. Phases 1 and 2
/// submit a chosen option; phase 3 submits the raw keystroke sequence.
#[derive(Debug, Clone)]
pub enum AnswerInput {
    Selection(String),
    Keystrokes(String),
}

#[derive(Debug, Clone)]
pub struct Evaluated {
    pub correct: bool,
    pub response_given: String,
    pub displayed: Option<String>,
    pub autocorrect_used: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedEvaluation {
    pub displayed: String,
    pub autocorrect_used: bool,
    pub correct: bool,
}

/// Replays the live autocorrection of the typing interface: each keystroke
/// that does not match the target character at its position is rewritten to
/// the target character before it reaches the displayed string; keystrokes
/// past the end of the target are dropped. Scoring only ever looks at the
/// original sequence, so a fully "correct-looking" displayed string still
/// scores as incorrect when any rewrite happened.
pub fn evaluate_typed(target: &str, keystrokes: &str) -> TypedEvaluation {
    let target_chars: Vec<char> = target.chars().collect();
    let mut displayed = String::new();
    let mut autocorrect_used = false;

    for (i, key) in keystrokes.chars().enumerate() {
        match target_chars.get(i) {
            Some(&expected) if key == expected => displayed.push(key),
            Some(&expected) => {
                displayed.push(expected);
                autocorrect_used = true;
            }
            None => {
                autocorrect_used = true;
            }
        }
    }

    TypedEvaluation {
        displayed,
        autocorrect_used,
        correct: keystrokes == target,
    }
}

pub fn evaluate(
    phase: i64,
    word: &ActiveWord,
    answer: &AnswerInput,
) -> Result<Evaluated, EngineError> {
    match (phase, answer) {
        (1, AnswerInput::Selection(selection)) => Ok(Evaluated {
            correct: selection == &word.definition,
            response_given: selection.clone(),
            displayed: None,
            autocorrect_used: false,
        }),
        (2, AnswerInput::Selection(selection)) => Ok(Evaluated {
            correct: selection == &word.base_form,
            response_given: selection.clone(),
            displayed: None,
            autocorrect_used: false,
        }),
        (FINAL_PHASE, AnswerInput::Keystrokes(keystrokes)) => {
            let typed = evaluate_typed(&word.base_form, keystrokes);
            Ok(Evaluated {
                correct: typed.correct,
                response_given: keystrokes.clone(),
                displayed: Some(typed.displayed),
                autocorrect_used: typed.autocorrect_used,
            })
        }
        (1 | 2, AnswerInput::Keystrokes(_)) => Err(EngineError::Validation(
            "phases 1 and 2 take a selection, not keystrokes".to_string(),
        )),
        (FINAL_PHASE, AnswerInput::Selection(_)) => Err(EngineError::Validation(
            "phase 3 takes keystrokes, not a selection".to_string(),
        )),
        _ => Err(EngineError::Validation(format!("unknown phase {phase}"))),
    }
}
