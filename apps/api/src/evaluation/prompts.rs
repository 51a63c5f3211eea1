//! Prompt compiler — turns a teacher's rubric selections into the natural-language
//! prompt sent to the text generator.
//!
//! Pure and total: no I/O, no clock, never fails. Missing references degrade to
//! placeholder text so a partially filled rubric still yields a sendable prompt.

use crate::evaluation::selection::EvaluationSelection;
use crate::models::catalog::{Block, Comment, Gradient, Subject, Term};
use crate::models::student::{Gender, Student};

/// Word ceiling stated in the closing constraints.
pub const MAX_REPORT_WORDS: u32 = 150;

/// Placeholder for a selected gradient that no longer exists.
pub const NO_EVALUATION: &str = "sense avaluació";

/// Opening sentence. Replace: {teacher}, {student_ref}, {student_name}, {child}, {course}
const OPENING_TEMPLATE: &str = "Ets {teacher} de primària. Redacta l'informe d'avaluació \
    {student_ref} {student_name}, {child} de {course} de primària.";

/// Replace: {term}, {subject}
const HEADER_TEMPLATE: &str = "Avaluació del {term} trimestre de l'àrea de {subject}:";

/// Replace: {block}, {gradient}
const BLOCK_TEMPLATE: &str = "{block}. Nivell assolit: {gradient}.";

/// Appended to a block paragraph when comments were chosen. Replace: {comments}
const COMMENTS_TEMPLATE: &str = " Observacions: {comments}.";

/// Composition constraints for the generator.
/// Replace: {max_words}, {gender}, {student_ref}
const CLOSING_TEMPLATE: &str = r#"Condicions de redacció:
- Extensió màxima de {max_words} paraules.
- No incloguis títols, subtítols ni apartats interns.
- Escriu en tercera persona i concorda tot el text en {gender} quan et refereixis {student_ref}.
- Redacta un únic text continu i cohesionat, amb un registre pedagògic, proper i constructiu.
- Escriu en català."#;

/// Everything the compiler reads. Blocks are expected to be pre-filtered to
/// the subject and term; the compiler iterates them as given.
pub struct PromptInput<'a> {
    pub student: &'a Student,
    pub subject: &'a Subject,
    pub term: Term,
    pub blocks: &'a [Block],
    pub gradients: &'a [Gradient],
    pub comments: &'a [Comment],
    pub selection: &'a EvaluationSelection,
    pub teacher_gender: Gender,
}

pub fn compile_prompt(input: &PromptInput<'_>) -> String {
    let student = input.student;

    let opening = OPENING_TEMPLATE
        .replace("{teacher}", teacher_noun(input.teacher_gender))
        .replace("{student_ref}", of_student(student.gender))
        .replace("{student_name}", &student.name)
        .replace("{child}", child_noun(student.gender))
        .replace("{course}", student.course.label());

    let header = HEADER_TEMPLATE
        .replace("{term}", input.term.ordinal())
        .replace("{subject}", &input.subject.name);

    let mut paragraphs = vec![opening, header];
    paragraphs.extend(input.blocks.iter().filter_map(|b| block_paragraph(input, b)));

    let closing = CLOSING_TEMPLATE
        .replace("{max_words}", &MAX_REPORT_WORDS.to_string())
        .replace("{gender}", gender_word(student.gender))
        .replace("{student_ref}", to_student(student.gender));
    paragraphs.push(closing);

    paragraphs.join("\n\n")
}

/// A block contributes only when a gradient was chosen for it.
fn block_paragraph(input: &PromptInput<'_>, block: &Block) -> Option<String> {
    let chosen = input.selection.get(block.id)?;
    let gradient_id = chosen.gradient_id?;

    let gradient_text = input
        .gradients
        .iter()
        .find(|g| g.id == gradient_id)
        .map(|g| g.text.as_str())
        .unwrap_or(NO_EVALUATION);

    let comment_texts: Vec<&str> = chosen
        .comment_ids
        .iter()
        .filter_map(|id| input.comments.iter().find(|c| c.id == *id))
        .map(|c| trim_sentence(&c.text))
        .collect();

    let mut paragraph = BLOCK_TEMPLATE
        .replace("{block}", &block.name)
        .replace("{gradient}", trim_sentence(gradient_text));

    if !comment_texts.is_empty() {
        paragraph.push_str(&COMMENTS_TEMPLATE.replace("{comments}", &comment_texts.join("; ")));
    }

    Some(paragraph)
}

/// Drops surrounding whitespace and one trailing period so templates can add
/// their own. An ellipsis keeps its first two dots and is completed by the template.
fn trim_sentence(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix('.').unwrap_or(text).trim_end()
}

fn teacher_noun(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "un mestre",
        Gender::Female => "una mestra",
    }
}

fn of_student(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "de l'alumne",
        Gender::Female => "de l'alumna",
    }
}

fn to_student(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "a l'alumne",
        Gender::Female => "a l'alumna",
    }
}

fn child_noun(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "un nen",
        Gender::Female => "una nena",
    }
}

fn gender_word(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "masculí",
        Gender::Female => "femení",
    }
}
