//! Render analysis text with lightweight markup into a .docx buffer.
//!
//! The report text uses `## `/`### `/`#### ` heading prefixes, `- ` bullets,
//! `N.`-numbered lines, and `**bold**` spans. Anything that does not match a
//! rule degrades to a plain paragraph; only an empty input is an error.

use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType,
};
use thiserror::Error;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const BULLET_NUMBERING: usize = 2;
const DECIMAL_NUMBERING: usize = 3;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("analysis text is empty; nothing to export")]
    EmptyInput,

    #[error("failed to assemble the document: {0}")]
    Assembly(String),
}

/// One logical line of the report markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: usize, text: String },
    Bullet(String),
    Numbered(String),
    Paragraph(String),
}

/// Split report text into blocks, line by line.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#### ") {
            blocks.push(Block::Heading {
                level: 4,
                text: rest.trim().to_string(),
            });
        } else if let Some(rest) = trimmed.strip_prefix("### ") {
            blocks.push(Block::Heading {
                level: 3,
                text: rest.trim().to_string(),
            });
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            blocks.push(Block::Heading {
                level: 2,
                text: rest.trim().to_string(),
            });
        } else if let Some(rest) = trimmed.strip_prefix("- ") {
            blocks.push(Block::Bullet(rest.trim().to_string()));
        } else if let Some(rest) = numbered_rest(trimmed) {
            blocks.push(Block::Numbered(rest.to_string()));
        } else {
            blocks.push(Block::Paragraph(trimmed.to_string()));
        }
    }
    blocks
}

/// `N.`-prefixed line → the text after the prefix.
fn numbered_rest(line: &str) -> Option<&str> {
    let dot = line.find(". ")?;
    let (digits, tail) = line.split_at(dot);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(tail[2..].trim())
    } else {
        None
    }
}

/// Split on `**` pairs into (text, bold) runs; unbalanced delimiters degrade
/// to a single plain run.
pub fn split_bold_runs(text: &str) -> Vec<(String, bool)> {
    let parts: Vec<&str> = text.split("**").collect();
    if parts.len() % 2 == 0 {
        return vec![(text.to_string(), false)];
    }
    parts
        .into_iter()
        .enumerate()
        .filter(|(_, p)| !p.is_empty())
        .map(|(i, p)| (p.to_string(), i % 2 == 1))
        .collect()
}

fn paragraph_with_runs(text: &str) -> Paragraph {
    let mut paragraph = Paragraph::new();
    for (run_text, bold) in split_bold_runs(text) {
        let run = Run::new().add_text(run_text);
        paragraph = paragraph.add_run(if bold { run.bold() } else { run });
    }
    paragraph
}

fn heading_style(id: &str, name: &str, size: usize) -> Style {
    Style::new(id, StyleType::Paragraph).name(name).size(size).bold()
}

/// Render report text into a .docx binary buffer, with `title` as the
/// top-level document heading.
pub fn export_docx(title: &str, text: &str) -> Result<Vec<u8>, ExportError> {
    if text.trim().is_empty() {
        return Err(ExportError::EmptyInput);
    }

    let mut docx = Docx::new()
        .add_style(heading_style("Heading1", "Heading 1", 32))
        .add_style(heading_style("Heading2", "Heading 2", 28))
        .add_style(heading_style("Heading3", "Heading 3", 26))
        .add_style(heading_style("Heading4", "Heading 4", 24))
        .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )))
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
        .add_abstract_numbering(AbstractNumbering::new(DECIMAL_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("decimal"),
            LevelText::new("%1."),
            LevelJc::new("left"),
        )))
        .add_numbering(Numbering::new(DECIMAL_NUMBERING, DECIMAL_NUMBERING));

    docx = docx.add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(title))
            .style("Heading1"),
    );

    for block in parse_blocks(text) {
        docx = docx.add_paragraph(match block {
            Block::Heading { level, text } => {
                paragraph_with_runs(&text).style(&format!("Heading{level}"))
            }
            Block::Bullet(text) => paragraph_with_runs(&text)
                .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0)),
            Block::Numbered(text) => paragraph_with_runs(&text)
                .numbering(NumberingId::new(DECIMAL_NUMBERING), IndentLevel::new(0)),
            Block::Paragraph(text) => paragraph_with_runs(&text),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ExportError::Assembly(e.to_string()))?;
    Ok(buffer.into_inner())
}
