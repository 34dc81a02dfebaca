//! Proof documents
//!
//! Extracts the title, theorem and proof of a ProofWiki page and renders the
//! result as display text.

pub mod symbols;

use std::fmt;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

pub use symbols::translate;

/// Tags that make up the body of a theorem or proof section
const BODY_TAGS: [&str; 3] = ["p", "dl", "table"];

/// Marker closing a proof; anything after it belongs to other sections
const PROOF_END: &str = "blacksquare";

/// Errors for pages that do not have the expected structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing {}.", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Missing proof end (blacksquare)")]
    MissingProofEnd,
    #[error("Invalid selector: {0}")]
    Selector(&'static str),
}

/// Raw sections of a proof page, still containing markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProof {
    pub title: String,
    pub theorem: String,
    pub proof: String,
}

/// Parse a proof page.
pub fn parse(html: &str) -> Result<ParsedProof, ParseError> {
    let document = Html::parse_document(html);

    let title = document.select(&selector("h1#firstHeading")?).next();
    let body = document.select(&selector("div#bodyContent")?).next();
    let theorem_sel = selector("span#Theorem")?;
    let proof_sel = selector("span#Proof")?;
    let theorem = body.and_then(|b| b.select(&theorem_sel).next());
    let proof = body.and_then(|b| b.select(&proof_sel).next());

    let (Some(title), Some(theorem), Some(proof)) = (title, theorem, proof) else {
        return Err(missing([
            ("title", title.is_none()),
            ("theorem", theorem.is_none()),
            ("proof", proof.is_none()),
        ]));
    };

    // Section anchors are spans inside a heading; the heading is the
    // sibling of the section body.
    let theorem_header = theorem.parent().unwrap_or(*theorem);
    let proof_header = proof.parent().unwrap_or(*proof);

    let theorem_body: Vec<ElementRef> = theorem_header
        .next_siblings()
        .take_while(|node| node.id() != proof_header.id())
        .filter_map(ElementRef::wrap)
        .filter(is_body_node)
        .collect();
    let mut proof_body: Vec<ElementRef> = proof_header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(is_body_node)
        .collect();

    if theorem_body.is_empty() || proof_body.is_empty() {
        return Err(missing([
            ("theorem body", theorem_body.is_empty()),
            ("proof body", proof_body.is_empty()),
        ]));
    }

    let end = proof_body
        .iter()
        .position(|node| node.text().collect::<String>().contains(PROOF_END))
        .ok_or(ParseError::MissingProofEnd)?;
    proof_body.truncate(end + 1);

    Ok(ParsedProof {
        title: title.text().collect::<String>().trim().to_string(),
        theorem: render_nodes(&theorem_body),
        proof: render_nodes(&proof_body),
    })
}

fn missing<const N: usize>(parts: [(&'static str, bool); N]) -> ParseError {
    ParseError::Missing(
        parts
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect(),
    )
}

fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css))
}

fn is_body_node(element: &ElementRef<'_>) -> bool {
    BODY_TAGS.contains(&element.value().name())
}

fn render_nodes(nodes: &[ElementRef<'_>]) -> String {
    nodes
        .iter()
        .map(|node| node_to_text(*node))
        .collect::<String>()
        .trim()
        .to_string()
}

fn node_to_text(node: ElementRef<'_>) -> String {
    match node.value().name() {
        "dl" => format!("\\qquad{}\n", node.text().collect::<String>()),
        "table" => {
            let (Ok(row_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("td")) else {
                return node.text().collect();
            };
            let rows: Vec<String> = node
                .select(&row_sel)
                .map(|row| {
                    let cells: Vec<&str> = row
                        .select(&cell_sel)
                        .flat_map(|cell| cell.text())
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .collect();
                    format!("\\qquad{}", cells.join("\\ "))
                })
                .collect();
            format!("{}\n", rows.join("\\\\"))
        }
        _ => node.text().collect(),
    }
}

/// A proof ready to be displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRecord {
    pub title: String,
    pub theorem: String,
    pub proof: String,
}

impl ProofRecord {
    /// Translate the markup of a parsed page into display text
    pub fn from_parsed(parsed: ParsedProof) -> Self {
        Self {
            theorem: translate(&parsed.theorem),
            proof: translate(&parsed.proof),
            title: parsed.title,
        }
    }

    /// Number of lines in the display form, without rendering it
    pub fn line_count(&self) -> usize {
        // Title, rule, theorem, blank line, "Proof:" and proof
        let breaks = [&self.title, &self.theorem, &self.proof]
            .iter()
            .map(|part| part.matches('\n').count())
            .sum::<usize>();
        breaks + 6
    }
}

impl fmt::Display for ProofRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(self.title.chars().count());
        write!(
            f,
            "{}\n{}\n{}\n\nProof:\n{}",
            self.title, rule, self.theorem, self.proof
        )
    }
}
