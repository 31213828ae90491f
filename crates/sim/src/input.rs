//! The parameter-file reader.
//!
//! Line-oriented, section-driven: `//` comments and surrounding whitespace
//! are stripped, a `#`-prefixed keyword opens a section, and each section
//! has a fixed row grammar. Reading is two-pass: the whole file is validated
//! token by token first, then materialized. Token validation follows the
//! eat-substring contract: an optional prefix, a permitted-character
//! whitelist, and an end-of-line expectation that is required, forbidden, or
//! don't-care. A failed row reports the section's canonical syntax with an
//! example.

use crate::errors::SimError;
use crate::events::{Event, IntroducedMutation, OutputEvent, PartialSweep, Schedule};
use crate::mutation::{Dfe, MutationType};
use std::fs;
use std::path::{Path, PathBuf};

const DIGITS: &str = "1234567890";
const DIGITS_E: &str = "1234567890e";
const FLOAT_CHARS: &str = "1234567890.e-";
const SIGNED_FLOAT_CHARS: &str = "1234567890.-e";

pub const USAGE_MUTATION_RATE: &str = "#MUTATION RATE\n<u>\n\nExample:\n\n#MUTATION RATE\n1.5e-8";
pub const USAGE_MUTATION_TYPES: &str = "#MUTATION TYPES\n<mutation-type-id> <h> <DFE-type> [DFE parameters]\n...\n\nExample:\n\n#MUTATION TYPES\nm1 0.2 g -0.05 0.2\nm2 0.0 f 0.0\nm3 0.5 e 0.01";
pub const USAGE_GENOMIC_ELEMENT_TYPES: &str = "#GENOMIC ELEMENT TYPES\n<element-type-id> <mut-type> <x> [<mut-type> <x>...]\n...\n\nExample:\n\n#GENOMIC ELEMENT TYPES\ng1 m3 0.8 m2 0.01 m1 0.19";
pub const USAGE_CHROMOSOME_ORGANIZATION: &str = "#CHROMOSOME ORGANIZATION\n<element-type> <start> <end>\n...\n\nExample:\n\n#CHROMOSOME ORGANIZATION\ng1 1000 1999";
pub const USAGE_RECOMBINATION_RATE: &str = "#RECOMBINATION RATE\n<interval-end> <r>\n...\n\nExample:\n\n#RECOMBINATION RATE\n10000 1e-8\n20000 4.5e-8";
pub const USAGE_GENE_CONVERSION: &str = "#GENE CONVERSION\n<fraction> <average-length>\n\nExample:\n\n#GENE CONVERSION\n0.5 20";
pub const USAGE_GENERATIONS: &str = "#GENERATIONS\n<t> [<start>]\n\nExample:\n\n#GENERATIONS\n10000";
pub const USAGE_DEMOGRAPHY: &str = "#DEMOGRAPHY AND STRUCTURE\n<time> <event-type> [event parameters]\n...\n\nExample:\n\n#DEMOGRAPHY AND STRUCTURE\n1 P p1 1000\n1 S p1 0.05\n1000 P p2 100 p1\n2000 N p1 1e4\n2000 M p2 p1 0.01";
pub const USAGE_OUTPUT: &str = "#OUTPUT\n<time> <output-type> [output parameters]\n...\n\nExample:\n\n#OUTPUT\n2000 A outfile\n1000 R p1 10\n1000 R p1 10 MS\n2000 F\n1 T m3";
pub const USAGE_PREDETERMINED: &str = "#PREDETERMINED MUTATIONS\n<time> <mut-type> <x> <pop> <nAA> <nAa> [P <f>]\n\nExample:\n\n#PREDETERMINED MUTATIONS\n5000 m7 45000 p1 0 1";
pub const USAGE_SEED: &str = "#SEED\n<seed>\n\nExample:\n\n#SEED\n141235";
pub const USAGE_INITIALIZATION: &str = "#INITIALIZATION\n<filename>\n\nExample:\n\n#INITIALIZATION\noutfile";

/// End-of-line expectation for one eaten token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eol {
    Expected,
    NotExpected,
    Agnostic,
}

/// Whitespace-token scanner for one row, enforcing the eat-substring
/// contract.
struct RowScanner<'a> {
    tokens: Vec<&'a str>,
    index: usize,
}

impl<'a> RowScanner<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace().collect(),
            index: 0,
        }
    }

    fn current(&self) -> Option<&'a str> {
        self.tokens.get(self.index).copied()
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    /// Eat the current token: it must carry `prefix`, its remaining
    /// characters must all come from `allowed`, and the end-of-line state
    /// after it must match `eol`. Advances past the token unless the line
    /// end was required.
    fn eat(&mut self, prefix: &str, allowed: &str, eol: Eol) -> bool {
        let mut good = true;
        match self.current() {
            None => good = false,
            Some(token) => {
                let body = match token.strip_prefix(prefix) {
                    Some(body) => body,
                    None => {
                        good = false;
                        token
                    }
                };
                if !body.chars().all(|c| allowed.contains(c)) {
                    good = false;
                }
            }
        }

        let has_next = self.index + 1 < self.tokens.len();
        match eol {
            Eol::Expected => {
                if has_next {
                    good = false;
                }
            }
            Eol::NotExpected => {
                if !has_next {
                    good = false;
                }
            }
            Eol::Agnostic => {}
        }
        if eol != Eol::Expected {
            self.index += 1;
        }
        good
    }
}

/// Strip the `//` comment and surrounding whitespace from one raw line.
fn sanitize(line: &str) -> &str {
    let line = match line.find("//") {
        Some(at) => &line[..at],
        None => line,
    };
    line.trim()
}

/// One section: its header line plus its sanitized non-empty rows.
struct Section {
    header: String,
    rows: Vec<String>,
}

fn read_sections(path: &Path) -> Result<Vec<Section>, SimError> {
    let text = fs::read_to_string(path).map_err(|_| {
        SimError::invalid_input(format!("could not open: {}", path.display()))
    })?;
    let mut sections: Vec<Section> = Vec::new();
    for raw in text.lines() {
        let line = sanitize(raw);
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            sections.push(Section {
                header: line.to_string(),
                rows: Vec::new(),
            });
        } else if let Some(section) = sections.last_mut() {
            section.rows.push(line.to_string());
        }
        // rows before any header are silently skipped, as in the original
        // reader
    }
    Ok(sections)
}

fn bad_row(what: &str, line: &str, usage: &'static str) -> SimError {
    SimError::invalid_input_with_usage(format!("invalid {what}: {line}"), usage)
}

/// Pass 1: validate every row of the file and the section cardinalities.
pub fn check_file(path: &Path) -> Result<(), SimError> {
    let sections = read_sections(path)?;
    let mut num_mutation_rates = 0;
    let mut num_mutation_types = 0;
    let mut num_element_types = 0;
    let mut num_organizations = 0;
    let mut num_recombination_rates = 0;
    let mut num_generations = 0;
    let mut num_subpopulations = 0;

    for section in &sections {
        let header = section.header.as_str();
        if header.contains("MUTATION RATE") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                if !scanner.eat("", FLOAT_CHARS, Eol::Expected) {
                    return Err(bad_row("mutation rate", row, USAGE_MUTATION_RATE));
                }
                num_mutation_rates += 1;
            }
        } else if header.contains("MUTATION TYPES") {
            for row in &section.rows {
                if !check_mutation_type_row(row) {
                    return Err(bad_row("mutation type", row, USAGE_MUTATION_TYPES));
                }
                num_mutation_types += 1;
            }
        } else if header.contains("GENOMIC ELEMENT TYPES") {
            for row in &section.rows {
                if !check_element_type_row(row) {
                    return Err(bad_row(
                        "genomic element type",
                        row,
                        USAGE_GENOMIC_ELEMENT_TYPES,
                    ));
                }
                num_element_types += 1;
            }
        } else if header.contains("CHROMOSOME ORGANIZATION") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                let good = scanner.eat("g", DIGITS, Eol::NotExpected)
                    && scanner.eat("", DIGITS_E, Eol::NotExpected)
                    && scanner.eat("", DIGITS_E, Eol::Expected);
                if !good {
                    return Err(bad_row(
                        "chromosome organization",
                        row,
                        USAGE_CHROMOSOME_ORGANIZATION,
                    ));
                }
                num_organizations += 1;
            }
        } else if header.contains("RECOMBINATION RATE") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                let good = scanner.eat("", DIGITS_E, Eol::NotExpected)
                    && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected);
                if !good {
                    return Err(bad_row(
                        "recombination rate",
                        row,
                        USAGE_RECOMBINATION_RATE,
                    ));
                }
                num_recombination_rates += 1;
            }
        } else if header.contains("GENE CONVERSION") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                let good = scanner.eat("", SIGNED_FLOAT_CHARS, Eol::NotExpected)
                    && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected);
                if !good {
                    return Err(bad_row("gene conversion", row, USAGE_GENE_CONVERSION));
                }
            }
        } else if header.contains("GENERATIONS") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                let mut good = scanner.eat("", DIGITS_E, Eol::Agnostic);
                if !scanner.at_end() {
                    good = good && scanner.eat("", DIGITS_E, Eol::Expected);
                }
                if !good {
                    return Err(bad_row("generations", row, USAGE_GENERATIONS));
                }
                num_generations += 1;
            }
        } else if header.contains("DEMOGRAPHY AND STRUCTURE") {
            for row in &section.rows {
                match check_demography_row(row) {
                    Some(is_subpop_creating) => {
                        if is_subpop_creating {
                            num_subpopulations += 1;
                        }
                    }
                    None => {
                        return Err(bad_row(
                            "demography and structure",
                            row,
                            USAGE_DEMOGRAPHY,
                        ))
                    }
                }
            }
        } else if header.contains("OUTPUT") {
            for row in &section.rows {
                if !check_output_row(row) {
                    return Err(bad_row("output", row, USAGE_OUTPUT));
                }
            }
        } else if header.contains("PREDETERMINED MUTATIONS") {
            for row in &section.rows {
                if !check_predetermined_row(row) {
                    return Err(bad_row(
                        "predetermined mutations",
                        row,
                        USAGE_PREDETERMINED,
                    ));
                }
            }
        } else if header.contains("SEED") {
            for row in &section.rows {
                let mut scanner = RowScanner::new(row);
                if !scanner.eat("", "1234567890-", Eol::Expected) {
                    return Err(bad_row("seed", row, USAGE_SEED));
                }
            }
        } else if header.contains("INITIALIZATION") {
            for row in &section.rows {
                if row.split_whitespace().count() != 1 {
                    return Err(bad_row("initialization", row, USAGE_INITIALIZATION));
                }
                num_subpopulations += 1;
            }
        } else {
            return Err(SimError::invalid_input(format!(
                "unknown parameter: {header}"
            )));
        }
    }

    if num_mutation_rates != 1 {
        return Err(SimError::invalid_input_with_usage(
            "exactly one #MUTATION RATE is required",
            USAGE_MUTATION_RATE,
        ));
    }
    if num_mutation_types < 1 {
        return Err(SimError::invalid_input_with_usage(
            "at least one mutation type is required",
            USAGE_MUTATION_TYPES,
        ));
    }
    if num_element_types < 1 {
        return Err(SimError::invalid_input_with_usage(
            "at least one genomic element type is required",
            USAGE_GENOMIC_ELEMENT_TYPES,
        ));
    }
    if num_organizations < 1 {
        return Err(SimError::invalid_input_with_usage(
            "at least one chromosome organization entry is required",
            USAGE_CHROMOSOME_ORGANIZATION,
        ));
    }
    if num_recombination_rates < 1 {
        return Err(SimError::invalid_input_with_usage(
            "at least one recombination rate interval is required",
            USAGE_RECOMBINATION_RATE,
        ));
    }
    if num_generations < 1 {
        return Err(SimError::invalid_input_with_usage(
            "a #GENERATIONS entry is required",
            USAGE_GENERATIONS,
        ));
    }
    if num_subpopulations < 1 {
        return Err(SimError::invalid_input(
            "no population to simulate (need a P event or #INITIALIZATION)",
        ));
    }
    Ok(())
}

fn check_mutation_type_row(row: &str) -> bool {
    let mut scanner = RowScanner::new(row);
    let mut good = scanner.eat("m", DIGITS, Eol::NotExpected)
        && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::NotExpected);

    let dfe_type = scanner.current().unwrap_or("");
    let one_param = matches!(dfe_type, "f" | "e");
    good = good && scanner.eat("", "fgenw", Eol::NotExpected);
    if one_param {
        good && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected)
    } else {
        good
            && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::NotExpected)
            && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected)
    }
}

fn check_element_type_row(row: &str) -> bool {
    let mut scanner = RowScanner::new(row);
    let mut good = scanner.eat("g", DIGITS, Eol::NotExpected);
    while good && !scanner.at_end() {
        good = good
            && scanner.eat("m", DIGITS, Eol::NotExpected)
            && scanner.eat("", "1234567890e.", Eol::Agnostic);
    }
    good
}

/// Returns `Some(creates_subpop)` on a valid row, `None` otherwise.
fn check_demography_row(row: &str) -> Option<bool> {
    let mut scanner = RowScanner::new(row);
    let mut good = scanner.eat("", DIGITS_E, Eol::NotExpected);

    let event_type = scanner.current().unwrap_or("");
    match event_type {
        "P" => {
            good = good
                && scanner.eat("", "PSMN", Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("", DIGITS_E, Eol::Agnostic);
            if !scanner.at_end() {
                good = good && scanner.eat("p", DIGITS, Eol::Expected);
            }
            good.then_some(true)
        }
        "N" => {
            good = good
                && scanner.eat("", "PSMN", Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("", DIGITS_E, Eol::Expected);
            good.then_some(false)
        }
        "M" => {
            good = good
                && scanner.eat("", "PSMN", Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected);
            good.then_some(false)
        }
        "S" => {
            good = good
                && scanner.eat("", "PSMN", Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected);
            good.then_some(false)
        }
        _ => None,
    }
}

fn check_output_row(row: &str) -> bool {
    let mut scanner = RowScanner::new(row);
    let mut good = scanner.eat("", DIGITS_E, Eol::NotExpected);

    let output_type = scanner.current().unwrap_or("");
    match output_type {
        "A" => {
            good = good && scanner.eat("", "ARFT", Eol::Agnostic);
            // an optional filename follows; filenames are not lexically
            // checked
            if !scanner.at_end() {
                scanner.index += 1;
            }
            good && scanner.at_end()
        }
        "R" => {
            good = good
                && scanner.eat("", "ARFT", Eol::NotExpected)
                && scanner.eat("p", DIGITS, Eol::NotExpected)
                && scanner.eat("", DIGITS, Eol::Agnostic);
            if let Some(flag) = scanner.current() {
                if flag != "MS" {
                    return false;
                }
                scanner.index += 1;
            }
            good && scanner.at_end()
        }
        "F" => good && scanner.eat("", "ARFT", Eol::Expected),
        "T" => {
            good && scanner.eat("", "ARFT", Eol::NotExpected) && scanner.eat("m", DIGITS, Eol::Expected)
        }
        _ => false,
    }
}

fn check_predetermined_row(row: &str) -> bool {
    let mut scanner = RowScanner::new(row);
    let mut good = scanner.eat("", DIGITS_E, Eol::NotExpected)
        && scanner.eat("m", DIGITS, Eol::NotExpected)
        && scanner.eat("", DIGITS_E, Eol::NotExpected)
        && scanner.eat("p", DIGITS, Eol::NotExpected)
        && scanner.eat("", DIGITS, Eol::NotExpected)
        && scanner.eat("", DIGITS, Eol::Agnostic);
    if !scanner.at_end() {
        good = good
            && scanner.eat("P", "", Eol::NotExpected)
            && scanner.eat("", SIGNED_FLOAT_CHARS, Eol::Expected);
    }
    good
}

/// Everything a parameter file configures, materialized.
#[derive(Debug, Default)]
pub struct InputConfig {
    pub mutation_rate: f64,
    pub mutation_types: Vec<MutationType>,
    /// (id, mutation type ids, fractions)
    pub element_types: Vec<(i64, Vec<i64>, Vec<f64>)>,
    /// (element type id, start, end), 0-based inclusive
    pub elements: Vec<(i64, i64, i64)>,
    /// (end position 0-based, rate) rows
    pub recombination: Vec<(i64, f64)>,
    pub gene_conversion: Option<(f64, f64)>,
    pub duration: i64,
    pub time_start: i64,
    pub events: Schedule<Event>,
    pub outputs: Schedule<OutputEvent>,
    pub introduced: Schedule<IntroducedMutation>,
    pub partial_sweeps: Vec<PartialSweep>,
    pub seed: Option<i64>,
    pub initialization_file: Option<PathBuf>,
    /// The input rows, echoed into full dumps.
    pub parameters: Vec<String>,
}

fn parse_float(token: &str) -> Result<f64, SimError> {
    token
        .parse::<f64>()
        .map_err(|_| SimError::invalid_input(format!("malformed number: {token}")))
}

/// Integers may be written in exponent form (`1e4`), as the original format
/// allows.
fn parse_int(token: &str, what: &'static str) -> Result<i64, SimError> {
    let value = parse_float(token)?;
    if !value.is_finite() || value.abs() >= 9.0e18 {
        return Err(SimError::Range {
            what,
            value: i64::MAX,
        });
    }
    Ok(value as i64)
}

fn parse_size(token: &str, what: &'static str) -> Result<usize, SimError> {
    let value = parse_int(token, what)?;
    usize::try_from(value).map_err(|_| SimError::Range { what, value })
}

fn parse_prefixed(token: &str, prefix: char, what: &'static str) -> Result<i64, SimError> {
    token
        .strip_prefix(prefix)
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or_else(|| SimError::invalid_input(format!("expected {prefix}<id> for {what}, got {token}")))
}

/// Pass 2: materialize a checked file.
pub fn parse_file(path: &Path) -> Result<InputConfig, SimError> {
    check_file(path)?;

    let sections = read_sections(path)?;
    let mut config = InputConfig {
        time_start: 1,
        ..Default::default()
    };

    for section in &sections {
        let header = section.header.as_str();
        // #SEED is appended to the echo after any override is applied
        if !header.contains("SEED") {
            config.parameters.push(header.to_string());
            config.parameters.extend(section.rows.iter().cloned());
        }

        if header.contains("MUTATION RATE") {
            for row in &section.rows {
                config.mutation_rate = parse_float(row)?;
            }
        } else if header.contains("MUTATION TYPES") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let id = parse_prefixed(tokens[0], 'm', "a mutation type")?;
                let dominance = parse_float(tokens[1])?;
                let mut params = Vec::new();
                for token in &tokens[3..] {
                    params.push(parse_float(token)?);
                }
                let dfe = Dfe::from_code(tokens[2], &params)?;
                config
                    .mutation_types
                    .push(MutationType::new(id, dominance, dfe));
            }
        } else if header.contains("GENOMIC ELEMENT TYPES") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let id = parse_prefixed(tokens[0], 'g', "a genomic element type")?;
                let mut type_ids = Vec::new();
                let mut fractions = Vec::new();
                for pair in tokens[1..].chunks(2) {
                    type_ids.push(parse_prefixed(pair[0], 'm', "a mutation type")?);
                    fractions.push(parse_float(pair[1])?);
                }
                config.element_types.push((id, type_ids, fractions));
            }
        } else if header.contains("CHROMOSOME ORGANIZATION") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let type_id = parse_prefixed(tokens[0], 'g', "a genomic element type")?;
                // positions are 1-based in the file
                let start = parse_int(tokens[1], "a chromosome position")? - 1;
                let end = parse_int(tokens[2], "a chromosome position")? - 1;
                config.elements.push((type_id, start, end));
            }
        } else if header.contains("RECOMBINATION RATE") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let end = parse_int(tokens[0], "a chromosome position")? - 1;
                let rate = parse_float(tokens[1])?;
                config.recombination.push((end, rate));
            }
        } else if header.contains("GENE CONVERSION") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                config.gene_conversion =
                    Some((parse_float(tokens[0])?, parse_float(tokens[1])?));
            }
        } else if header.contains("GENERATIONS") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                config.duration = parse_int(tokens[0], "a generation duration")?;
                if let Some(start) = tokens.get(1) {
                    config.time_start = parse_int(start, "a generation index")?;
                }
            }
        } else if header.contains("DEMOGRAPHY AND STRUCTURE") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let time = parse_int(tokens[0], "a generation index")?;
                let event = match tokens[1] {
                    "P" => Event::AddSubpopulation {
                        subpop: parse_prefixed(tokens[2], 'p', "a subpopulation")?,
                        size: parse_size(tokens[3], "a subpopulation size")?,
                        source: match tokens.get(4) {
                            Some(source) => {
                                Some(parse_prefixed(source, 'p', "a subpopulation")?)
                            }
                            None => None,
                        },
                    },
                    "N" => Event::SetSize {
                        subpop: parse_prefixed(tokens[2], 'p', "a subpopulation")?,
                        size: parse_size(tokens[3], "a subpopulation size")?,
                    },
                    "M" => Event::SetMigration {
                        target: parse_prefixed(tokens[2], 'p', "a subpopulation")?,
                        source: parse_prefixed(tokens[3], 'p', "a subpopulation")?,
                        rate: parse_float(tokens[4])?,
                    },
                    "S" => Event::SetSelfing {
                        subpop: parse_prefixed(tokens[2], 'p', "a subpopulation")?,
                        rate: parse_float(tokens[3])?,
                    },
                    other => {
                        return Err(SimError::invalid_input(format!(
                            "unknown event type {other}"
                        )))
                    }
                };
                config.events.insert(time, event);
            }
        } else if header.contains("OUTPUT") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let time = parse_int(tokens[0], "a generation index")?;
                let output = match tokens[1] {
                    "A" => OutputEvent::Full {
                        filename: tokens.get(2).map(|s| s.to_string()),
                    },
                    "R" => OutputEvent::Sample {
                        subpop: parse_prefixed(tokens[2], 'p', "a subpopulation")?,
                        size: parse_size(tokens[3], "a sample size")?,
                        ms_format: tokens.get(4) == Some(&"MS"),
                    },
                    "F" => OutputEvent::Fixed,
                    "T" => OutputEvent::TrackType {
                        mutation_type: parse_prefixed(tokens[2], 'm', "a mutation type")?,
                    },
                    other => {
                        return Err(SimError::invalid_input(format!(
                            "unknown output type {other}"
                        )))
                    }
                };
                config.outputs.insert(time, output);
            }
        } else if header.contains("PREDETERMINED MUTATIONS") {
            for row in &section.rows {
                let tokens: Vec<&str> = row.split_whitespace().collect();
                let generation = parse_int(tokens[0], "a generation index")?;
                let mutation_type = parse_prefixed(tokens[1], 'm', "a mutation type")?;
                let position = parse_int(tokens[2], "a chromosome position")? - 1;
                let subpop = parse_prefixed(tokens[3], 'p', "a subpopulation")?;
                let num_homozygotes = parse_size(tokens[4], "an introduction count")?;
                let num_heterozygotes = parse_size(tokens[5], "an introduction count")?;
                config.introduced.insert(
                    generation,
                    IntroducedMutation {
                        mutation_type,
                        position,
                        subpop,
                        generation,
                        num_homozygotes,
                        num_heterozygotes,
                    },
                );
                if tokens.get(6) == Some(&"P") {
                    config.partial_sweeps.push(PartialSweep {
                        mutation_type,
                        position,
                        target_prevalence: parse_float(tokens[7])?,
                    });
                }
            }
        } else if header.contains("SEED") {
            for row in &section.rows {
                config.seed = Some(
                    row.parse::<i64>()
                        .map_err(|_| SimError::invalid_input(format!("malformed seed: {row}")))?,
                );
            }
        } else if header.contains("INITIALIZATION") {
            for row in &section.rows {
                config.initialization_file = Some(PathBuf::from(row));
            }
        }
    }

    Ok(config)
}
