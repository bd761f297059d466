//! Sources of operator decisions about unresolved labels.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::Result;
use lazy_regex::regex_captures;

use crate::report::Report;
use crate::rules::{Domain, NewRule, Scope, validate_pattern};

const NO_JUSTIFICATION: &str = "<no justification>";

/// An unresolved label submitted to the operator.
#[derive(Clone, Debug)]
pub struct Question<'a> {
    pub domain: Domain,
    pub report: &'a Report,
    /// The label as observed in the table.
    pub observed: &'a str,
    /// Numbered default answers.
    pub options: Vec<String>,
}

/// What to do with an unresolved label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Stop asking, for this report and the rest of the batch.
    Quit,
    /// Leave this label unresolved.
    Decline,
    /// Record a rule and apply it.
    Rule(NewRule),
}

/// Blocking source of decisions.
pub trait DecisionProvider {
    fn decide(&mut self, question: &Question) -> Result<Decision>;
}

/// Declines every question, for runs without an operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecliningDecisions;

impl DecisionProvider for DecliningDecisions {
    fn decide(&mut self, _question: &Question) -> Result<Decision> {
        Ok(Decision::Decline)
    }
}

/// Replays canned decisions in order, declining once they run out.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDecisions {
    decisions: VecDeque<Decision>,
    /// Observed labels of the questions asked so far.
    pub asked: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn decide(&mut self, question: &Question) -> Result<Decision> {
        self.asked.push(question.observed.to_string());
        Ok(self.decisions.pop_front().unwrap_or(Decision::Decline))
    }
}

/// Parsed operator input line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Answer {
    Quit,
    /// Start the regex rule sub-prompt.
    Regex,
    Rule {
        sink: String,
        scope: Scope,
        justification: String,
    },
    Invalid,
}

/// Parses `q`, `r` or `<choice><scope><justification>`, where the choice is
/// either the number of an option or a free text sink.
pub fn parse_answer(line: &str, options: &[String]) -> Answer {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Answer::Quit;
    }
    if line.eq_ignore_ascii_case("r") {
        return Answer::Regex;
    }
    let Some((_, choice, marker, justification)) = regex_captures!(r"^(.*?)([!#\.])(.*)$", line)
    else {
        return Answer::Invalid;
    };
    let choice = choice.trim();
    let sink = if !choice.is_empty() && choice.chars().all(|c| c.is_ascii_digit()) {
        match choice.parse::<usize>().ok().and_then(|n| options.get(n)) {
            Some(option) => option.clone(),
            None => return Answer::Invalid,
        }
    } else if choice.is_empty() {
        return Answer::Invalid;
    } else {
        choice.to_string()
    };
    let Some(scope) = marker.chars().next().and_then(Scope::from_marker) else {
        return Answer::Invalid;
    };
    let justification = match justification.trim() {
        "" => NO_JUSTIFICATION.to_string(),
        j => j.to_string(),
    };
    Answer::Rule {
        sink,
        scope,
        justification,
    }
}

/// Outcome of the regex rule sub-prompt.
enum RegexPrompt {
    EndOfInput,
    Retry,
    Rule(NewRule),
}

/// Asks the operator through a line based text protocol.
pub struct TerminalDecisions<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalDecisions<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Reads one line, `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        writeln!(self.output, "{prompt}")?;
        self.output.flush()?;
        self.read_line()
    }

    fn write_question(&mut self, question: &Question) -> Result<()> {
        let what = match question.domain {
            Domain::Column => "column name",
            Domain::Jurisdiction => "jurisdiction name",
        };
        writeln!(self.output)?;
        writeln!(self.output, "Unknown {what}: {:?}", question.observed)?;
        writeln!(self.output, "Report: {}", question.report.id())?;
        writeln!(self.output, "Options:")?;
        for (n, option) in question.options.iter().enumerate() {
            writeln!(self.output, "  {n} -> {option}")?;
        }
        writeln!(
            self.output,
            "Answer with an option number or a new name, followed by the scope of the rule:"
        )?;
        writeln!(
            self.output,
            "  \"!\" every report, \"#\" every period of this entity, \".\" this report only."
        )?;
        writeln!(
            self.output,
            "Optionally write a justification after the scope. \"r\" for a regex rule, \"q\" to stop asking."
        )?;
        Ok(())
    }

    /// Collects pattern, sink, scope and justification of a regex rule.
    fn ask_regex_rule(&mut self, question: &Question) -> Result<RegexPrompt> {
        let Some(pattern) = self.ask("Regex matching the whole label:")? else {
            return Ok(RegexPrompt::EndOfInput);
        };
        if let Err(err) = validate_pattern(&pattern) {
            writeln!(self.output, "{err}")?;
            return Ok(RegexPrompt::Retry);
        }
        let Some(sink) = self.ask("Sink (option number or new name):")? else {
            return Ok(RegexPrompt::EndOfInput);
        };
        let sink = match sink.trim().parse::<usize>() {
            Ok(n) => match question.options.get(n) {
                Some(option) => option.clone(),
                None => return Ok(RegexPrompt::Retry),
            },
            Err(_) => sink.trim().to_string(),
        };
        let Some(marker) = self.ask("Scope (\"!\", \"#\" or \".\"):")? else {
            return Ok(RegexPrompt::EndOfInput);
        };
        let Some(scope) = marker.trim().chars().next().and_then(Scope::from_marker) else {
            return Ok(RegexPrompt::Retry);
        };
        let Some(justification) = self.ask("Justification:")? else {
            return Ok(RegexPrompt::EndOfInput);
        };
        let justification = match justification.trim() {
            "" => NO_JUSTIFICATION.to_string(),
            j => j.to_string(),
        };
        Ok(RegexPrompt::Rule(NewRule::regex(
            &pattern,
            sink,
            scope,
            justification,
        )))
    }
}

impl<R: BufRead, W: Write> DecisionProvider for TerminalDecisions<R, W> {
    fn decide(&mut self, question: &Question) -> Result<Decision> {
        loop {
            self.write_question(question)?;
            let Some(line) = self.read_line()? else {
                return Ok(Decision::Quit);
            };
            let rule = match parse_answer(&line, &question.options) {
                Answer::Quit => return Ok(Decision::Quit),
                Answer::Invalid => continue,
                Answer::Regex => match self.ask_regex_rule(question)? {
                    RegexPrompt::EndOfInput => return Ok(Decision::Quit),
                    RegexPrompt::Retry => continue,
                    RegexPrompt::Rule(rule) => rule,
                },
                Answer::Rule {
                    sink,
                    scope,
                    justification,
                } => NewRule::strict(question.observed, sink, scope, justification),
            };

            let confirmation = self.ask(&format!(
                "Assign {:?} to {:?} at scope {}? Justification: {:?}. (y/n)",
                rule.source,
                rule.sink,
                rule.scope.marker(),
                rule.justification
            ))?;
            match confirmation.as_deref().map(str::trim) {
                None => return Ok(Decision::Quit),
                Some("y" | "Y") => return Ok(Decision::Rule(rule)),
                Some(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use googletest::prelude::*;
    use test_casing::test_casing;

    use super::*;

    fn options() -> Vec<String> {
        vec!["to_drop".to_string(), "Revenus".to_string(), "total_revenues".to_string()]
    }

    const RULE_CASES: [(&str, &str, Scope, &str); 4] = [
        ("2!", "total_revenues", Scope::Global, NO_JUSTIFICATION),
        ("0#duplicate column", "to_drop", Scope::Entity, "duplicate column"),
        ("sales. French for revenues", "sales", Scope::Period, "French for revenues"),
        (" 1 . ", "Revenus", Scope::Period, NO_JUSTIFICATION),
    ];

    #[test_casing(4, RULE_CASES)]
    fn parses_rule_answers(line: &str, sink: &str, scope: Scope, justification: &str) {
        assert_eq!(
            parse_answer(line, &options()),
            Answer::Rule {
                sink: sink.to_string(),
                scope,
                justification: justification.to_string(),
            }
        );
    }

    #[gtest]
    fn parses_control_answers() {
        expect_eq!(parse_answer("q", &options()), Answer::Quit);
        expect_eq!(parse_answer("R", &options()), Answer::Regex);
        expect_eq!(parse_answer("3!", &options()), Answer::Invalid);
        expect_eq!(parse_answer("total_revenues", &options()), Answer::Invalid);
        expect_eq!(parse_answer("!", &options()), Answer::Invalid);
    }

    fn question(report: &Report) -> Question<'_> {
        Question {
            domain: Domain::Column,
            report,
            observed: "Revenus",
            options: options(),
        }
    }

    fn run_terminal(input: &str) -> Result<(Decision, String)> {
        let report = Report::for_test("acme", "2020");
        let mut output = Vec::new();
        let decision = {
            let mut terminal = TerminalDecisions::new(input.as_bytes(), &mut output);
            terminal.decide(&question(&report))?
        };
        Ok((decision, String::from_utf8(output)?))
    }

    #[gtest]
    fn terminal_confirms_rule() -> Result<()> {
        let (decision, output) = run_terminal("9!\n2# always\ny\n")?;

        expect_eq!(
            decision,
            Decision::Rule(NewRule::strict(
                "Revenus",
                "total_revenues",
                Scope::Entity,
                "always"
            ))
        );
        expect_that!(output, contains_substring("Unknown column name: \"Revenus\""));
        expect_that!(output, contains_substring("2 -> total_revenues"));
        Ok(())
    }

    #[gtest]
    fn terminal_asks_again_when_not_confirmed() -> Result<()> {
        let (decision, _) = run_terminal("2!\nn\n0.\nY\n")?;

        expect_eq!(
            decision,
            Decision::Rule(NewRule::strict("Revenus", "to_drop", Scope::Period, NO_JUSTIFICATION))
        );
        Ok(())
    }

    #[gtest]
    fn terminal_collects_regex_rule() -> Result<()> {
        let (decision, _) = run_terminal("r\nrevenu.*\n2\n!\nFrench\ny\n")?;

        expect_eq!(
            decision,
            Decision::Rule(NewRule::regex("revenu.*", "total_revenues", Scope::Global, "French"))
        );
        Ok(())
    }

    #[gtest]
    fn terminal_rejects_invalid_regex() -> Result<()> {
        let (decision, output) = run_terminal("r\n(revenu\nq\n")?;

        expect_eq!(decision, Decision::Quit);
        expect_that!(output, contains_substring("invalid regex rule pattern"));
        Ok(())
    }

    #[gtest]
    fn end_of_input_quits() -> Result<()> {
        let (decision, _) = run_terminal("")?;

        expect_eq!(decision, Decision::Quit);
        Ok(())
    }

    #[gtest]
    fn scripted_decisions_run_out_into_declines() -> Result<()> {
        let report = Report::for_test("acme", "2020");
        let mut scripted = ScriptedDecisions::new([Decision::Quit]);

        expect_eq!(scripted.decide(&question(&report))?, Decision::Quit);
        expect_eq!(scripted.decide(&question(&report))?, Decision::Decline);
        expect_that!(scripted.asked, elements_are![eq("Revenus"), eq("Revenus")]);
        Ok(())
    }
}
