use std::borrow::Cow;
use std::collections::HashSet;
use std::marker::PhantomData;

use anstyle::Style;
use clap::{Command, CommandFactory};
use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    hint::Hinter,
    validate::{ValidationContext, ValidationResult, Validator},
    Context,
};
use rustyline_derive::Helper;

/// Rustyline helper, that handles interactive completion, highlighting and hinting.
#[derive(Helper, Debug)]
pub(crate) struct RunHelper<T: CommandFactory> {
    app: PhantomData<T>,

    /// Label names, suggested where a code location is expected
    labels: Vec<String>,
}

impl<T: CommandFactory> RunHelper<T> {
    pub fn new(labels: Vec<String>) -> Self {
        RunHelper {
            app: PhantomData,
            labels,
        }
    }

    /// Split the line up to the cursor in words, with an empty last word if
    /// the cursor is after a space
    fn words(line: &str, pos: usize) -> Option<Vec<String>> {
        let line = line.get(..pos)?;
        let complete = line.ends_with([' ', '\t']);
        let mut words = shell_words::split(line).ok()?;

        if complete {
            words.push(String::new());
        }

        Some(words)
    }

    fn suggest(&self, command: &Command, input: &[String]) -> (usize, HashSet<String>) {
        let mut suggestions: HashSet<_> = command
            .get_subcommands()
            .flat_map(|cmd| {
                std::iter::once(cmd.get_name().to_string())
                    .chain(cmd.get_visible_aliases().map(ToString::to_string))
            })
            .collect();

        // If the app has subcommands, it has a `help` command
        if command.has_subcommands() {
            suggestions.insert("help".to_string());
        }

        let index = input.len().saturating_sub(1);
        if let Some(arg) = command.get_positionals().nth(index) {
            if arg.get_id().as_str() == "location" {
                suggestions.extend(self.labels.iter().cloned());
            }
        }

        match input {
            [last] => (
                last.len(),
                suggestions
                    .into_iter()
                    .filter(|candidate| candidate.starts_with(last.as_str()))
                    .collect(),
            ),

            [head, tail @ ..] => command
                .find_subcommand(head)
                .map(|sub: &Command| self.suggest(sub, tail))
                .unwrap_or_default(),

            [] => (0, suggestions),
        }
    }
}

impl<T: CommandFactory> Completer for RunHelper<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let Some(words) = Self::words(line, pos) else {
            return Ok((0, Vec::new()));
        };

        let app = T::command();
        let (offset, candidates) = self.suggest(&app, words.as_slice());
        let mut candidates: Vec<_> = candidates.into_iter().collect();
        candidates.sort_unstable();

        Ok((pos - offset, candidates))
    }
}

impl<T: CommandFactory> Highlighter for RunHelper<T> {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        let style = Style::new().dimmed();
        Cow::Owned(format!("{}{hint}{}", style.render(), style.render_reset()))
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        let style = Style::new().bold();
        Cow::Owned(format!("{}{prompt}{}", style.render(), style.render_reset()))
    }
}

impl<T: CommandFactory> Hinter for RunHelper<T> {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let words = Self::words(line, pos)?;
        let app = T::command();
        let (offset, candidates) = self.suggest(&app, words.as_slice());

        match Vec::from_iter(candidates).as_slice() {
            [candidate] => candidate.get(offset..).map(ToString::to_string),
            _ => None,
        }
    }
}

impl<T: CommandFactory> Validator for RunHelper<T> {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if shell_words::split(ctx.input()).is_err() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}
