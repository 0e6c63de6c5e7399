//! Scripted command runner (testing only)
//!
//! `ScriptedRunner` answers requests from canned responses keyed by argument
//! prefix and records every request it receives, so tests can assert on the
//! exact git command lines a facade operation issued.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::VcsResult;
use crate::exec::{CommandOutput, CommandRequest, CommandRunner};

#[derive(Debug)]
struct Rule {
    args_prefix: Vec<String>,
    responses: VecDeque<CommandOutput>,
}

impl Rule {
    fn matches(&self, args: &[String]) -> bool {
        args.len() >= self.args_prefix.len()
            && self.args_prefix.iter().zip(args).all(|(want, got)| want == got)
    }

    /// Pop the next queued response; the last one repeats forever.
    fn next_response(&mut self) -> CommandOutput {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_default()
        } else {
            self.responses.front().cloned().unwrap_or_default()
        }
    }
}

/// In-memory `CommandRunner` with scripted responses.
///
/// Requests that match no rule succeed with empty output. When several rules
/// match, the one with the longest argument prefix wins.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` for requests whose arguments start with `args_prefix`.
    pub fn on<I, S>(&self, args_prefix: I, output: CommandOutput) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args_prefix: Vec<String> = args_prefix.into_iter().map(Into::into).collect();
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.args_prefix == args_prefix) {
            Some(rule) => rule.responses.push_back(output),
            None => rules.push(Rule {
                args_prefix,
                responses: VecDeque::from([output]),
            }),
        }
        self
    }

    /// Queue a successful response with the given stdout.
    pub fn succeed<I, S>(&self, args_prefix: I, stdout: &str) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on(
            args_prefix,
            CommandOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        )
    }

    /// Queue a failing response.
    pub fn fail<I, S>(&self, args_prefix: I, exit_code: i32, stderr: &str) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on(
            args_prefix,
            CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Argument lists of received requests whose first argument is `subcommand`.
    pub fn invocations(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some(subcommand))
            .map(|c| c.args.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &CommandRequest) -> VcsResult<CommandOutput> {
        self.calls.lock().unwrap().push(request.clone());

        let output = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .filter(|r| r.matches(&request.args))
                .max_by_key(|r| r.args_prefix.len())
                .map(Rule::next_response)
                .unwrap_or_default()
        };

        if request.reject {
            request.check(output)
        } else {
            Ok(output)
        }
    }
}
