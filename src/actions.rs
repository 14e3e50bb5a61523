//! Config-declared actions - the commands the `utter` binary ships with
//!
//! Action strings, in the order they are checked:
//! 1. `stop` - end the session
//! 2. `tag:+name`, `tag:-name`, `tag:!name` - enable, disable or toggle a tag
//! 3. `echo:<template>` - write the rendered template to the output
//! 4. `log:<template>` - emit the rendered template as a log event
//!
//! Templates substitute `{capture}` with the bound token and `{rest}` with the
//! words following the command.

use async_trait::async_trait;
use flume::Sender;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::CommandRegistration;
use crate::state::SharedState;
use crate::storage::{Command, CommandContext};
use crate::token;

static TEMPLATE_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid template regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Enable,
    Disable,
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Stop,
    Tag { op: TagOp, name: String },
    Echo(String),
    Log(String),
}

/// Parse an action string from config. Unknown actions yield `None`.
pub fn parse_action(action: &str) -> Option<Action> {
    let action = action.trim();
    if action == "stop" {
        return Some(Action::Stop);
    }

    if let Some(rest) = action.strip_prefix("tag:") {
        let mut chars = rest.chars();
        let op = match chars.next()? {
            '+' => TagOp::Enable,
            '-' => TagOp::Disable,
            '!' => TagOp::Toggle,
            _ => return None,
        };
        let name = chars.as_str().trim();
        if name.is_empty() {
            return None;
        }
        return Some(Action::Tag { op, name: name.to_string() });
    }

    if let Some(template) = action.strip_prefix("echo:") {
        return Some(Action::Echo(template.to_string()));
    }

    if let Some(template) = action.strip_prefix("log:") {
        return Some(Action::Log(template.to_string()));
    }

    None
}

/// Substitute captures and `{rest}`; unknown slots are left as written
pub fn render(template: &str, ctx: &CommandContext) -> String {
    TEMPLATE_SLOT
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match ctx.parameter(name) {
                Some(value) => value.to_string(),
                None if name == "rest" => token::join(&ctx.remaining),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Runs one config action against the shared runtime state
pub struct ActionCommand {
    action: Action,
    state: SharedState,
    out: Sender<String>,
}

impl ActionCommand {
    pub fn new(action: Action, state: SharedState, out: Sender<String>) -> Self {
        Self { action, state, out }
    }

    fn emit(&self, line: String) -> anyhow::Result<()> {
        self.out
            .send(line)
            .map_err(|_| anyhow::anyhow!("output channel closed"))
    }
}

#[async_trait]
impl Command for ActionCommand {
    async fn execute(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        match &self.action {
            Action::Stop => {
                self.state.stop();
                self.emit("stopping".to_string())
            }
            Action::Tag { op, name } => {
                let name = render(name, ctx);
                anyhow::ensure!(
                    !name.is_empty() && !name.contains('{'),
                    "tag name `{}` did not resolve",
                    name
                );
                let on = match op {
                    TagOp::Enable => {
                        self.state.set_tag(&name, true);
                        true
                    }
                    TagOp::Disable => {
                        self.state.set_tag(&name, false);
                        false
                    }
                    TagOp::Toggle => self.state.toggle_tag(&name),
                };
                self.emit(format!("tag {} {}", name, if on { "on" } else { "off" }))
            }
            Action::Echo(template) => self.emit(render(template, ctx)),
            Action::Log(template) => {
                info!(command = %ctx.command.id, "{}", render(template, ctx));
                Ok(())
            }
        }
    }
}

/// Build registrations for every configured command with a valid action
pub fn registrations(
    config: &Config,
    state: &SharedState,
    out: &Sender<String>,
) -> Vec<CommandRegistration> {
    config
        .commands
        .iter()
        .filter_map(|command| {
            let Some(action) = parse_action(&command.action) else {
                warn!(command = %command.id, action = %command.action, "unknown action, skipping");
                return None;
            };
            let state = Arc::clone(state);
            let out = out.clone();
            Some(CommandRegistration::new(
                command.to_pattern(),
                Arc::new(move || {
                    let action = action.clone();
                    Box::new(ActionCommand::new(action, Arc::clone(&state), out.clone()))
                        as Box<dyn Command>
                }),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandConfig;
    use crate::matcher::{CommandId, ParsedCommand};
    use crate::state::RuntimeState;
    use crate::tag::ActiveTags;
    use crate::token::Token;
    use std::collections::BTreeMap;

    fn ctx(id: &str, params: &[(&str, Token)], rest: &str) -> CommandContext {
        let parameters: BTreeMap<String, Token> =
            params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        CommandContext::new(ParsedCommand {
            id: CommandId::new(id),
            parameters,
        })
        .with_remaining(rest.split_whitespace().map(Token::word).collect())
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action("stop"), Some(Action::Stop));
        assert_eq!(
            parse_action("tag:+ide"),
            Some(Action::Tag { op: TagOp::Enable, name: "ide".into() })
        );
        assert_eq!(
            parse_action("tag:!{mode}"),
            Some(Action::Tag { op: TagOp::Toggle, name: "{mode}".into() })
        );
        assert_eq!(parse_action("echo:hi {rest}"), Some(Action::Echo("hi {rest}".into())));
        assert_eq!(parse_action("log:x"), Some(Action::Log("x".into())));
        assert_eq!(parse_action("tag:+"), None);
        assert_eq!(parse_action("tag:ide"), None);
        assert_eq!(parse_action("launch rockets"), None);
    }

    #[test]
    fn test_render_template() {
        let ctx = ctx("vol", &[("amount", Token::Number(40))], "and mute");
        assert_eq!(render("volume {amount}", &ctx), "volume 40");
        assert_eq!(render("then {rest}", &ctx), "then and mute");
        assert_eq!(render("{missing} stays", &ctx), "{missing} stays");
    }

    #[tokio::test]
    async fn test_tag_action_uses_capture() {
        let state = RuntimeState::with_tags(ActiveTags::new());
        let (tx, rx) = flume::unbounded();
        let mut cmd = ActionCommand::new(parse_action("tag:+{tag}").unwrap(), state.clone(), tx);

        cmd.execute(&ctx("enable", &[("tag", Token::word("ide"))], "")).await.unwrap();
        assert_eq!(state.tag_names(), vec!["ide"]);
        assert_eq!(rx.recv().unwrap(), "tag ide on");

        let err = cmd.execute(&ctx("enable", &[], "")).await.unwrap_err();
        assert!(err.to_string().contains("did not resolve"));
    }

    #[tokio::test]
    async fn test_stop_action() {
        let state = RuntimeState::with_tags(ActiveTags::new());
        let (tx, rx) = flume::unbounded();
        let mut cmd = ActionCommand::new(Action::Stop, state.clone(), tx);
        cmd.execute(&ctx("stop", &[], "")).await.unwrap();
        assert!(!state.is_running());
        assert_eq!(rx.recv().unwrap(), "stopping");
    }

    #[test]
    fn test_registrations_skip_unknown_actions() {
        let config = Config {
            commands: vec![
                CommandConfig::new("ok", "say hi", "echo:hi"),
                CommandConfig::new("bad", "fire", "launch"),
            ],
            ..Config::default()
        };
        let state = RuntimeState::new(&config);
        let (tx, _rx) = flume::unbounded();
        let regs = registrations(&config, &state, &tx);
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].pattern.id.as_str(), "ok");
    }
}
