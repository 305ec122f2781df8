//! Decodes and validates browse requests into executable queries.

use std::time::Duration;

use serde::Deserialize;

use crate::catalog::RawAction;
use crate::ids;

use super::binder::{self, DriverCommand};
use super::error::ParseError;
use super::{DEFAULT_TIMEOUT, MAX_RENDER_DELAY, MAX_TIMEOUT};

#[derive(Debug, Default, Deserialize)]
struct BrowseRequest {
    #[serde(default)]
    sessionid: String,
    #[serde(default)]
    timeout: Option<String>,
    #[serde(default)]
    global_render_delay: Option<String>,
    #[serde(default)]
    forward_user_agent: bool,
    #[serde(default)]
    reuse_tab: bool,
    #[serde(default)]
    reuse_window: bool,
    #[serde(default, rename = "query")]
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBlock {
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    repeat: Option<i64>,
    #[serde(default, rename = "while")]
    guard: Option<RawAction>,
}

/// A fully parsed and bound browse request.
#[derive(Debug)]
pub struct Query {
    pub session_id: String,
    pub render_delay: Duration,
    pub timeout: Duration,
    pub reuse_window: bool,
    pub reuse_tab: bool,
    /// Set when the first action was `load_tab`; the action itself is
    /// consumed during parsing.
    pub old_tab_id: Option<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug)]
pub struct Block {
    pub commands: Vec<DriverCommand>,
    pub repeat: u32,
    pub guard: Guard,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Guard {
    Always,
    ElementExists(String),
}

impl Query {
    pub fn parse(body: &[u8]) -> Result<Query, ParseError> {
        let request: BrowseRequest = serde_json::from_slice(body)?;
        Query::from_request(request)
    }

    fn from_request(request: BrowseRequest) -> Result<Query, ParseError> {
        if request.forward_user_agent {
            return Err(ParseError::UserAgentForwarding);
        }

        let render_delay = parse_render_delay(request.global_render_delay.as_deref())?;
        let timeout = parse_timeout(request.timeout.as_deref())?;

        let mut raw_blocks = request.blocks;
        if raw_blocks.is_empty() {
            return Err(ParseError::NoBlocks);
        }

        let mut session_id = request.sessionid;
        let mut old_tab_id = None;
        let first_action = raw_blocks[0]
            .actions
            .first()
            .map(|action| action.name().to_string());
        match first_action.as_deref() {
            Some("load_tab") => {
                let action = raw_blocks[0].actions.remove(0);
                let wrap = |source| ParseError::Action {
                    block: 0,
                    index: 0,
                    source,
                };
                action.check_non_empty().map_err(wrap)?;
                action.must_arg_count(&[1]).map_err(wrap)?;
                let tab = action.arg(1).to_string();
                let (prefix, _) = ids::parse_tab_id(&tab)
                    .ok_or_else(|| ParseError::InvalidTabId(tab.clone()))?;
                if session_id.is_empty() {
                    session_id = prefix.to_string();
                } else if session_id != prefix {
                    return Err(ParseError::ForeignTab {
                        tab,
                        session: session_id,
                    });
                }
                old_tab_id = Some(tab);
            }
            Some("navigate") => {
                if raw_blocks[0].actions.len() < 2 {
                    return Err(ParseError::NavigateAlone);
                }
            }
            _ => return Err(ParseError::InvalidFirstAction),
        }

        let has_listen = raw_blocks
            .iter()
            .any(|block| block.actions.iter().any(|action| action.name() == "listen"));

        // the consumed load_tab shifts the first block's wire indices by one
        let first_block_offset = usize::from(old_tab_id.is_some());

        let mut blocks = Vec::with_capacity(raw_blocks.len());
        for (pos, raw) in raw_blocks.into_iter().enumerate() {
            if raw.actions.is_empty() && pos > 0 {
                return Err(ParseError::EmptyBlock { block: pos });
            }

            let mut commands = Vec::new();
            if pos == 0 && has_listen {
                commands.push(DriverCommand::EnableNetwork);
                commands.push(DriverCommand::EnableLifecycleEvents);
            }

            let offset = if pos == 0 { first_block_offset } else { 0 };
            for (index, action) in raw.actions.iter().enumerate() {
                let command =
                    binder::bind(action, render_delay).map_err(|source| ParseError::Action {
                        block: pos,
                        index: index + offset,
                        source,
                    })?;
                commands.push(command);
            }

            let repeat = match raw.repeat {
                None => 1,
                Some(n) if n < 0 => return Err(ParseError::NegativeRepeat { block: pos }),
                Some(n) => n as u32,
            };

            let guard = match &raw.guard {
                None => Guard::Always,
                Some(action) => binder::bind_guard(action)
                    .map_err(|source| ParseError::Guard { block: pos, source })?,
            };

            blocks.push(Block {
                commands,
                repeat,
                guard,
            });
        }

        Ok(Query {
            session_id,
            render_delay,
            timeout,
            reuse_window: request.reuse_window,
            reuse_tab: request.reuse_tab,
            old_tab_id,
            blocks,
        })
    }
}

fn parse_render_delay(raw: Option<&str>) -> Result<Duration, ParseError> {
    let raw = raw
        .filter(|value| !value.is_empty())
        .ok_or(ParseError::MissingRenderDelay)?;
    let delay = humantime::parse_duration(raw).map_err(ParseError::InvalidRenderDelay)?;
    Ok(delay.min(MAX_RENDER_DELAY))
}

fn parse_timeout(raw: Option<&str>) -> Result<Duration, ParseError> {
    match raw.filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_TIMEOUT),
        Some(raw) => {
            let timeout = humantime::parse_duration(raw).map_err(ParseError::InvalidTimeout)?;
            Ok(timeout.min(MAX_TIMEOUT))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Query, ParseError> {
        Query::parse(body.as_bytes())
    }

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{"global_render_delay":"1s"{extra},
                "query":[{{"actions":[["navigate","https://example.test/"],["outer_html"]]}}]}}"#
        )
    }

    #[test]
    fn parses_a_minimal_navigate_query() {
        let query = parse(&minimal("")).unwrap();
        assert_eq!(query.render_delay, Duration::from_secs(1));
        assert_eq!(query.timeout, DEFAULT_TIMEOUT);
        assert!(query.old_tab_id.is_none());
        assert_eq!(query.blocks.len(), 1);
        assert_eq!(
            query.blocks[0].commands,
            vec![
                DriverCommand::Navigate("https://example.test/".into()),
                DriverCommand::OuterHtml,
            ]
        );
        assert_eq!(query.blocks[0].repeat, 1);
        assert_eq!(query.blocks[0].guard, Guard::Always);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let query = parse(&minimal(r#","unknown_field":42"#)).unwrap();
        assert_eq!(query.blocks.len(), 1);
    }

    #[test]
    fn forward_user_agent_must_be_false() {
        let err = parse(&minimal(r#","forward_user_agent":true"#)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "value \"true\" is not supported for init.forward_user_agent"
        );
    }

    #[test]
    fn render_delay_is_required_and_clamped() {
        let err = parse(r#"{"query":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "global_render_delay is empty or missing");

        let err = parse(r#"{"global_render_delay":"","query":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "global_render_delay is empty or missing");

        let err = parse(r#"{"global_render_delay":"soon","query":[]}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid global_render_delay:"));

        let body = r#"{"global_render_delay":"45s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]]}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(query.render_delay, MAX_RENDER_DELAY);
    }

    #[test]
    fn timeout_defaults_and_clamps() {
        let query = parse(&minimal(r#","timeout":"30s""#)).unwrap();
        assert_eq!(query.timeout, Duration::from_secs(30));

        let query = parse(&minimal(r#","timeout":"10m""#)).unwrap();
        assert_eq!(query.timeout, MAX_TIMEOUT);

        let err = parse(&minimal(r#","timeout":"whenever""#)).unwrap_err();
        assert!(err.to_string().starts_with("invalid timeout:"));
    }

    #[test]
    fn query_must_contain_blocks() {
        let err = parse(r#"{"global_render_delay":"1s","query":[]}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0] must contain at least one action block"
        );
    }

    #[test]
    fn first_action_must_open_a_tab() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["click",".foo"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[0] must begin with either \"load_tab\" or \"navigate\""
        );

        let body = r#"{"global_render_delay":"1s","query":[{"actions":[]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[0] must begin with either \"load_tab\" or \"navigate\""
        );
    }

    #[test]
    fn navigate_needs_a_second_action() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[0] must contain at least two actions"
        );
    }

    #[test]
    fn load_tab_is_consumed_and_adopts_the_window_prefix() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["load_tab","0123abcd_deadbeef"],["outer_html"]]}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(query.old_tab_id.as_deref(), Some("0123abcd_deadbeef"));
        assert_eq!(query.session_id, "0123abcd");
        assert_eq!(query.blocks[0].commands, vec![DriverCommand::OuterHtml]);
    }

    #[test]
    fn load_tab_must_match_the_requested_session() {
        let body = r#"{"global_render_delay":"1s","sessionid":"0123abcd",
            "query":[{"actions":[["load_tab","0123abcd_deadbeef"]]}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(query.session_id, "0123abcd");
        assert!(query.blocks[0].commands.is_empty());

        let body = r#"{"global_render_delay":"1s","sessionid":"ffffffff",
            "query":[{"actions":[["load_tab","0123abcd_deadbeef"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tab 0123abcd_deadbeef is not part of window session ffffffff"
        );
    }

    #[test]
    fn load_tab_ids_must_match_the_pattern() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["load_tab","short_id"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(err.to_string(), "illegal tab ID format \"short_id\"");
    }

    #[test]
    fn action_errors_carry_the_wire_position() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["teleport","x"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[1]: unknown action name \"teleport\""
        );

        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]]},
                     {"actions":[["click",""]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[1].actions[0]: [1] must contain a non-empty argument"
        );
    }

    #[test]
    fn load_tab_consumption_keeps_wire_indices_in_errors() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["load_tab","0123abcd_deadbeef"],["teleport"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[1]: unknown action name \"teleport\""
        );
    }

    #[test]
    fn eval_is_rejected() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["eval","1+1"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(err.to_string(), "query[0].actions[1]: eval not implemented");
    }

    #[test]
    fn listen_prepends_setup_to_the_first_block() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]]},
                     {"actions":[["listen","load"]]}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(
            query.blocks[0].commands[..2].to_vec(),
            vec![
                DriverCommand::EnableNetwork,
                DriverCommand::EnableLifecycleEvents,
            ]
        );
        assert_eq!(
            query.blocks[1].commands,
            vec![DriverCommand::Listen(vec!["load".into()])]
        );
    }

    #[test]
    fn listen_validates_event_names() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["listen","warp"]]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].actions[1]: listen: arg 0 contains unknown event \"warp\""
        );
    }

    #[test]
    fn repeat_validates_and_defaults() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]],"repeat":3}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(query.blocks[0].repeat, 3);

        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]],"repeat":0}]}"#;
        assert_eq!(parse(body).unwrap().blocks[0].repeat, 0);

        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]],"repeat":-1}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].repeat: must be a non-negative integer"
        );
    }

    #[test]
    fn while_guards_validate() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]],
                      "while":["element_exists",".next"]}]}"#;
        let query = parse(body).unwrap();
        assert_eq!(query.blocks[0].guard, Guard::ElementExists(".next".into()));

        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]],
                      "while":["click",".next"]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query[0].while: \"click\" is not a guard action"
        );
    }

    #[test]
    fn later_blocks_may_not_be_empty() {
        let body = r#"{"global_render_delay":"1s",
            "query":[{"actions":[["navigate","https://x.test/"],["outer_html"]]},
                     {"actions":[]}]}"#;
        let err = parse(body).unwrap_err();
        assert_eq!(err.to_string(), "query[1].actions can't be empty");
    }

    #[test]
    fn parsing_is_insensitive_to_key_order() {
        let a = parse(
            r#"{"global_render_delay":"2s","timeout":"40s","reuse_window":true,
                "query":[{"actions":[["navigate","https://x.test/"],["sleep"],["outer_html"]],"repeat":2}]}"#,
        )
        .unwrap();
        let b = parse(
            r#"{"query":[{"repeat":2,"actions":[["navigate","https://x.test/"],["sleep"],["outer_html"]]}],
                "reuse_window":true,"timeout":"40s","global_render_delay":"2s"}"#,
        )
        .unwrap();
        assert_eq!(a.blocks.len(), b.blocks.len());
        assert_eq!(a.blocks[0].commands, b.blocks[0].commands);
        assert_eq!(a.blocks[0].repeat, b.blocks[0].repeat);
        assert_eq!(a.timeout, b.timeout);
        assert_eq!(a.render_delay, b.render_delay);
        assert_eq!(a.reuse_window, b.reuse_window);
    }
}
