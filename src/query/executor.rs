//! Drives a parsed query against a browser tab.

use std::sync::Arc;

use tracing::{info, warn};

use cdp_driver::{PageTab, Tab};

use crate::ids;
use crate::result::BrowseResult;
use crate::sessions::SessionManager;

use super::binder::DriverCommand;
use super::error::ExecError;
use super::parser::{Block, Guard, Query};

/// Acquires a tab, runs the query's blocks and releases the tab by saving or
/// closing it. The first failing guard or action aborts the whole query.
pub async fn execute(query: Query, sessions: &SessionManager) -> Result<BrowseResult, ExecError> {
    let mut result = BrowseResult::sized(query.blocks.len());

    let (session_id, tab) = match &query.old_tab_id {
        None => {
            let window = sessions
                .window_query(&query.session_id, query.timeout)
                .await?;
            let page = window.browser.new_tab().await?;
            let tab = Tab::new(
                ids::tab_id(&window.id, &ids::new_session_id()),
                Arc::new(PageTab::new(page)),
                window.browser.cancel_token().child_token(),
                query.timeout,
            );
            (window.id, tab)
        }
        Some(old_tab_id) => {
            let tab = sessions
                .load_tab(old_tab_id)
                .await
                .ok_or_else(|| ExecError::TabNotFound(old_tab_id.clone()))?;
            (query.session_id.clone(), tab)
        }
    };

    if query.reuse_window {
        result.window_id = Some(session_id.clone());
    }
    if query.reuse_tab {
        result.tab_id = Some(tab.id().to_string());
    }

    let run = run_blocks(&query.blocks, &tab, &session_id, &mut result).await;

    if query.reuse_tab {
        sessions.save_tab(tab).await;
    } else if let Err(err) = tab.close().await {
        warn!(target: "executor", session = %session_id, %err, "failed to close tab");
    }

    run.map(|_| result)
}

async fn run_blocks(
    blocks: &[Block],
    tab: &Tab,
    session_id: &str,
    result: &mut BrowseResult,
) -> Result<(), ExecError> {
    let total = blocks.len();
    for (pos, block) in blocks.iter().enumerate() {
        info!(target: "executor", session = %session_id, "query {}/{}", pos + 1, total);
        for _ in 0..block.repeat {
            let proceed = match &block.guard {
                Guard::Always => true,
                Guard::ElementExists(selector) => tab.element_exists(selector).await?,
            };
            if !proceed {
                break;
            }
            run_commands(&block.commands, tab, session_id, &mut result.out[pos]).await?;
        }
    }
    Ok(())
}

async fn run_commands(
    commands: &[DriverCommand],
    tab: &Tab,
    session_id: &str,
    out: &mut Vec<String>,
) -> Result<(), ExecError> {
    for command in commands {
        match command {
            DriverCommand::Navigate(url) => tab.navigate(url).await?,
            DriverCommand::Click(selector) => tab.click(selector).await?,
            DriverCommand::OuterHtml => out.push(tab.outer_html().await?),
            DriverCommand::ScrollToBottom => tab.scroll_to_bottom().await?,
            DriverCommand::ScrollIntoView(selector) => tab.scroll_into_view(selector).await?,
            DriverCommand::Sleep(delay) => tab.sleep(*delay).await?,
            DriverCommand::Listen(events) => tab.listen(session_id, events).await?,
            DriverCommand::EnableNetwork => tab.enable_network().await?,
            DriverCommand::EnableLifecycleEvents => tab.enable_lifecycle_events().await?,
        }
    }
    Ok(())
}
