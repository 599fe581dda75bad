//! API key CLI commands: issue.

use anyhow::Result;
use console::style;

use botmanager_types::identity::{Scope, format_scopes};

use crate::state::AppState;

/// Issue an API key and print the plaintext once.
///
/// # Examples
///
/// ```bash
/// botmgr key issue --owner team-a
/// botmgr key issue --owner ci --scope read --name dashboards
/// ```
pub async fn issue_key(
    state: &AppState,
    owner: &str,
    scopes: &[Scope],
    name: &str,
    json: bool,
) -> Result<()> {
    let issued = state.api_keys.issue(owner, scopes, name).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": issued.id,
                "owner": issued.principal.owner,
                "scopes": issued.principal.scopes,
                "key": issued.plaintext,
            })
        );
    } else {
        println!();
        println!(
            "  {} API key issued for '{}' ({}). Save it now; it won't be shown again:",
            style("🔑").bold(),
            style(owner).cyan(),
            format_scopes(scopes)
        );
        println!();
        println!("  {}", style(&issued.plaintext).yellow().bold());
        println!();
    }

    Ok(())
}
