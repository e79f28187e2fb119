//! `repairs create`: insert a ticket directly into the configured store.

use crate::cmd::{fail, open_cli_store};
use crate::output::{CliError, OutputMode, render_error, render_item};
use clap::Args;
use repairs_core::authorship::CallerContext;
use repairs_core::config::ServiceConfig;
use repairs_core::error::ErrorCode;
use repairs_core::model::ticket::{DEFAULT_STATUS, NewRepair};
use repairs_core::tickets;
use repairs_server::validate;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// What needs repairing.
    #[arg(long)]
    pub item: String,

    /// What is wrong with it.
    #[arg(short, long)]
    pub description: String,

    /// Initial status.
    #[arg(short, long, default_value = DEFAULT_STATUS)]
    pub status: String,

    /// Person the repair is assigned to.
    #[arg(short, long)]
    pub assigned_to: Option<String>,

    /// Tenant to credit the ticket to.
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Conversation to credit the ticket to (only used with --tenant-id).
    #[arg(long)]
    pub conversation_id: Option<String>,
}

impl CreateArgs {
    fn to_new_repair(&self) -> NewRepair {
        let mut new = NewRepair::new(&self.item, &self.description).with_status(&self.status);
        if let Some(assignee) = &self.assigned_to {
            new = new.with_assignee(assignee);
        }
        new
    }
}

pub fn run_create(
    args: &CreateArgs,
    config: &ServiceConfig,
    output: OutputMode,
) -> anyhow::Result<()> {
    let new = args.to_new_repair();
    if let Err(e) = validate::validate_new_repair(&new) {
        render_error(
            output,
            &CliError::with_details(
                e.to_string(),
                e.suggestion.clone(),
                ErrorCode::ValidationFailed.code(),
            ),
        )?;
        anyhow::bail!("{e}");
    }

    let store = open_cli_store(config, output)?;
    let caller = CallerContext::new(args.tenant_id.clone(), args.conversation_id.clone());

    match tickets::create_ticket(&store, new, &caller) {
        Ok(ticket) => {
            render_item(&ticket, output)?;
            Ok(())
        }
        Err(err) => fail(output, err),
    }
}
