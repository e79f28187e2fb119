//! `repairs list`: filtered ticket listing.

use crate::cmd::{fail, open_cli_store};
use crate::output::{OutputMode, render_list};
use clap::Args;
use repairs_core::config::ServiceConfig;
use repairs_core::db::query::RepairFilter;
use repairs_core::tickets;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Exact status (case-sensitive).
    #[arg(short, long)]
    pub status: Option<String>,

    /// Case-insensitive substring of the assignee.
    #[arg(short, long)]
    pub assigned_to: Option<String>,

    /// Exact creator, e.g. `tenant|conversation`.
    #[arg(short, long)]
    pub created_by: Option<String>,
}

impl From<&ListArgs> for RepairFilter {
    fn from(args: &ListArgs) -> Self {
        Self {
            status: args.status.clone(),
            assigned_to: args.assigned_to.clone(),
            created_by: args.created_by.clone(),
        }
    }
}

pub fn run_list(args: &ListArgs, config: &ServiceConfig, output: OutputMode) -> anyhow::Result<()> {
    let store = open_cli_store(config, output)?;
    match tickets::list_tickets(&store, &RepairFilter::from(args)) {
        Ok(found) => {
            render_list(&found, output)?;
            Ok(())
        }
        Err(err) => fail(output, err),
    }
}
