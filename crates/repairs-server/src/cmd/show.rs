//! `repairs show`: display one ticket by id.

use crate::cmd::{fail, open_cli_store};
use crate::output::{CliError, OutputMode, render_error, render_item};
use clap::Args;
use repairs_core::config::ServiceConfig;
use repairs_core::error::ErrorCode;
use repairs_core::tickets;
use repairs_server::validate;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Repair id as printed by `create` or `list`.
    pub id: String,
}

pub fn run_show(args: &ShowArgs, config: &ServiceConfig, output: OutputMode) -> anyhow::Result<()> {
    if let Err(e) = validate::validate_repair_id(&args.id) {
        render_error(
            output,
            &CliError::with_details(
                e.to_string(),
                "pass an id from `repairs list`",
                ErrorCode::ValidationFailed.code(),
            ),
        )?;
        anyhow::bail!("{e}");
    }

    let store = open_cli_store(config, output)?;
    match tickets::get_ticket(&store, args.id.trim()) {
        Ok(ticket) => {
            render_item(&ticket, output)?;
            Ok(())
        }
        Err(err) => fail(output, err),
    }
}
