use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use motegao::handlers::{
    AppContext, handle_google_login, handle_init, handle_login, handle_logout,
    handle_project_create, handle_project_delete, handle_project_list, handle_project_rename,
    handle_project_show, handle_scan, print_banner,
};
use tracing::Level;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    if let Err(e) = dispatch(&chosen_command).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<()> {
    let ctx = AppContext::from_args(matches)?;

    match matches.subcommand() {
        Some(("init", primary_command)) => handle_init(&ctx, primary_command),
        Some(("login", primary_command)) => handle_login(&ctx, primary_command).await,
        Some(("google-login", primary_command)) => {
            handle_google_login(&ctx, primary_command).await
        }
        Some(("logout", _)) => handle_logout(&ctx),
        Some(("project", primary_command)) => match primary_command.subcommand() {
            Some(("list", _)) => handle_project_list(&ctx).await,
            Some(("create", secondary_command)) => {
                handle_project_create(&ctx, secondary_command).await
            }
            Some(("rename", secondary_command)) => {
                handle_project_rename(&ctx, secondary_command).await
            }
            Some(("delete", secondary_command)) => {
                handle_project_delete(&ctx, secondary_command).await
            }
            Some(("show", secondary_command)) => handle_project_show(&ctx, secondary_command).await,
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("scan", primary_command)) => handle_scan(&ctx, primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
