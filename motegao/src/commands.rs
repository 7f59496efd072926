use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("motegao")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("motegao")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log request plumbing and task lifecycle to stderr")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"api-url" <URL>)
                .required(false)
                .global(true)
                .help("Base URL of the Motegao API (overrides config and MOTEGAO_API_URL)")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            arg!(--"config-dir" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding config.json and the session database")
                .default_value("~/.config/motegao/"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default config and creates the session database")
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config file and reset the session database")
                        .required(false),
                ),
        )
        .subcommand(
            command!("login")
                .about("Log in with username and password and remember the session")
                .arg(
                    arg!(-u --"username" <USERNAME>)
                        .required(true)
                        .help("Account name"),
                )
                .arg(
                    arg!(-p --"password" <PASSWORD>)
                        .required(false)
                        .help("Account password (prompted for when omitted)"),
                ),
        )
        .subcommand(
            command!("google-login")
                .about("Register a Google-authenticated profile and remember the session")
                .arg(arg!(-e --"email" <EMAIL>).required(true).help("Google account email"))
                .arg(arg!(-n --"name" <NAME>).required(true).help("Display name"))
                .arg(
                    arg!(--"google-id" <GOOGLE_ID>)
                        .required(true)
                        .help("Google account subject id"),
                )
                .arg(
                    arg!(--"picture" <URL>)
                        .required(false)
                        .help("Profile picture URL"),
                ),
        )
        .subcommand(command!("logout").about("Forget the stored session"))
        .subcommand(
            command!("project")
                .about("Manage recon projects")
                .subcommand_required(true)
                .subcommand(command!("list").about("List your projects"))
                .subcommand(
                    command!("create").about("Create an empty project").arg(
                        arg!(-n --"name" <NAME>)
                            .required(false)
                            .help("Project name (generated when omitted)"),
                    ),
                )
                .subcommand(
                    command!("rename")
                        .about("Rename a project")
                        .arg(arg!(--"id" <PROJECT_ID>).required(true).help("The project id"))
                        .arg(
                            arg!(-n --"name" <NAME>)
                                .required(true)
                                .help("The new name for the project"),
                        ),
                )
                .subcommand(
                    command!("delete")
                        .about("Delete a project")
                        .arg(arg!(--"id" <PROJECT_ID>).required(true).help("The project id")),
                )
                .subcommand(
                    command!("show")
                        .about("Print a project's canvas")
                        .arg(arg!(--"id" <PROJECT_ID>).required(true).help("The project id"))
                        .arg(
                            arg!(--"dot")
                                .required(false)
                                .help("Emit Graphviz DOT instead of a text summary")
                                .action(clap::ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(
            command!("scan")
                .about(
                    "Run one remote tool against a domain and follow it to completion. \
                Results are added to the project canvas.",
                )
                .arg(
                    arg!(-d --"domain" <DOMAIN>)
                        .required(true)
                        .help("Target domain; added to the canvas if not already there"),
                )
                .arg(
                    arg!(-t --"tool" <TOOL>)
                        .required(true)
                        .help("The tool to run")
                        .value_parser(["subdomain", "nmap", "pathfinder"]),
                )
                .arg(
                    arg!(-P --"project" <PROJECT_ID>)
                        .required(false)
                        .help("Project to load results into and save afterwards"),
                )
                .arg(
                    arg!(-w --"wordlist" <WORDLIST>)
                        .required(false)
                        .help("Wordlist index (1-3) for subdomain and path enumeration")
                        .value_parser(clap::value_parser!(u8)),
                )
                .arg(
                    arg!(--"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Remote worker threads (1-100)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-T --"timing" <TEMPLATE>)
                        .required(false)
                        .help("Nmap timing template (0-5)")
                        .value_parser(clap::value_parser!(u8)),
                )
                .arg(
                    arg!(-o --"option" <NMAP_OPTION>)
                        .required(false)
                        .help("Nmap option, repeatable (-sS -sT -sU -Pn --open -n -sV)")
                        .allow_hyphen_values(true)
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"all-ports")
                        .required(false)
                        .help("Scan every port")
                        .action(clap::ArgAction::SetTrue)
                        .conflicts_with_all(["ports", "ports-range"]),
                )
                .arg(
                    arg!(--"ports" <PORTS>)
                        .required(false)
                        .help("Comma-separated ports, e.g. 80,443")
                        .conflicts_with("ports-range"),
                )
                .arg(
                    arg!(--"ports-range" <RANGE>)
                        .required(false)
                        .help("Port range, e.g. 1-1024"),
                )
                .arg(
                    arg!(--"exclude-status" <CODES>)
                        .required(false)
                        .help("Comma-separated HTTP status codes to hide from path enumeration"),
                ),
        )
}
