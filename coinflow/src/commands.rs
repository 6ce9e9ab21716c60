use clap::{arg, command};
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("coinflow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("coinflow")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("taint")
                .about(
                    "Follow the outputs of a seed transaction on the explorer for a number of \
                steps and report every transaction reached.",
                )
                .arg(config_arg())
                .arg(
                    arg!(--"seed" <TXID>)
                        .required(false)
                        .help("Seed transaction id (default: the Eligius coinbase transaction)"),
                )
                .arg(
                    arg!(--"steps" <N>)
                        .required(false)
                        .help("Number of steps to walk, the seed counting as the first")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(threads_arg())
                .arg(base_url_arg())
                .arg(
                    arg!(--"timeout" <SECS>)
                        .required(false)
                        .help("Per-transaction timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"dedupe")
                        .required(false)
                        .help("Skip transactions already resolved earlier in the walk")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(output_arg())
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, dot, csv")
                        .value_parser(["text", "json", "dot", "csv"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("pools")
                .about("Collect the addresses listed for known mining pools and attribute them.")
                .arg(config_arg())
                .arg(
                    arg!(-p --"pool" <NAME>)
                        .required(false)
                        .help("Pool to resolve, repeatable (default: Eligius, DeepBit, BitMinter, BTCGuild)")
                        .action(clap::ArgAction::Append),
                )
                .arg(threads_arg())
                .arg(base_url_arg())
                .arg(
                    arg!(--"max-attempts" <N>)
                        .required(false)
                        .help("Attempts per listing page before giving up")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"proxy" <URL>)
                        .required(false)
                        .help("Proxy to rotate through on retries, repeatable")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(output_arg())
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv")
                        .value_parser(["text", "json", "csv"])
                        .default_value("text"),
                ),
        )
}

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(false)
        .help("JSON configuration file, flags override its values")
}

fn threads_arg() -> clap::Arg {
    arg!(-t --"threads" <NUM_WORKERS>)
        .required(false)
        .help("Maximum number of async workers (never more than 7 run at once)")
        .value_parser(clap::value_parser!(usize))
}

fn base_url_arg() -> clap::Arg {
    arg!(--"base-url" <URL>)
        .required(false)
        .help("Explorer base URL")
        .value_parser(clap::value_parser!(Url))
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Save report to file (default: print to stdout)")
}
